use chrono::{DateTime, Duration, Utc};

use crate::types::{DecisionReason, GenerationDecision, GenerationState};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Hours from `last` to `now` as a float. Negative if `last` is in the future.
pub fn hours_between(last: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    now.signed_duration_since(last).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Decide whether a new image is due. Pure: the caller supplies `now`.
///
/// Rules, first match wins:
/// 1. no artifact          → due (`NoArtifact`)
/// 2. no last-generation   → due (`NoState`)
/// 3. elapsed >= interval  → due (`IntervalElapsed`)
/// 4. otherwise            → not due, with the hours still to wait
pub fn decide(
    state: &GenerationState,
    artifact_exists: bool,
    now: DateTime<Utc>,
    interval_hours: u32,
) -> GenerationDecision {
    let hours_since_last = state.last_generation.map(|last| hours_between(last, now));

    if !artifact_exists {
        return GenerationDecision {
            due: true,
            reason: DecisionReason::NoArtifact,
            hours_remaining: None,
            hours_since_last,
        };
    }

    let Some(elapsed) = hours_since_last else {
        return GenerationDecision {
            due: true,
            reason: DecisionReason::NoState,
            hours_remaining: None,
            hours_since_last: None,
        };
    };

    let interval = f64::from(interval_hours);
    // Compare on the raw value: a timestamp ahead of the clock gives a
    // negative elapsed time, which is never >= a non-negative interval.
    if elapsed >= interval {
        GenerationDecision {
            due: true,
            reason: DecisionReason::IntervalElapsed,
            hours_remaining: None,
            hours_since_last,
        }
    } else {
        GenerationDecision {
            due: false,
            reason: DecisionReason::IntervalNotElapsed,
            hours_remaining: Some((interval - elapsed).max(0.0)),
            hours_since_last,
        }
    }
}

/// When the next generation becomes due by interval alone. `None` without
/// a recorded generation, or when the sum falls outside the calendar range.
pub fn next_due_at(state: &GenerationState, interval_hours: u32) -> Option<DateTime<Utc>> {
    state
        .last_generation?
        .checked_add_signed(Duration::hours(i64::from(interval_hours)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn state_hours_ago(hours: i64) -> GenerationState {
        GenerationState::generated_at(now() - Duration::hours(hours))
    }

    #[test]
    fn no_state_no_artifact_is_due_for_missing_artifact() {
        let d = decide(&GenerationState::default(), false, now(), 24);
        assert!(d.due);
        assert_eq!(d.reason, DecisionReason::NoArtifact);
        assert!(d.hours_remaining.is_none());
    }

    #[test]
    fn missing_artifact_wins_over_recent_state() {
        for hours in [0, 1, 10, 23, 30, 1000] {
            let d = decide(&state_hours_ago(hours), false, now(), 24);
            assert!(d.due, "hours={hours}");
            assert_eq!(d.reason, DecisionReason::NoArtifact);
        }
    }

    #[test]
    fn artifact_without_state_is_due() {
        let d = decide(&GenerationState::default(), true, now(), 24);
        assert!(d.due);
        assert_eq!(d.reason, DecisionReason::NoState);
        assert!(d.hours_since_last.is_none());
    }

    #[test]
    fn ten_hours_into_a_day_leaves_fourteen() {
        let d = decide(&state_hours_ago(10), true, now(), 24);
        assert!(!d.due);
        assert_eq!(d.reason, DecisionReason::IntervalNotElapsed);
        let remaining = d.hours_remaining.expect("remaining");
        assert!((remaining - 14.0).abs() < 1e-9);
        assert!((d.hours_since_last.expect("since") - 10.0).abs() < 1e-9);
    }

    #[test]
    fn thirty_hours_is_elapsed() {
        let d = decide(&state_hours_ago(30), true, now(), 24);
        assert!(d.due);
        assert_eq!(d.reason, DecisionReason::IntervalElapsed);
    }

    #[test]
    fn exactly_on_the_interval_is_due() {
        let d = decide(&state_hours_ago(24), true, now(), 24);
        assert!(d.due);
        assert_eq!(d.reason, DecisionReason::IntervalElapsed);
    }

    #[test]
    fn boundary_sweep() {
        for interval in [1u32, 6, 24, 72] {
            for elapsed_min in (0..(interval as i64 * 60 * 2)).step_by(17) {
                let state = GenerationState::generated_at(now() - Duration::minutes(elapsed_min));
                let d = decide(&state, true, now(), interval);
                let elapsed_h = elapsed_min as f64 / 60.0;
                if elapsed_h >= f64::from(interval) {
                    assert!(d.due);
                } else {
                    assert!(!d.due);
                    let expected = f64::from(interval) - elapsed_h;
                    assert!((d.hours_remaining.expect("remaining") - expected).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn zero_interval_is_always_due() {
        let d = decide(&state_hours_ago(0), true, now(), 0);
        assert!(d.due);
        assert_eq!(d.reason, DecisionReason::IntervalElapsed);
    }

    #[test]
    fn future_timestamp_is_not_due_and_clamps_report() {
        let state = GenerationState::generated_at(now() + Duration::hours(5));
        let d = decide(&state, true, now(), 24);
        assert!(!d.due);
        assert_eq!(d.reason, DecisionReason::IntervalNotElapsed);
        assert!((d.hours_since_last.expect("since") + 5.0).abs() < 1e-9);
        // 24 - (-5) = 29, already non-negative.
        assert!((d.hours_remaining.expect("remaining") - 29.0).abs() < 1e-9);

        let d = decide(&state, true, now(), 0);
        assert!(!d.due);
        assert!(d.hours_remaining.expect("remaining") >= 0.0);
    }

    #[test]
    fn next_due_is_last_plus_interval() {
        let state = state_hours_ago(10);
        assert_eq!(next_due_at(&state, 24), Some(now() + Duration::hours(14)));
        assert_eq!(next_due_at(&GenerationState::default(), 24), None);
    }

    #[test]
    fn next_due_past_the_calendar_end_is_none() {
        let state = GenerationState::generated_at(DateTime::<Utc>::MAX_UTC - Duration::minutes(30));
        assert_eq!(next_due_at(&state, 24), None);

        let d = decide(&state, true, now(), 24);
        assert!(!d.due);
    }
}
