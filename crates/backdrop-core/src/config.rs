use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Uncased, UncasedStr},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{BackdropError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "backdrop.toml";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_MODEL: &str = "imagen-4.0-generate-preview-06-06";
pub const DEFAULT_PROMPT: &str = "A beautiful, artistic landscape with mountains and sunset";
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";
pub const DEFAULT_INTERVAL_HOURS: u32 = 24;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LOCK_STALE_SECS: u64 = 600;
pub const DEFAULT_PORTS: [u16; 5] = [8080, 8081, 8082, 8083, 8084];

/// Environment variables recognised without the `BACKDROP_` prefix, and the
/// config key each one maps onto.
const WELL_KNOWN_ENV: &[(&str, &str)] = &[
    ("GOOGLE_API_KEY", "generator.api_key"),
    ("GOOGLE_MODEL", "generator.model"),
    ("IMAGE_PROMPT", "generator.prompt"),
    ("ASPECT_RATIO", "generator.aspect_ratio"),
    ("GENERATION_INTERVAL_HOURS", "schedule.interval_hours"),
];

/// Top-level config (backdrop.toml + well-known env vars + BACKDROP_* overrides).
///
/// Built once at process start and handed to every component by reference;
/// nothing below the binary reads the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackdropConfig {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// External image generation endpoint and the request sent to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Bearer credential. Generation fails with a config error when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL (without trailing slash).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Passed through as the `size` field of the request.
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    /// Upper bound on a single generation call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            prompt: default_prompt(),
            aspect_ratio: default_aspect_ratio(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GeneratorConfig {
    /// The credential, if one is set and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minimum whole hours between two successful generations.
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u32,
    /// A run lock older than this is considered abandoned.
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_hours: DEFAULT_INTERVAL_HOURS,
            lock_stale_secs: DEFAULT_LOCK_STALE_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            images_dir: default_images_dir(),
            artifact_name: default_artifact_name(),
        }
    }
}

impl PathsConfig {
    pub fn artifact_path(&self) -> PathBuf {
        self.images_dir.join(&self.artifact_name)
    }

    /// Advisory run lock, kept next to the state record.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .state_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "backdrop".into());
        name.push(".lock");
        self.state_file.with_file_name(name)
    }
}

/// Polling front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Tried in order; the first free one wins.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            ports: default_ports(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}
fn default_aspect_ratio() -> String {
    DEFAULT_ASPECT_RATIO.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_interval_hours() -> u32 {
    DEFAULT_INTERVAL_HOURS
}
fn default_lock_stale_secs() -> u64 {
    DEFAULT_LOCK_STALE_SECS
}
fn default_state_file() -> PathBuf {
    PathBuf::from("last_generation.json")
}
fn default_images_dir() -> PathBuf {
    PathBuf::from("static/images")
}
fn default_artifact_name() -> String {
    "background.jpg".to_string()
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_ports() -> Vec<u16> {
    DEFAULT_PORTS.to_vec()
}

fn well_known_env(key: &UncasedStr) -> Option<Uncased<'_>> {
    WELL_KNOWN_ENV
        .iter()
        .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
        .map(|(_, target)| Uncased::from(*target))
}

impl BackdropConfig {
    /// Load config from a TOML file with env var overrides.
    ///
    /// Precedence, lowest first:
    ///   1. built-in defaults
    ///   2. the TOML file (explicit path, else ./backdrop.toml; may be absent)
    ///   3. GOOGLE_API_KEY, GOOGLE_MODEL, IMAGE_PROMPT, ASPECT_RATIO,
    ///      GENERATION_INTERVAL_HOURS
    ///   4. BACKDROP_<SECTION>__<KEY>
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_FILE);
        let config: BackdropConfig = Self::figment(path)
            .extract()
            .map_err(|e| BackdropError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(BackdropConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::raw().filter_map(well_known_env))
            .merge(Env::prefixed("BACKDROP_").split("__"))
    }

    /// Reject values that would make a cycle meaningless. The API key is not
    /// checked here: `status` and `serve` work without one.
    pub fn validate(&self) -> Result<()> {
        if self.generator.timeout_secs == 0 {
            return Err(BackdropError::Config(
                "generator.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.schedule.lock_stale_secs <= self.generator.timeout_secs {
            return Err(BackdropError::Config(format!(
                "schedule.lock_stale_secs ({}) must exceed generator.timeout_secs ({})",
                self.schedule.lock_stale_secs, self.generator.timeout_secs
            )));
        }
        if self.generator.model.trim().is_empty() {
            return Err(BackdropError::Config("generator.model is empty".into()));
        }
        if self.paths.artifact_name.trim().is_empty() {
            return Err(BackdropError::Config("paths.artifact_name is empty".into()));
        }
        if self.server.ports.is_empty() {
            return Err(BackdropError::Config("server.ports is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = BackdropConfig::default();
        assert_eq!(cfg.generator.model, DEFAULT_MODEL);
        assert_eq!(cfg.generator.aspect_ratio, "16:9");
        assert_eq!(cfg.schedule.interval_hours, 24);
        assert_eq!(
            cfg.paths.artifact_path(),
            PathBuf::from("static/images/background.jpg")
        );
        assert_eq!(cfg.server.ports, vec![8080, 8081, 8082, 8083, 8084]);
        assert!(cfg.generator.api_key().is_none());
    }

    #[test]
    fn lock_path_sits_next_to_state_file() {
        let paths = PathsConfig {
            state_file: PathBuf::from("/var/lib/backdrop/last_generation.json"),
            ..PathsConfig::default()
        };
        assert_eq!(
            paths.lock_path(),
            PathBuf::from("/var/lib/backdrop/last_generation.json.lock")
        );
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let cfg = GeneratorConfig {
            api_key: Some("   ".into()),
            ..GeneratorConfig::default()
        };
        assert!(cfg.api_key().is_none());
    }

    #[test]
    fn well_known_env_vars_are_honoured() {
        Jail::expect_with(|jail| {
            jail.set_env("GOOGLE_API_KEY", "key-123");
            jail.set_env("IMAGE_PROMPT", "a lighthouse at dawn");
            jail.set_env("GENERATION_INTERVAL_HOURS", "6");

            let cfg = BackdropConfig::load(Some("missing.toml")).expect("load");
            assert_eq!(cfg.generator.api_key(), Some("key-123"));
            assert_eq!(cfg.generator.prompt, "a lighthouse at dawn");
            assert_eq!(cfg.schedule.interval_hours, 6);
            Ok(())
        });
    }

    #[test]
    fn toml_then_prefixed_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "backdrop.toml",
                r#"
                [generator]
                model = "from-file"
                timeout_secs = 30

                [paths]
                images_dir = "public/img"
                "#,
            )?;
            jail.set_env("GOOGLE_MODEL", "from-google-env");
            jail.set_env("BACKDROP_GENERATOR__TIMEOUT_SECS", "15");

            let cfg = BackdropConfig::load(None).expect("load");
            assert_eq!(cfg.generator.model, "from-google-env");
            assert_eq!(cfg.generator.timeout_secs, 15);
            assert_eq!(cfg.paths.images_dir, PathBuf::from("public/img"));
            Ok(())
        });
    }

    #[test]
    fn lock_stale_window_must_outlast_a_generation() {
        let mut cfg = BackdropConfig::default();
        cfg.generator.timeout_secs = 900;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("lock_stale_secs"));

        cfg.schedule.lock_stale_secs = 900;
        assert!(cfg.validate().is_err());

        cfg.schedule.lock_stale_secs = 901;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("BACKDROP_GENERATOR__TIMEOUT_SECS", "0");
            let err = BackdropConfig::load(None).unwrap_err();
            assert_eq!(err.code(), "CONFIG_ERROR");
            Ok(())
        });
    }
}
