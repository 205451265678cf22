use std::process::ExitCode;

use anyhow::Context;
use backdrop_core::BackdropConfig;

mod app;
mod args;
mod cycle;
mod http;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so `status --json` stays machine-readable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "backdrop=info,backdrop_scheduler=info,backdrop_imagegen=info,tower_http=info"
                    .into()
            }),
        )
        .init();

    match real_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn real_main() -> anyhow::Result<ExitCode> {
    use clap::Parser as _;

    let cli = args::Cli::parse();

    // load config: --config > BACKDROP_CONFIG env > ./backdrop.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("BACKDROP_CONFIG").ok());
    let config = BackdropConfig::load(config_path.as_deref())
        .context("failed to load configuration")?;

    match cli.cmd.unwrap_or(args::Command::Run) {
        args::Command::Run => cycle::run_once(&config).await,
        args::Command::Status { json } => cycle::print_status(&config, json),
        args::Command::Daemon { tick_secs } => cycle::run_daemon(&config, tick_secs).await,
        args::Command::Serve => app::serve(&config).await,
    }
}
