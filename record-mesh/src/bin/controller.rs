use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;

use record_mesh::{
    cli::ControllerArgs,
    config::Registry,
    controller::{self, ControllerCommand},
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    // stdout carries replies only.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = ControllerArgs::parse();
    let command = ControllerCommand::parse(&args.command, &args.args)?;
    let limit = args
        .timeout
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|_| anyhow!("--timeout must be a non-negative number of seconds"))
        })
        .transpose()?;

    let registry = Registry::load(&args.config)?;
    let endpoint = registry
        .resolve(&args.worker_id)
        .with_context(|| format!("check {}", args.config.display()))?;

    let mut stdout = tokio::io::stdout();
    controller::run(&command, endpoint, limit, &mut stdout).await
}
