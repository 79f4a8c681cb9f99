use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use record_mesh::{cli::WorkerArgs, server::Worker, store::RecordStore};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = WorkerArgs::parse();
    let idle_timeout = args
        .idle_timeout
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|_| anyhow!("--idle-timeout must be a non-negative number of seconds"))
        })
        .transpose()?;
    let store = RecordStore::open(&args.data)?;
    let path = store.path().to_path_buf();
    let records = store.count();

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    let worker = Worker::new(listener, store).with_idle_timeout(idle_timeout);
    let addr = worker.local_addr()?;
    info!("worker listening on {}", addr);
    info!(path = %path.display(), records, "record store ready");

    if let Err(err) = worker.run_until_ctrl_c().await {
        warn!("worker exited with error: {err:?}");
        return Err(err);
    }

    Ok(())
}
