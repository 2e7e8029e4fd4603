use anyhow::Result;
use s3probe::cli::{self, args::Cli};
use s3probe::probe::Shutdown;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    cli::init_logging(&cli)?;

    // Probes within a round run concurrently, so use the multi-threaded runtime.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            shutdown.trigger();
        }
    });

    cli::run(cli, signal).await
}
