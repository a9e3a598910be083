use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sampletail::{
    config::{init_logging, Config},
    server, spawn_tailer, HistoryStore, SampleFeed, TailReader, WatchTarget,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_logging(config.debug);

    let target = WatchTarget::resolve(&config.path)
        .with_context(|| format!("cannot follow `{}`", config.path.display()))?;
    info!(path = %target.file().display(), "data file");

    let mut history = HistoryStore::new();
    let reader = TailReader::initialize(target.file(), config.tail_options(), &mut history)
        .context("cannot open data file")?;
    let feed = SampleFeed::new(history, config.client_queue);

    let shutdown = CancellationToken::new();
    let tailer = spawn_tailer(
        target,
        reader,
        feed.clone(),
        config.watch_options(),
        shutdown.clone(),
    )
    .context("cannot watch data file")?;

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot listen on {addr}"))?;
    info!(%addr, debug = config.debug, "serving sample stream");

    axum::serve(listener, server::app(feed))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("server failed")?;

    tailer.shutdown().await;
    info!("stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            error!("cannot listen for Ctrl-C, running until killed: {e}");
            std::future::pending::<()>().await
        }
    }
    shutdown.cancel();
}
