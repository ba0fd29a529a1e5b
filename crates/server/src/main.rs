use std::process;
use std::sync::Arc;

use clap::Parser;

use deepscan_server::build_router;
use deepscan_server::config::ServerConfig;
use deepscan_server::context::AppContext;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();
    config.validate()?;

    let context = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || AppContext::load(&config)).await??
    };
    log::info!(
        "Models loaded; sampling {} frames per video, {} face selection, staging uploads in {}",
        context.default_frames,
        context.selection,
        context.temp_dir.display()
    );

    let app = build_router(Arc::new(context), config.max_upload_bytes());
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => log::info!("Received SIGINT, shutting down"),
        () = terminate => log::info!("Received SIGTERM, shutting down"),
    }
}
