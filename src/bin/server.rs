use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use sitewatch::db::{self, services::website_service, writer::ResultWriter};
use sitewatch::monitor::{HttpChecker, MonitorSupervisor, TargetRegistry};
use sitewatch::server::{config::ServerConfig, logging::init_logging};
use sitewatch::version::VERSION;
use sitewatch::web::{AppState, create_axum_router};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("sitewatch version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();

    let config = ServerConfig::load(args.config.as_deref())?;
    init_logging(&config.log_dir);
    info!("Starting sitewatch, version: {}", VERSION);

    // --- Database ---
    let db_pool = Arc::new(db::connect(&config.database_url, config.database_max_connections).await?);
    db::log_server_version(&db_pool).await?;
    db::run_migrations(&db_pool).await?;

    let stored = website_service::load_targets(&db_pool).await?;
    info!(count = stored.targets.len(), "Loaded monitored websites.");
    let registry = Arc::new(TargetRegistry::with_targets_after(
        stored.targets,
        stored.highest_id,
    ));

    // --- Result writer ---
    let (result_writer, writer_handle) =
        ResultWriter::spawn(db_pool.clone(), config.result_writer_config());

    // --- Monitor supervisor ---
    let checker = HttpChecker::new(config.request_timeout())?;
    let supervisor = MonitorSupervisor::new(
        registry.clone(),
        Arc::new(checker),
        Arc::new(result_writer.clone()),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisor_handle = tokio::spawn(supervisor.run(shutdown_rx, config.reconcile_interval()));

    // --- HTTP API ---
    let addr: SocketAddr = config.listen_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP API listening on {}", addr);
    let app = create_axum_router(Arc::new(AppState::new(db_pool.clone(), registry)));
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server error.");
    }

    // --- Shutdown ---
    info!("Stopping monitor tasks.");
    if shutdown_tx.send(true).is_err() {
        error!("Supervisor exited before shutdown was requested.");
    }
    if let Err(e) = supervisor_handle.await {
        error!(error = %e, "Supervisor task ended abnormally.");
    }

    drop(result_writer);
    if let Err(e) = writer_handle.await {
        error!(error = %e, "Result writer task ended abnormally.");
    }

    // The router and writer have released their handles by now.
    if let Ok(db_pool) = Arc::try_unwrap(db_pool) {
        if let Err(e) = db_pool.close().await {
            error!(error = %e, "Failed to close database connection.");
        }
    }
    info!("Shutdown complete.");
    Ok(())
}
