//! rectsrv - Rectifier Monitoring Service
//!
//! Polls one industrial rectifier over Modbus TCP, journals successful
//! readings to dated CSV files and serves live state over HTTP.

use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rectsrv::api::{self, ApiState};
use rectsrv::config::Config;
use rectsrv::driver::RectifierDriver;
use rectsrv::journal::CsvJournal;
use rectsrv::service::RectifierService;
use rectsrv::transport::ModbusTcpTransport;
use rectsrv::{RectSrvError, SERVICE_NAME, SERVICE_VERSION};

#[derive(Parser, Debug)]
#[command(name = "rectsrv", version, about = "Rectifier monitoring service")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config/rectsrv.yaml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    let config = Config::load(&args.config)?;
    config.validate()?;

    if args.validate {
        info!("configuration valid: {}", args.config.display());
        return Ok(());
    }

    info!(
        "starting {} v{} - polling {}:{} every {:?}",
        SERVICE_NAME,
        SERVICE_VERSION,
        config.rectifier.host,
        config.rectifier.port,
        config.polling.interval
    );

    // Backend services
    let transport = ModbusTcpTransport::new(&config.rectifier);
    let driver = Arc::new(RectifierDriver::new(
        Box::new(transport),
        &config.scaling,
    ));

    let journal = Arc::new(CsvJournal::new(&config.journal.root_dir)?);
    let data_dir = Path::new(&config.journal.root_dir).join(&config.journal.subdir);
    let data_dir = data_dir
        .to_str()
        .ok_or_else(|| RectSrvError::config("journal path is not valid UTF-8"))?;
    journal.set_root_dir(data_dir)?;

    let service = Arc::new(RectifierService::new(
        Arc::clone(&driver),
        Arc::clone(&journal),
        &config.polling,
    ));
    service.start().await;

    // HTTP API
    let state = ApiState {
        service: Arc::clone(&service),
        journal,
    };
    let app = api::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port)
        .parse()
        .map_err(|e| RectSrvError::config(format!("invalid API bind address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&service)))
        .await?;

    driver.close().await;
    info!("{} stopped", SERVICE_NAME);
    Ok(())
}

/// Wait for ctrl-c, then ask the polling loop to stop
async fn shutdown_signal(service: Arc<RectifierService>) {
    match signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => error!("failed to listen for shutdown signal: {e}"),
    }
    service.stop();
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}=info", env!("CARGO_PKG_NAME"))));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
