use anyhow::Result;
use chrono::Utc;
use prodgap_storage::ProductionStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use prodgap_server::app;
use prodgap_server::config::{NetworkSeedFile, ServerConfig};
use prodgap_server::seed;
use prodgap_server::service::ProductionService;
use prodgap_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  prodgap-server [config.toml]                              Start the server");
    eprintln!("  prodgap-server init-network <config.toml> <seed.json>     Load hierarchy, equipment, connections and thresholds");
}

#[tokio::main]
async fn main() -> Result<()> {
    prodgap_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("prodgap=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-network") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-network requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-network requires <seed.json> argument")
            })?;
            run_init_network(config_path, seed_path)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

fn open_service(config: &ServerConfig) -> Result<Arc<ProductionService>> {
    let store = Arc::new(ProductionStore::new(Path::new(&config.data_dir))?);
    Ok(Arc::new(ProductionService::open(store, config)?))
}

/// Load the equipment network from a JSON seed file.
fn run_init_network(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", config_path, e))?;
    let service = open_service(&config)?;

    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed_file: NetworkSeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    let report = seed::load_network_seed(&service, &seed_file)?;
    tracing::info!(
        equipment_failed = report.equipment.failed,
        connections_failed = report.connections.failed,
        thresholds_failed = report.thresholds.failed,
        "init-network finished"
    );
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", config_path, e))?;

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.data_dir,
        trace_depth_limit = config.flow_trace.depth_limit,
        auto_resolve = config.evaluator.auto_resolve,
        "prodgap-server starting"
    );

    let service = open_service(&config)?;
    let adapters = prodgap_adapters::build_adapters(&config.adapters)?;

    let state = AppState {
        service,
        adapters,
        start_time: Utc::now(),
        config: Arc::new(config.clone()),
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(addr = %http_addr, "HTTP server listening");

    tokio::select! {
        result = axum::serve(http_listener, app).with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    tracing::info!("prodgap-server stopped");
    Ok(())
}
