//! Swap Bridge Server
//!
//! Control core of a two-chain swap bridge:
//! - keeps the cached latest heights of both chains fresh
//! - serves swap status queries
//! - accepts signed admin calls for exception handling
//!
//! Routine swap processing (verification, signing, broadcasting) runs in
//! external workers. Replacement transactions requested by admin calls are
//! signed with the sending chain's `signer_key`.

use std::sync::Arc;

use eyre::WrapErr;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use swap_bridge::admin::{AdminGate, AdminProcessor, AdminService, AuthoritySet};
use swap_bridge::api::{self, AppState};
use swap_bridge::config::Config;
use swap_bridge::store::{postgres, MemorySwapStore, PgSwapStore, SwapStore};
use swap_bridge::tokens::{BridgeRegistry, HeightWatcher, TokenPairRegistry};
use swap_bridge::worker::LocalWorker;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting Swap Bridge Server");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    info!(
        identifier = %config.identifier,
        src_chain = %config.src_chain.block_chain,
        dest_chain = %config.dest_chain.block_chain,
        admins = config.admins.len(),
        mpc_enabled = config.is_mpc_enabled(),
        "Configuration loaded"
    );
    if !config.has_admin() {
        warn!("No admin configured, all admin calls will be rejected");
    }

    let store: Arc<dyn SwapStore> = if config.database.url.is_empty() {
        info!("No database configured, using in-memory swap store");
        Arc::new(MemorySwapStore::new())
    } else {
        let pool = postgres::create_pool(&config.database.url).await?;
        postgres::run_migrations(&pool).await?;
        info!("Database connected and migrations applied");
        Arc::new(PgSwapStore::new(pool))
    };

    let pairs = Arc::new(TokenPairRegistry::new());
    if let Some(dir) = &config.pairs_dir {
        let loaded = pairs
            .load_dir(dir)
            .wrap_err_with(|| format!("Failed to load token pairs from {}", dir))?;
        info!(dir = %dir, loaded, "Token pairs loaded");
    }

    let bridges = Arc::new(BridgeRegistry::from_config(&config, pairs)?);

    let worker = Arc::new(LocalWorker::new(store.clone(), bridges.clone()));

    let admin = AdminService::new(
        AdminGate::new(AuthoritySet::from_config(&config)),
        AdminProcessor::new(store.clone(), bridges.clone(), worker),
    );

    let state = AppState {
        admin: Arc::new(admin),
        store,
        bridges: bridges.clone(),
        identifier: config.identifier.clone(),
    };
    let listen_addr = config.api_server.listen_addr.clone();
    let port = config.api_server.port;
    let server = tokio::spawn(async move {
        if let Err(e) = api::start_server(&listen_addr, port, state).await {
            error!(error = %e, "API server failed");
        }
    });

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    // Handle signals
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    let watcher = HeightWatcher::new(bridges, config.height_poll_interval_ms);
    watcher.run(shutdown_rx).await?;

    server.abort();
    info!("Swap Bridge Server stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swap_bridge=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
