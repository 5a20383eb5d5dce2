//! Manna - ephemeral image drop
//!
//! "Let no man leave of it till the morning" - Exodus 16:19

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manna::{
    config::{Args, StoreBackend},
    db::mongo::redact_uri,
    server,
    store::{spawn_sweep_task, BlobStore, MemoryBlobStore, MongoBlobStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("manna={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Manna - Ephemeral Image Drop");
    info!("  \"Let no man leave of it till the morning\"");
    info!("======================================");
    info!("Listen: {}", args.bind_addr());
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Store: {:?}", args.store);
    if args.store == StoreBackend::Mongo {
        info!("MongoDB: {} (db: {})", redact_uri(&args.mongodb_uri), args.mongodb_db);
    }
    info!(
        "Body validation: {}",
        if args.strict_body_validation { "strict" } else { "lenient" }
    );
    info!("======================================");

    let store: Arc<dyn BlobStore> = match args.store {
        StoreBackend::Mongo => {
            let mongo = MongoBlobStore::new(&args.mongodb_uri, &args.mongodb_db);
            // Warm the connection; a failure here is retried on first request
            if let Err(e) = mongo.connect().await {
                warn!("MongoDB not reachable at startup (will connect on first request): {}", e);
            }
            Arc::new(mongo)
        }
        StoreBackend::Memory => {
            warn!("Memory store selected - blobs are lost on restart");
            let memory = Arc::new(MemoryBlobStore::new());
            spawn_sweep_task(
                Arc::clone(&memory),
                Duration::from_secs(args.sweep_interval_secs),
            );
            memory
        }
    };

    let state = Arc::new(server::AppState::new(args, store)?);

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
