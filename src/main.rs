//! ComponentVault API server

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use component_vault::{
    config::{Args, LogFormat},
    db::{self, DocumentStore, MemoryStore, MongoStore},
    search::{MeiliSearchIndex, MemorySearchIndex, SearchIndex},
    server::{self, AppState},
    services::{HttpMediaStore, MediaStore, NoopMediaStore},
};

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("component_vault={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);

    match args.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  ComponentVault API v{}", env!("CARGO_PKG_VERSION"));
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} / {}", args.mongodb_uri, args.mongodb_db);
    info!("Search: {}", args.meili_url.as_deref().unwrap_or("in-memory"));
    info!("Storage: {}", args.storage_url.as_deref().unwrap_or("disabled"));
    info!("======================================");

    // Document store (in-memory fallback only in dev mode)
    let store: Arc<dyn DocumentStore> =
        match MongoStore::connect(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(mongo) => {
                if let Err(e) = db::apply_all_indexes(&mongo).await {
                    warn!("Failed to apply MongoDB indexes: {}", e);
                }
                info!("MongoDB connected successfully");
                Arc::new(mongo)
            }
            Err(e) if args.dev_mode => {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Arc::new(MemoryStore::new())
            }
            Err(e) => {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        };

    let search: Arc<dyn SearchIndex> = match &args.meili_url {
        Some(url) => {
            let index = MeiliSearchIndex::new(url, args.meili_key.as_deref())?;
            if let Err(e) = index.configure().await {
                warn!("Failed to apply search index settings: {}", e);
            }
            Arc::new(index)
        }
        None => {
            info!("MEILI_URL not set - using in-memory search index");
            Arc::new(MemorySearchIndex::new())
        }
    };

    let media: Arc<dyn MediaStore> = match &args.storage_url {
        Some(url) => Arc::new(HttpMediaStore::new(url.clone())),
        None => Arc::new(NoopMediaStore),
    };

    let state = Arc::new(AppState::new(args, store, search, media)?);
    server::run(state).await?;

    info!("ComponentVault stopped");
    Ok(())
}
