use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use acsoguard::app::{build_router, AppState};
use acsoguard::auth::jwt::JwtKeys;
use acsoguard::config::AppConfig;
use acsoguard::db::indexes::ensure_indexes;
use acsoguard::notify::LogNotifier;
use acsoguard::storage::client::S3StorageClient;

#[derive(Parser, Debug)]
#[command(name = "acsoguard", version, about = "Visitor and site-security management API")]
struct Cli {
    /// Configuration file (defaults to ./acsoguard.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Create a demo tenant on startup if it does not exist yet
    #[arg(long)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "acsoguard=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting AcsoGuard server...");

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Connect to MongoDB
    let mongo_uri = config.mongodb_connection_uri()?;
    let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let mongo_db = mongo_client.database(&config.mongodb_database);
    ensure_indexes(&mongo_db)
        .await
        .context("Failed to create MongoDB indexes")?;

    tracing::info!("Connected to MongoDB database '{}'", config.mongodb_database);

    // Connect to S3
    let storage_client = Arc::new(
        S3StorageClient::connect(&config.s3_bucket, config.s3_endpoint.as_deref()).await,
    );

    tracing::info!("S3 storage client initialized for bucket '{}'", config.s3_bucket);

    let state = AppState::with_mongo(
        &mongo_db,
        storage_client,
        Arc::new(LogNotifier),
        JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours),
        config.live_buffer,
    );

    if cli.seed_demo {
        acsoguard::demo_seeder::seed_demo_data(&state)
            .await
            .context("Failed to seed demo data")?;
    }

    let app = build_router(
        state,
        config.static_dir.as_deref(),
        &config.cors_origin_list(),
    );

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
