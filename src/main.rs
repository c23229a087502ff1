use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wraith::config::Config;
use wraith::services::{PortfolioManager, SqliteStore};
use wraith::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wraith=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    let strategy = config.strategy();
    strategy.validate()?;
    info!(
        "Starting with {} strategy and {:.2} initial balance",
        strategy.name, config.initial_balance
    );

    // Open the portfolio store
    if let Some(parent) = Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    info!("Portfolio store at {}", config.database_path);

    let manager = Arc::new(PortfolioManager::new(
        strategy,
        store,
        config.initial_balance,
    ));

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, manager);

    // Build the router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Wraith server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
