//! British Interiors order server
//!
//! Keeps the authoritative order list for the storefront and serves it over HTTP.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shop_orders::config::{Config, StorageKind};
use shop_orders::db::{self, OrderDocuments};
use shop_orders::store::{JsonFileBackend, OrderPersistence, OrderStore};
use shop_orders::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting British Interiors order server");
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (SHOP_API_PSK)");
    }
    if config.admin_password.is_none() {
        tracing::warn!("No admin password configured (SHOP_ADMIN_PASSWORD). Admin login is disabled");
    }
    if config.api_psk.is_none() && config.admin_password.is_none() {
        tracing::warn!("Admin endpoints are unreachable until SHOP_API_PSK or SHOP_ADMIN_PASSWORD is set");
    }

    // Open the order store
    let persistence = match config.storage {
        StorageKind::JsonFile => {
            tracing::info!("Orders file: {:?}", config.data_path);
            OrderPersistence::JsonFile(JsonFileBackend::new(&config.data_path))
        }
        StorageKind::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            let pool = db::init_database(&config.db_path).await?;
            OrderPersistence::Sqlite(OrderDocuments::new(pool))
        }
    };
    let store = OrderStore::open(persistence).await?;

    // Build router
    let bind_addr = config.bind_addr;
    let app = create_router(AppState::new(store, config));

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
