//! Storefront side of the order layer.
//!
//! Everything here is offline-first: the basket and the order cache live in a
//! local SQLite file, orders are stored locally before any network call, and
//! the reconciler brings the cache and the server back in line once the
//! server is reachable.

mod api_client;
mod basket;
mod checkout;
mod error;
mod order_cache;
mod reconciler;
mod worker;

pub use api_client::*;
pub use basket::*;
pub use checkout::*;
pub use error::*;
pub use order_cache::*;
pub use reconciler::*;
pub use worker::*;

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::db::{self, LocalStorage};

/// All client components wired to one local store and one server.
#[derive(Debug)]
pub struct Storefront {
    pub basket: BasketStore,
    pub cache: Arc<LocalOrderCache>,
    pub submitter: OrderSubmitter,
    pub reconciler: SyncReconciler,
}

impl Storefront {
    /// Open the local store at `config.local_db_path` and connect the components.
    pub async fn open(config: &ClientConfig) -> Result<Self, ClientError> {
        let pool = db::init_database(&config.local_db_path).await?;
        let storage = LocalStorage::new(pool);
        let api = OrderApiClient::new(config)?;

        let basket = BasketStore::open(storage.clone()).await?;
        let cache = Arc::new(LocalOrderCache::new(storage));
        let submitter = OrderSubmitter::new(api.clone(), cache.clone());
        let reconciler = SyncReconciler::new(api, cache.clone());

        tracing::info!(
            "Storefront opened ({:?}, server {})",
            config.local_db_path,
            config.server_url
        );
        Ok(Self {
            basket,
            cache,
            submitter,
            reconciler,
        })
    }

    /// Start background delivery driven by `online`.
    pub fn spawn_sync_worker(
        &self,
        online: tokio::sync::watch::Receiver<bool>,
        config: &ClientConfig,
    ) -> SyncWorker {
        SyncWorker::spawn(self.reconciler.clone(), online, Backoff::from_config(config))
    }
}
