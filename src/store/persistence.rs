//! Durable backends for the order list.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::db::OrderDocuments;
use crate::errors::AppError;
use crate::models::{IncomingOrder, Order};

/// Where the order list is written.
#[derive(Debug, Clone)]
pub enum OrderPersistence {
    /// Pretty-printed JSON array on disk
    JsonFile(JsonFileBackend),
    /// One document row per order in SQLite
    Sqlite(OrderDocuments),
}

impl OrderPersistence {
    pub async fn load(&self) -> Result<Vec<Order>, AppError> {
        match self {
            OrderPersistence::JsonFile(backend) => backend.load().await,
            OrderPersistence::Sqlite(documents) => documents.load_all().await,
        }
    }

    /// Durably replace the stored list. Returns only once the write is complete.
    pub async fn save(&self, orders: &[Order]) -> Result<(), AppError> {
        match self {
            OrderPersistence::JsonFile(backend) => backend.save(orders).await,
            OrderPersistence::Sqlite(documents) => documents.replace_all(orders).await,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            OrderPersistence::JsonFile(backend) => format!("json file {:?}", backend.path()),
            OrderPersistence::Sqlite(_) => "sqlite documents".to_string(),
        }
    }
}

/// JSON array file written wholesale on every mutation.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored orders, creating an empty file when none exists.
    ///
    /// Records written by older storefront revisions are normalized on the
    /// way in and kept even when fields are blank. A record that is not an
    /// order object fails the load, so nothing is dropped on the next write.
    async fn load(&self) -> Result<Vec<Order>, AppError> {
        if !tokio::fs::try_exists(&self.path).await? {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            self.save(&[]).await?;
            tracing::info!("Created new orders file at {:?}", self.path);
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read_to_string(&self.path).await?;
        let records: Vec<serde_json::Value> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Persistence(format!(
                "Orders file {:?} is not a JSON array: {}",
                self.path, e
            ))
        })?;

        let now = Utc::now();
        let orders = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                serde_json::from_value::<IncomingOrder>(record)
                    .map(|incoming| incoming.into_stored_order(now))
                    .map_err(|e| {
                        AppError::Persistence(format!(
                            "Stored order #{} in {:?} is not readable: {}",
                            index, self.path, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let incomplete = orders
            .iter()
            .filter(|o| !o.missing_required_fields().is_empty() || o.products.is_empty())
            .count();
        if incomplete > 0 {
            tracing::warn!("{} stored orders are missing required fields", incomplete);
        }

        tracing::info!("Loaded {} orders from {:?}", orders.len(), self.path);
        Ok(orders)
    }

    /// Write to a sibling temp file, flush it to disk, then rename over the target.
    async fn save(&self, orders: &[Order]) -> Result<(), AppError> {
        let body = serde_json::to_vec_pretty(orders)
            .map_err(|e| AppError::Persistence(format!("Failed to encode orders: {}", e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}
