//! Order documents stored in SQLite.
//!
//! Mirrors the JSON file layout: the whole list is rewritten on every
//! mutation, inside one transaction, and read back in list order.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{IncomingOrder, Order};

/// The server's order collection in the `orders` table.
#[derive(Debug, Clone)]
pub struct OrderDocuments {
    pool: SqlitePool,
}

impl OrderDocuments {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load every stored order in list order.
    ///
    /// Rows are normalized the same way as the JSON file: incomplete orders
    /// are kept and marked synced, a row that is not an order fails the load.
    pub async fn load_all(&self) -> Result<Vec<Order>, AppError> {
        let rows = sqlx::query("SELECT id, body FROM orders ORDER BY position")
            .fetch_all(&self.pool)
            .await?;

        let now = Utc::now();
        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let body: String = row.get("body");
                serde_json::from_str::<IncomingOrder>(&body)
                    .map(|incoming| incoming.into_stored_order(now))
                    .map_err(|e| {
                        AppError::Persistence(format!("Stored order {} is not readable: {}", id, e))
                    })
            })
            .collect()
    }

    /// Replace the stored collection with `orders`.
    pub async fn replace_all(&self, orders: &[Order]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM orders").execute(&mut *tx).await?;

        for (position, order) in orders.iter().enumerate() {
            let body = serde_json::to_string(order).map_err(|e| {
                AppError::Persistence(format!("Failed to encode order {}: {}", order.id, e))
            })?;
            sqlx::query("INSERT INTO orders (id, position, body) VALUES (?, ?, ?)")
                .bind(&order.id)
                .bind(position as i64)
                .bind(&body)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
