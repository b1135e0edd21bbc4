//! HTTP client for the order server.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::ClientError;
use crate::auth::API_KEY_HEADER;
use crate::config::ClientConfig;
use crate::errors::ErrorResponse;
use crate::models::{CreateOrderResponse, Order, SyncInfo, SyncOrdersResponse};

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Serialize)]
struct SyncBatch<'a> {
    orders: &'a [Order],
}

/// Talks to the order server's JSON API with a bounded timeout per call.
#[derive(Debug, Clone)]
pub struct OrderApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OrderApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    /// POST /api/orders
    pub async fn submit_order(&self, order: &Order) -> Result<Order, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/api/orders")
            .json(order)
            .send()
            .await?;
        let created: CreateOrderResponse = read_envelope(response).await?;
        Ok(created.order)
    }

    /// POST /api/sync-orders
    pub async fn sync_orders(&self, orders: &[Order]) -> Result<SyncOrdersResponse, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/api/sync-orders")
            .json(&SyncBatch { orders })
            .send()
            .await?;
        read_envelope(response).await
    }

    /// GET /api/sync
    pub async fn sync_info(&self) -> Result<SyncInfo, ClientError> {
        let response = self.request(reqwest::Method::GET, "/api/sync").send().await?;
        read_envelope(response).await
    }

    /// GET /api/orders (admin)
    pub async fn list_orders(&self) -> Result<Vec<Order>, ClientError> {
        let response = self.request(reqwest::Method::GET, "/api/orders").send().await?;
        read_envelope(response).await
    }

    /// DELETE /api/orders/:id (admin)
    pub async fn delete_order(&self, id: &str) -> Result<(), ClientError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/api/orders/{}", id))
            .send()
            .await?;
        read_envelope(response).await
    }
}

/// Unwrap the success envelope, or turn an error status into [`ClientError::Server`].
async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        return Err(ClientError::Server {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: Envelope<T> =
        serde_json::from_slice(&body).map_err(|e| ClientError::Server {
            status: status.as_u16(),
            message: format!("Unexpected response body: {}", e),
        })?;
    Ok(envelope.data)
}
