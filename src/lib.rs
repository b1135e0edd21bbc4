//! Order layer of The British Interiors storefront.
//!
//! The server half ([`store`], [`api`]) keeps the authoritative order list and
//! serves it over HTTP. The client half ([`client`]) is embedded by the
//! storefront: it holds the basket and an offline-first order cache and keeps
//! the cache reconciled with the server.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod store;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::{AdminGuard, SessionStore};
use config::Config;
use store::OrderStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<OrderStore>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: OrderStore, config: Config) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_ttl));
        Self {
            store: Arc::new(store),
            sessions,
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let guard = AdminGuard {
        api_psk: state.config.api_psk.clone(),
        sessions: state.sessions.clone(),
    };

    // Storefront routes (no auth required)
    let public_routes = Router::new()
        .route("/orders", post(api::create_order))
        .route("/sync-orders", post(api::sync_orders))
        .route("/sync", get(api::get_sync_info))
        .route("/check-orders", get(api::check_orders));

    // Admin routes
    let admin_routes = Router::new()
        .route("/orders", get(api::list_orders))
        .route(
            "/orders/{id}",
            get(api::get_order)
                .delete(api::delete_order)
                .patch(api::update_order),
        )
        .route("/events", get(api::order_events))
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_auth_layer(guard.clone(), req, next)
        }));

    let api_routes = public_routes
        .merge(admin_routes)
        .fallback(api::api_not_found);

    // Session login/logout and health check
    let site_routes = Router::new()
        .route("/admin/login", post(api::admin_login))
        .route("/admin/logout", get(api::admin_logout))
        .route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(site_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
