//! Admin authentication.
//!
//! A caller is an authenticated admin when it presents either a live session
//! cookie (from `POST /admin/login`) or the pre-shared API key. Secrets are
//! compared in constant time to mitigate timing attacks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use crate::errors::{codes, ErrorDetails, ErrorResponse};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Name of the admin session cookie.
pub const SESSION_COOKIE: &str = "shop_session";

#[derive(Debug)]
struct AdminSession {
    username: String,
    expires_at: Instant,
}

/// In-memory admin sessions keyed by random token.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, AdminSession>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session and return its token.
    pub async fn create(&self, username: &str) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(
            token.clone(),
            AdminSession {
                username: username.to_string(),
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// User name of the live session behind `token`, if any.
    pub async fn username(&self, token: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| s.expires_at > Instant::now())
            .map(|s| s.username.clone())
    }

    pub async fn destroy(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }
}

/// Everything needed to decide whether a request comes from an admin.
#[derive(Debug, Clone)]
pub struct AdminGuard {
    pub api_psk: Option<String>,
    pub sessions: Arc<SessionStore>,
}

impl AdminGuard {
    /// Check the request headers for a valid API key or session cookie.
    pub async fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        if let Some(expected) = &self.api_psk {
            if let Some(provided) = api_key_from_headers(headers) {
                if constant_time_compare(&provided, expected) {
                    return true;
                }
            }
        }

        match session_token(headers) {
            Some(token) => self.sessions.username(&token).await.is_some(),
            None => false,
        }
    }
}

/// Middleware rejecting every request that is not from an authenticated admin.
pub async fn admin_auth_layer(guard: AdminGuard, request: Request, next: Next) -> Response {
    if guard.is_authenticated(request.headers()).await {
        next.run(request).await
    } else {
        tracing::info!(
            "Unauthorized access attempt to {} {}",
            request.method(),
            request.uri().path()
        );
        unauthorized_response("Please log in to access this resource")
    }
}

/// API key from `x-api-key`, or from `Authorization: Bearer`.
fn api_key_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string())
        })
}

/// Session token from the `Cookie` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value starting a session.
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    )
}

/// `Set-Cookie` value removing the session cookie.
pub fn expired_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Perform constant-time string comparison.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    a_bytes.ct_eq(b_bytes).into()
}

/// Create an unauthorized response.
pub fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
            details: None,
        },
        last_sync: None,
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
