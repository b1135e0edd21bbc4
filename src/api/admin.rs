//! Admin session endpoints.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{self, constant_time_compare};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub redirect: String,
}

/// POST /admin/login - Start an admin session.
pub async fn admin_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let Some(expected_password) = state.config.admin_password.as_deref() else {
        tracing::warn!("Admin login attempted but SHOP_ADMIN_PASSWORD is not set");
        return auth::unauthorized_response("Admin login is disabled");
    };

    // Compare both fields before branching
    let user_ok = constant_time_compare(&request.username, &state.config.admin_username);
    let pass_ok = constant_time_compare(&request.password, expected_password);
    if !(user_ok & pass_ok) {
        tracing::info!("Failed admin login for user {:?}", request.username);
        return auth::unauthorized_response("Invalid username or password");
    }

    let token = state.sessions.create(&request.username).await;
    tracing::info!("Admin {} logged in", request.username);

    (
        [(
            header::SET_COOKIE,
            auth::session_cookie(&token, state.sessions.ttl()),
        )],
        Json(LoginResponse {
            redirect: "/admin".to_string(),
        }),
    )
        .into_response()
}

/// GET /admin/logout - End the admin session.
pub async fn admin_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = auth::session_token(&headers) {
        if state.sessions.destroy(&token).await {
            tracing::info!("Admin session closed");
        }
    }

    (
        [(header::SET_COOKIE, auth::expired_session_cookie())],
        Redirect::to("/admin/login"),
    )
        .into_response()
}
