use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;
use tracing::warn;

use super::common::{accepted_response, map_service_error};
use crate::errors::ApiError;
use crate::AppState;

pub fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/reindex", post(request_reindex))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Rejects admin requests that do not carry the configured bearer token
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.admin_token() else {
        warn!("Admin request rejected: no admin token configured");
        return Err(ApiError::Unauthorized);
    };

    if bearer_token(request.headers()) != Some(expected) {
        warn!(uri = %request.uri(), "Admin request rejected: bad bearer token");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

/// Queue a rebuild of every search document
#[utoipa::path(
    post,
    path = "/api/v1/admin/reindex",
    responses(
        (status = 202, description = "Reindex queued"),
        (status = 401, description = "Missing or invalid admin token", body = crate::errors::ErrorResponse),
        (status = 500, description = "Synchronisation worker unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn request_reindex(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state
        .admin
        .request_reindex()
        .await
        .map_err(map_service_error)?;
    Ok(accepted_response(json!({ "status": "queued" })))
}
