use axum::{extract::State, response::IntoResponse, routing::get, Router};

use super::common::{map_service_error, success_response};
use crate::errors::ApiError;
use crate::AppState;

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/brands", get(list_brands))
}

/// Active categories for the category filter, ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "Active categories", body = [crate::catalog::FacetOption]),
        (status = 500, description = "Catalog unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.search.categories().await.map_err(map_service_error)?;
    Ok(success_response(categories))
}

/// Active brands for the brand filter, ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/brands",
    responses(
        (status = 200, description = "Active brands", body = [crate::catalog::FacetOption]),
        (status = 500, description = "Catalog unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn list_brands(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let brands = state.search.brands().await.map_err(map_service_error)?;
    Ok(success_response(brands))
}
