use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::{map_service_error, success_response};
use crate::errors::ApiError;
use crate::services::product_search::{ProductPage, RawSearchParams, SearchCriteria};
use crate::AppState;

pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(search_products))
        .route("/products", get(list_products))
}

/// Query string of the search endpoint.
///
/// Values are taken as text so malformed input degrades to "absent" instead of a 400.
/// A repeated parameter keeps its last value.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Free-text query
    pub q: Option<String>,
    /// Category id
    pub category: Option<String>,
    /// Brand id
    pub brand: Option<String>,
    /// Inclusive lower price bound
    pub min_price: Option<String>,
    /// Inclusive upper price bound
    pub max_price: Option<String>,
    /// 1-indexed page
    pub page: Option<String>,
}

/// Query pairs in request order; a repeated key keeps its last value
type QueryPairs = Vec<(String, String)>;

impl SearchQuery {
    fn from_pairs(pairs: QueryPairs) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "q" => &mut query.q,
                "category" => &mut query.category,
                "brand" => &mut query.brand,
                "min_price" => &mut query.min_price,
                "max_price" => &mut query.max_price,
                "page" => &mut query.page,
                _ => continue,
            };
            *slot = Some(value);
        }
        query
    }
}

impl From<SearchQuery> for RawSearchParams {
    fn from(query: SearchQuery) -> Self {
        Self {
            query: query.q,
            category: query.category,
            brand: query.brand,
            min_price: query.min_price,
            max_price: query.max_price,
            page: query.page,
        }
    }
}

/// Query string of the storefront listing, which names its parameters after the filter controls
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    pub query: Option<String>,
    pub category_id: Option<String>,
    pub brand_id: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub page: Option<String>,
}

impl ProductListQuery {
    fn from_pairs(pairs: QueryPairs) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "query" => &mut query.query,
                "category_id" => &mut query.category_id,
                "brand_id" => &mut query.brand_id,
                "min_price" => &mut query.min_price,
                "max_price" => &mut query.max_price,
                "page" => &mut query.page,
                _ => continue,
            };
            *slot = Some(value);
        }
        query
    }
}

impl From<ProductListQuery> for RawSearchParams {
    fn from(query: ProductListQuery) -> Self {
        Self {
            query: query.query,
            category: query.category_id,
            brand: query.brand_id,
            min_price: query.min_price,
            max_price: query.max_price,
            page: query.page,
        }
    }
}

/// Filters as they were applied, after normalisation
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AppliedFilters {
    pub category_id: Option<i32>,
    pub brand_id: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SearchResponse {
    pub products: ProductPage,
    pub query: String,
    pub filters: AppliedFilters,
}

impl SearchResponse {
    fn new(products: ProductPage, criteria: SearchCriteria) -> Self {
        Self {
            products,
            query: criteria.query,
            filters: AppliedFilters {
                category_id: criteria.category_id,
                brand_id: criteria.brand_id,
                min_price: criteria.min_price,
                max_price: criteria.max_price,
            },
        }
    }
}

async fn run_search(state: &AppState, raw: RawSearchParams) -> Result<SearchResponse, ApiError> {
    let criteria = SearchCriteria::from_raw(&raw);
    let products = state
        .search
        .search(&criteria)
        .await
        .map_err(map_service_error)?;
    Ok(SearchResponse::new(products, criteria))
}

/// Search the catalog
///
/// Served by the search index, or by the database with the same constraints when the index
/// is unavailable.
#[utoipa::path(
    get,
    path = "/api/v1/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "One page of matching products", body = SearchResponse),
        (status = 500, description = "Catalog unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Search"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<impl IntoResponse, ApiError> {
    let params = SearchQuery::from_pairs(pairs);
    let response = run_search(&state, params.into()).await?;
    Ok(success_response(response))
}

/// Storefront product listing
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "One page of products", body = SearchResponse),
        (status = 500, description = "Catalog unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Search"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<impl IntoResponse, ApiError> {
    let params = ProductListQuery::from_pairs(pairs);
    let response = run_search(&state, params.into()).await?;
    Ok(success_response(response))
}
