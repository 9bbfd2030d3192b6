use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Catalog Search API",
        version = "1.0.0",
        description = r#"
# Catalog Search

Full-text and faceted search over the product catalog.

Searches are answered by the search index. When the index is unreachable, slow or returns an
error, the same constraints are applied to the catalog database instead, so search keeps
working with plain substring matching.

## Query normalisation

- `q` is trimmed; an empty query with no filters lists the whole catalog, newest first.
- Non-numeric or non-positive ids and non-numeric or negative prices are ignored.
- `page` is 1-indexed; anything invalid is treated as page 1. Pages past the end are empty.

## Error Handling

```json
{
  "error": "Internal Server Error",
  "message": "Database error",
  "request_id": "9b1d...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Search", description = "Catalog search and listing"),
        (name = "Catalog", description = "Filter options"),
        (name = "Admin", description = "Index maintenance")
    ),
    paths(
        crate::handlers::search::search_products,
        crate::handlers::search::list_products,
        crate::handlers::catalog::list_categories,
        crate::handlers::catalog::list_brands,
        crate::handlers::admin::request_reindex,
    ),
    components(
        schemas(
            crate::handlers::search::SearchResponse,
            crate::handlers::search::AppliedFilters,
            crate::services::product_search::ProductPage,
            crate::catalog::ProductView,
            crate::catalog::CategorySummary,
            crate::catalog::BrandSummary,
            crate::catalog::FacetOption,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
