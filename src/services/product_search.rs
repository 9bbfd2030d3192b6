//! Query Composer for the product catalog.
//!
//! A request is served by exactly one of three retrieval paths:
//!
//! * direct listing from the catalog when there is nothing to search for,
//! * an index query whose hits are resolved against the catalog,
//! * a catalog query with the same constraints when the index fails.
//!
//! Every path produces the same [`ProductPage`]. Which one ran is only visible in logs and
//! metrics.

use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, IntoStaticStr};
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

use crate::catalog::{FacetOption, Listable, PageRequest, ProductFilter, ProductView};
use crate::errors::ServiceError;
use crate::search::{FilterExpression, SearchError, SearchRequest, TextSearchable};

/// Products per page on every retrieval path
pub const PAGE_SIZE: u64 = 24;

/// Pages beyond this are clamped so offsets cannot overflow
const MAX_PAGE: u64 = u32::MAX as u64;

/// Request parameters exactly as received, before normalisation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSearchParams {
    pub query: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub page: Option<String>,
}

/// Normalised search input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Trimmed free text, possibly empty
    pub query: String,
    pub category_id: Option<i32>,
    pub brand_id: Option<i32>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// 1-indexed
    pub page: u64,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            query: String::new(),
            category_id: None,
            brand_id: None,
            min_price: None,
            max_price: None,
            page: 1,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Positive integer id; anything else is treated as absent
fn parse_id(value: Option<&str>) -> Option<i32> {
    non_blank(value)
        .and_then(|v| v.parse::<i32>().ok())
        .filter(|id| *id > 0)
}

/// Non-negative decimal; anything else is treated as absent
fn parse_price(value: Option<&str>) -> Option<Decimal> {
    non_blank(value)
        .and_then(|v| Decimal::from_str(v).ok())
        .filter(|price| !price.is_sign_negative())
}

fn parse_page(value: Option<&str>) -> u64 {
    non_blank(value)
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|page| *page >= 1)
        .map(|page| (page as u64).min(MAX_PAGE))
        .unwrap_or(1)
}

impl SearchCriteria {
    pub fn from_raw(raw: &RawSearchParams) -> Self {
        Self {
            query: raw.query.as_deref().map(str::trim).unwrap_or_default().to_string(),
            category_id: parse_id(raw.category.as_deref()),
            brand_id: parse_id(raw.brand.as_deref()),
            min_price: parse_price(raw.min_price.as_deref()),
            max_price: parse_price(raw.max_price.as_deref()),
            page: parse_page(raw.page.as_deref()),
        }
    }

    /// True when the request asks for anything beyond the plain catalog listing
    pub fn has_search_criteria(&self) -> bool {
        !self.query.is_empty()
            || self.category_id.is_some()
            || self.brand_id.is_some()
            || self.min_price.is_some()
            || self.max_price.is_some()
    }

    pub fn filter(&self) -> ProductFilter {
        ProductFilter {
            text: Some(self.query.clone()).filter(|q| !q.is_empty()),
            category_id: self.category_id,
            brand_id: self.brand_id,
            min_price: self.min_price,
            max_price: self.max_price,
        }
    }
}

/// The retrieval path that served a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RetrievalPath {
    DirectList,
    Index,
    DbFallback,
}

/// Result of one retrieval path before it is collapsed into a page
#[derive(Debug)]
pub enum Outcome {
    Listing {
        items: Vec<ProductView>,
        total: u64,
    },
    IndexHits {
        items: Vec<ProductView>,
        total: u64,
    },
    Fallback {
        items: Vec<ProductView>,
        total: u64,
        cause: SearchError,
    },
}

impl Outcome {
    pub fn path(&self) -> RetrievalPath {
        match self {
            Outcome::Listing { .. } => RetrievalPath::DirectList,
            Outcome::IndexHits { .. } => RetrievalPath::Index,
            Outcome::Fallback { .. } => RetrievalPath::DbFallback,
        }
    }

    pub fn into_page(self, page: PageRequest) -> ProductPage {
        let (items, total) = match self {
            Outcome::Listing { items, total }
            | Outcome::IndexHits { items, total }
            | Outcome::Fallback { items, total, .. } => (items, total),
        };
        ProductPage::new(items, total, page)
    }
}

/// One page of products, identical in shape for every retrieval path
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductPage {
    pub items: Vec<ProductView>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub last_page: u64,
    /// 1-based position of the first item, absent on an empty page
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl ProductPage {
    pub fn new(items: Vec<ProductView>, total: u64, page: PageRequest) -> Self {
        let last_page = total.div_ceil(page.per_page).max(1);
        let offset = page.offset();
        let (from, to) = if items.is_empty() {
            (None, None)
        } else {
            (
                Some(offset.saturating_add(1)),
                Some(offset.saturating_add(items.len() as u64)),
            )
        };

        Self {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
            last_page,
            from,
            to,
        }
    }
}

/// Chooses and runs the retrieval path for catalog searches
#[derive(Clone)]
pub struct ProductSearchService {
    index: Arc<dyn TextSearchable>,
    catalog: Arc<dyn Listable>,
    per_page: u64,
}

impl ProductSearchService {
    pub fn new(index: Arc<dyn TextSearchable>, catalog: Arc<dyn Listable>) -> Self {
        Self {
            index,
            catalog,
            per_page: PAGE_SIZE,
        }
    }

    /// Runs the search and returns the normalised page
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<ProductPage, ServiceError> {
        let page = PageRequest::new(criteria.page, self.per_page);
        let outcome = self.retrieve(criteria).await?;

        let path = outcome.path();
        let label: &'static str = path.into();
        counter!("catalog_search_requests_total", 1, "path" => label);
        info!(path = %path, page = page.page, "Catalog search served");

        Ok(outcome.into_page(page))
    }

    /// Runs the retrieval path for `criteria` without collapsing the result
    #[instrument(skip(self, criteria), fields(query = %criteria.query, page = criteria.page))]
    pub async fn retrieve(&self, criteria: &SearchCriteria) -> Result<Outcome, ServiceError> {
        let page = PageRequest::new(criteria.page, self.per_page);

        if !criteria.has_search_criteria() {
            let (items, total) = self
                .catalog
                .list_products(&ProductFilter::default(), page)
                .await?;
            return Ok(Outcome::Listing { items, total });
        }

        let filter = criteria.filter();
        let request = SearchRequest {
            query: criteria.query.clone(),
            filter: FilterExpression::from_filter(&filter),
            page: page.page,
            hits_per_page: page.per_page,
        };

        match self.index.search(&request).await {
            Ok(hits) => {
                debug!(hits = hits.ids.len(), total = hits.total, "Resolving index hits");
                let items = self.catalog.products_by_ids(&hits.ids).await?;
                Ok(Outcome::IndexHits {
                    items,
                    total: hits.total,
                })
            }
            Err(cause) => {
                error!(error = %cause, "Meilisearch error: {}", cause);
                counter!("catalog_search_index_failures_total", 1, "reason" => cause.kind());

                let (items, total) = self.catalog.list_products(&filter, page).await?;
                Ok(Outcome::Fallback {
                    items,
                    total,
                    cause,
                })
            }
        }
    }

    /// Options for the category filter control
    pub async fn categories(&self) -> Result<Vec<FacetOption>, ServiceError> {
        self.catalog.active_categories().await
    }

    /// Options for the brand filter control
    pub async fn brands(&self) -> Result<Vec<FacetOption>, ServiceError> {
        self.catalog.active_brands().await
    }
}
