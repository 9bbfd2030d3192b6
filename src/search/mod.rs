//! Search index abstraction.
//!
//! The index is an external full-text service mirroring the catalog. Reads go through
//! [`TextSearchable`], synchronisation writes through [`IndexWriter`]. Both are traits so the
//! query composer and the synchroniser can run against stubs.

pub mod document;
pub mod filter;
pub mod meilisearch;

use async_trait::async_trait;
use std::time::Duration;
use strum::IntoStaticStr;

pub use document::{ProductDocument, FILTERABLE_ATTRIBUTES, SORTABLE_ATTRIBUTES};
pub use filter::{FilterExpression, FilterOp, FilterTerm, FilterValue};
pub use meilisearch::{IndexSettings, MeilisearchIndex};

/// A query against the index: free text (empty means match all), filter and page window.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub filter: FilterExpression,
    /// 1-indexed page
    pub page: u64,
    pub hits_per_page: u64,
}

/// Ranked product identifiers plus the total number of matches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHits {
    pub ids: Vec<i32>,
    pub total: u64,
}

/// Errors that can occur while talking to the search index
#[derive(Debug, thiserror::Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SearchError {
    #[error("Search index unreachable: {0}")]
    Unreachable(String),

    #[error("Search index timed out after {0:?}")]
    Timeout(Duration),

    #[error("Search index returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed search index response: {0}")]
    MalformedResponse(String),

    #[error("Search index circuit breaker is open")]
    CircuitOpen,

    #[error("Invalid search configuration: {0}")]
    InvalidConfiguration(String),
}

impl SearchError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextSearchable: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchHits, SearchError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexWriter: Send + Sync {
    async fn upsert_documents(&self, documents: &[ProductDocument]) -> Result<(), SearchError>;

    async fn delete_document(&self, id: i32) -> Result<(), SearchError>;

    /// Removes every document from the index
    async fn clear_documents(&self) -> Result<(), SearchError>;
}
