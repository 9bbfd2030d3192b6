use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{
    IndexWriter, ProductDocument, SearchError, SearchHits, SearchRequest, TextSearchable,
    FILTERABLE_ATTRIBUTES, SORTABLE_ATTRIBUTES,
};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use crate::config::SearchConfig;

/// Settings pushed to the index by the admin command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    pub filterable_attributes: Vec<String>,
    pub sortable_attributes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationSettings {
    pub max_total_hits: u64,
}

impl IndexSettings {
    /// Settings the product index needs for catalog filtering
    pub fn catalog(max_total_hits: u64) -> Self {
        Self {
            filterable_attributes: FILTERABLE_ATTRIBUTES.iter().map(|a| a.to_string()).collect(),
            sortable_attributes: SORTABLE_ATTRIBUTES.iter().map(|a| a.to_string()).collect(),
            pagination: Some(PaginationSettings { max_total_hits }),
        }
    }
}

/// Summary of an asynchronous index task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub task_uid: u64,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    page: u64,
    hits_per_page: u64,
    attributes_to_retrieve: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct HitId {
    id: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponseBody {
    hits: Vec<HitId>,
    total_hits: u64,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
}

/// Meilisearch HTTP client for the product index
#[derive(Debug, Clone)]
pub struct MeilisearchIndex {
    client: Client,
    base_url: String,
    index_uid: String,
    api_key: Option<String>,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl MeilisearchIndex {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| SearchError::InvalidConfiguration(e.to_string()))?;

        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: &SearchConfig, client: Client) -> Self {
        let breaker = CircuitBreaker::new(
            "meilisearch",
            CircuitBreakerConfig {
                failure_threshold: config.breaker_failure_threshold,
                timeout: Duration::from_secs(config.breaker_reset_secs),
                success_threshold: 1,
            },
        );

        Self {
            client,
            base_url: config.host.trim_end_matches('/').to_string(),
            index_uid: config.index.clone(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            timeout: Duration::from_millis(config.timeout_ms),
            breaker,
        }
    }

    pub fn index_uid(&self) -> &str {
        &self.index_uid
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn index_url(&self, suffix: &str) -> String {
        format!("{}/indexes/{}{}", self.base_url, self.index_uid, suffix)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SearchError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(SearchError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> SearchError {
        if err.is_timeout() {
            SearchError::Timeout(self.timeout)
        } else if err.is_decode() {
            SearchError::MalformedResponse(err.to_string())
        } else {
            SearchError::Unreachable(err.to_string())
        }
    }

    async fn task(&self, request: RequestBuilder) -> Result<TaskInfo, SearchError> {
        let response = self.send(request).await?;
        response
            .json::<TaskInfo>()
            .await
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))
    }

    async fn run_search(&self, request: &SearchRequest) -> Result<SearchHits, SearchError> {
        let body = SearchBody {
            q: &request.query,
            filter: request.filter.to_expression(),
            page: request.page.max(1),
            hits_per_page: request.hits_per_page,
            attributes_to_retrieve: ["id"],
        };

        let response = self
            .send(self.client.post(self.index_url("/search")).json(&body))
            .await?;

        let parsed = response
            .json::<SearchResponseBody>()
            .await
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;

        Ok(SearchHits {
            ids: parsed.hits.into_iter().map(|hit| hit.id).collect(),
            total: parsed.total_hits,
        })
    }

    /// Removes every document from the index
    #[instrument(skip(self), fields(index = %self.index_uid))]
    pub async fn delete_all_documents(&self) -> Result<TaskInfo, SearchError> {
        self.task(self.client.delete(self.index_url("/documents")))
            .await
    }

    /// Applies filterable/sortable attributes and pagination limits
    #[instrument(skip(self, settings), fields(index = %self.index_uid))]
    pub async fn update_settings(&self, settings: &IndexSettings) -> Result<TaskInfo, SearchError> {
        self.task(
            self.client
                .patch(self.index_url("/settings"))
                .json(settings),
        )
        .await
    }

    /// Returns `Ok(())` when the index server reports itself available
    pub async fn health(&self) -> Result<(), SearchError> {
        let response = self
            .send(self.client.get(format!("{}/health", self.base_url)))
            .await?;
        let body = response
            .json::<HealthBody>()
            .await
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;

        if body.status == "available" {
            Ok(())
        } else {
            Err(SearchError::Unreachable(format!(
                "index reports status {}",
                body.status
            )))
        }
    }
}

#[async_trait]
impl TextSearchable for MeilisearchIndex {
    #[instrument(skip(self, request), fields(index = %self.index_uid, page = request.page))]
    async fn search(&self, request: &SearchRequest) -> Result<SearchHits, SearchError> {
        match self.breaker.call(|| self.run_search(request)).await {
            Ok(hits) => {
                debug!(hits = hits.ids.len(), total = hits.total, "Index search completed");
                Ok(hits)
            }
            Err(CircuitBreakerError::CircuitOpen) => Err(SearchError::CircuitOpen),
            Err(CircuitBreakerError::ServiceFailure(err)) => Err(err),
        }
    }
}

#[async_trait]
impl IndexWriter for MeilisearchIndex {
    #[instrument(skip(self, documents), fields(index = %self.index_uid, count = documents.len()))]
    async fn upsert_documents(&self, documents: &[ProductDocument]) -> Result<(), SearchError> {
        if documents.is_empty() {
            return Ok(());
        }
        let task = self
            .task(
                self.client
                    .post(self.index_url("/documents"))
                    .query(&[("primaryKey", "id")])
                    .json(documents),
            )
            .await?;
        debug!(task_uid = task.task_uid, "Documents enqueued");
        Ok(())
    }

    #[instrument(skip(self), fields(index = %self.index_uid))]
    async fn delete_document(&self, id: i32) -> Result<(), SearchError> {
        let task = self
            .task(self.client.delete(self.index_url(&format!("/documents/{}", id))))
            .await?;
        debug!(task_uid = task.task_uid, "Document deletion enqueued");
        Ok(())
    }

    async fn clear_documents(&self) -> Result<(), SearchError> {
        let task = self.delete_all_documents().await?;
        debug!(task_uid = task.task_uid, "Index clear enqueued");
        Ok(())
    }
}
