#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use catalog_search::{
    build_router,
    config::AppConfig,
    db,
    entities::{BrandModel, CategoryModel, ProductModel},
    events::{self, Event},
    search::MeilisearchIndex,
    services::catalog_admin::{NewBrand, NewCategory, NewProduct},
    AppState,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request as MockRequest, ResponseTemplate};

pub const INDEX: &str = "products";
pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Application wired to an in-memory SQLite catalog and a mocked Meilisearch server
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub meili: MockServer,
    /// Catalog events not consumed by a sync worker
    pub pending_events: Option<mpsc::Receiver<Event>>,
    event_task: Option<tokio::task::JoinHandle<()>>,
}

pub struct TestAppBuilder {
    sync_worker: bool,
    reindex_batch_size: u64,
    admin_token: Option<String>,
}

impl TestAppBuilder {
    /// Leaves catalog events queued instead of pushing them to the index
    pub fn without_sync_worker(mut self) -> Self {
        self.sync_worker = false;
        self
    }

    pub fn reindex_batch_size(mut self, size: u64) -> Self {
        self.reindex_batch_size = size;
        self
    }

    pub fn admin_token(mut self, token: Option<&str>) -> Self {
        self.admin_token = token.map(str::to_string);
        self
    }

    pub async fn build(self) -> TestApp {
        let meili = MockServer::start().await;

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.search.host = meili.uri();
        cfg.search.timeout_ms = 400;
        cfg.search.connect_timeout_ms = 200;
        cfg.search.reindex_batch_size = self.reindex_batch_size;
        cfg.admin_token = self.admin_token;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let index = Arc::new(MeilisearchIndex::new(&cfg.search).expect("search client"));
        let (state, event_rx) = AppState::new(Arc::new(pool), cfg, index);

        let (event_task, pending_events) = if self.sync_worker {
            let task = tokio::spawn(events::process_events(
                event_rx,
                Arc::new(state.sync.clone()),
            ));
            (Some(task), None)
        } else {
            (None, Some(event_rx))
        };

        mount_document_writes(&meili).await;

        TestApp {
            router: build_router(state.clone()),
            state,
            meili,
            pending_events,
            event_task,
        }
    }
}

fn task_accepted() -> ResponseTemplate {
    ResponseTemplate::new(202).set_body_json(json!({
        "taskUid": 1,
        "indexUid": INDEX,
        "status": "enqueued",
        "type": "documentAdditionOrUpdate",
        "enqueuedAt": "2024-01-01T00:00:00Z"
    }))
}

/// Accepts every document write so synchronisation never fails unless a test says so
async fn mount_document_writes(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/indexes/{}/documents", INDEX)))
        .respond_with(task_accepted())
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(format!(r"^/indexes/{}/documents(/\d+)?$", INDEX)))
        .respond_with(task_accepted())
        .mount(server)
        .await;
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            sync_worker: true,
            reindex_batch_size: 500,
            admin_token: Some(ADMIN_TOKEN.to_string()),
        }
    }

    pub async fn new() -> Self {
        Self::builder().build().await
    }

    /// Send a request against the router
    pub async fn request(&self, method: Method, uri: &str) -> axum::response::Response {
        self.request_with_headers(method, uri, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// GET `uri` and decode the JSON body
    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let response = self.request(Method::GET, uri).await;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("json body")
        };
        (status, value)
    }

    /// POST to an admin route with the test bearer token
    pub async fn post_as_admin(&self, uri: &str) -> axum::response::Response {
        let authorization = format!("Bearer {}", ADMIN_TOKEN);
        self.request_with_headers(
            Method::POST,
            uri,
            &[("authorization", authorization.as_str())],
        )
        .await
    }

    /// Meilisearch answers searches with the given ranked ids
    pub async fn mock_search_hits(&self, ids: &[i32], total: u64) {
        let hits: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
        Mock::given(method("POST"))
            .and(path(format!("/indexes/{}/search", INDEX)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": hits,
                "query": "",
                "processingTimeMs": 1,
                "hitsPerPage": 24,
                "page": 1,
                "totalPages": 1,
                "totalHits": total
            })))
            .mount(&self.meili)
            .await;
    }

    /// Meilisearch fails every search with `status`
    pub async fn mock_search_status(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(format!("/indexes/{}/search", INDEX)))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "message": "index unavailable",
                "code": "internal",
                "type": "internal"
            })))
            .mount(&self.meili)
            .await;
    }

    /// Requests Meilisearch received for `http_method` on `request_path`
    pub async fn index_requests(&self, http_method: &str, request_path: &str) -> Vec<MockRequest> {
        self.meili
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path() == request_path)
            .collect()
    }

    /// Polls until Meilisearch has seen `count` matching requests
    pub async fn wait_for_index_requests(
        &self,
        http_method: &str,
        request_path: &str,
        count: usize,
    ) -> Vec<MockRequest> {
        for _ in 0..50 {
            let seen = self.index_requests(http_method, request_path).await;
            if seen.len() >= count {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.index_requests(http_method, request_path).await
    }

    pub async fn seed_category(&self, name: &str, parent_id: Option<i32>) -> CategoryModel {
        self.state
            .admin
            .create_category(NewCategory {
                name: name.to_string(),
                slug: None,
                parent_id,
                description: None,
                active: true,
            })
            .await
            .expect("seed category")
    }

    pub async fn seed_brand(&self, name: &str) -> BrandModel {
        self.state
            .admin
            .create_brand(NewBrand {
                name: name.to_string(),
                slug: None,
                description: None,
                logo_url: None,
                active: true,
            })
            .await
            .expect("seed brand")
    }

    pub async fn seed_product(
        &self,
        name: &str,
        category_id: i32,
        brand_id: Option<i32>,
        price: Decimal,
    ) -> ProductModel {
        self.state
            .admin
            .create_product(NewProduct {
                name: name.to_string(),
                slug: None,
                description: Some(format!("{} for integration tests", name)),
                price,
                category_id,
                brand_id,
                attributes: BTreeMap::new(),
                stock: 5,
                image_url: None,
            })
            .await
            .expect("seed product")
    }
}

/// Ids of the products on a search page, in order
pub fn page_ids(body: &Value) -> Vec<i64> {
    body["products"]["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|item| item["id"].as_i64().expect("id"))
        .collect()
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
    }
}
