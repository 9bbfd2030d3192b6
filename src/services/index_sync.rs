use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::catalog::DocumentSource;
use crate::errors::ServiceError;
use crate::events::{Event, EventHandler};
use crate::search::IndexWriter;

/// Summary of a full reindex
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub documents: u64,
    pub batches: u64,
}

/// Keeps the search index in step with the catalog.
///
/// The index is allowed to lag; failures are reported to the caller, who decides whether to
/// retry. The catalog is never modified here.
#[derive(Clone)]
pub struct IndexSynchronizer {
    source: Arc<dyn DocumentSource>,
    writer: Arc<dyn IndexWriter>,
    batch_size: u64,
}

impl IndexSynchronizer {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        writer: Arc<dyn IndexWriter>,
        batch_size: u64,
    ) -> Self {
        Self {
            source,
            writer,
            batch_size: batch_size.max(1),
        }
    }

    /// Rebuilds the document for one product, removing it when the product no longer exists
    #[instrument(skip(self))]
    pub async fn sync_product(&self, product_id: i32) -> Result<(), ServiceError> {
        match self.source.search_document(product_id).await? {
            Some(document) => {
                self.writer.upsert_documents(&[document]).await?;
            }
            None => {
                warn!(product_id, "Product vanished before indexing; removing document");
                self.writer.delete_document(product_id).await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_product(&self, product_id: i32) -> Result<(), ServiceError> {
        self.writer.delete_document(product_id).await?;
        Ok(())
    }

    /// Pushes every product to the index in id order, batch by batch.
    ///
    /// With `fresh` the index is emptied first so removed products disappear too.
    #[instrument(skip(self))]
    pub async fn reindex_all(&self, fresh: bool) -> Result<ReindexReport, ServiceError> {
        if fresh {
            self.writer.clear_documents().await?;
        }

        let mut report = ReindexReport::default();
        let mut after_id = 0;

        loop {
            let documents = self
                .source
                .search_documents_after(after_id, self.batch_size)
                .await?;
            let Some(last) = documents.last() else {
                break;
            };
            after_id = last.id;

            self.writer.upsert_documents(&documents).await?;
            report.documents += documents.len() as u64;
            report.batches += 1;

            if (documents.len() as u64) < self.batch_size {
                break;
            }
        }

        info!(
            documents = report.documents,
            batches = report.batches,
            "Reindex completed"
        );
        Ok(report)
    }
}

#[async_trait]
impl EventHandler for IndexSynchronizer {
    async fn handle_event(&self, event: Event) -> Result<(), String> {
        let result = match event {
            Event::ProductUpserted(id) => self.sync_product(id).await,
            Event::ProductDeleted(id) => self.remove_product(id).await,
            Event::CatalogReindexRequested => self.reindex_all(false).await.map(|_| ()),
        };
        result.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MockDocumentSource;
    use crate::search::{MockIndexWriter, ProductDocument, SearchError};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn document(id: i32) -> ProductDocument {
        ProductDocument {
            id,
            name: format!("Product {}", id),
            slug: format!("product-{}", id),
            description: None,
            price: 10.0,
            category_id: 1,
            category_name: Some("General".into()),
            brand_id: None,
            brand_name: None,
            stock: 1,
            attributes: Default::default(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn upsert_event_pushes_rebuilt_document() {
        let mut source = MockDocumentSource::new();
        source
            .expect_search_document()
            .with(eq(5))
            .returning(|id| Ok(Some(document(id))));

        let mut writer = MockIndexWriter::new();
        writer
            .expect_upsert_documents()
            .withf(|docs| docs.len() == 1 && docs[0].id == 5)
            .times(1)
            .returning(|_| Ok(()));
        writer.expect_delete_document().times(0);

        let sync = IndexSynchronizer::new(Arc::new(source), Arc::new(writer), 500);
        sync.handle_event(Event::ProductUpserted(5)).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_of_missing_product_deletes_document() {
        let mut source = MockDocumentSource::new();
        source.expect_search_document().returning(|_| Ok(None));

        let mut writer = MockIndexWriter::new();
        writer.expect_upsert_documents().times(0);
        writer
            .expect_delete_document()
            .with(eq(9))
            .times(1)
            .returning(|_| Ok(()));

        let sync = IndexSynchronizer::new(Arc::new(source), Arc::new(writer), 500);
        sync.sync_product(9).await.unwrap();
    }

    #[tokio::test]
    async fn index_failure_is_reported_not_swallowed() {
        let source = MockDocumentSource::new();
        let mut writer = MockIndexWriter::new();
        writer
            .expect_delete_document()
            .returning(|_| Err(SearchError::Unreachable("connection refused".into())));

        let sync = IndexSynchronizer::new(Arc::new(source), Arc::new(writer), 500);
        let err = sync
            .handle_event(Event::ProductDeleted(3))
            .await
            .unwrap_err();
        assert!(err.contains("connection refused"));
    }

    #[tokio::test]
    async fn reindex_walks_batches_by_id() {
        let mut seq = Sequence::new();
        let mut source = MockDocumentSource::new();
        source
            .expect_search_documents_after()
            .with(eq(0), eq(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![document(1), document(4)]));
        source
            .expect_search_documents_after()
            .with(eq(4), eq(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![document(7)]));

        let mut writer = MockIndexWriter::new();
        writer.expect_clear_documents().times(1).returning(|| Ok(()));
        writer
            .expect_upsert_documents()
            .times(2)
            .returning(|_| Ok(()));

        let sync = IndexSynchronizer::new(Arc::new(source), Arc::new(writer), 2);
        let report = sync.reindex_all(true).await.unwrap();

        assert_eq!(
            report,
            ReindexReport {
                documents: 3,
                batches: 2
            }
        );
    }

    #[tokio::test]
    async fn reindex_of_empty_catalog_writes_nothing() {
        let mut source = MockDocumentSource::new();
        source
            .expect_search_documents_after()
            .returning(|_, _| Ok(vec![]));

        let mut writer = MockIndexWriter::new();
        writer.expect_upsert_documents().times(0);
        writer.expect_clear_documents().times(0);

        let sync = IndexSynchronizer::new(Arc::new(source), Arc::new(writer), 500);
        assert_eq!(sync.reindex_all(false).await.unwrap(), ReindexReport::default());
    }
}
