mod common;

use catalog_search::services::{
    catalog_admin::{CategoryChanges, ProductChanges},
    index_sync::ReindexReport,
};
use common::{TestApp, INDEX};
use rust_decimal_macros::dec;
use serde_json::Value;

fn documents_path() -> String {
    format!("/indexes/{}/documents", INDEX)
}

fn posted_documents(requests: &[wiremock::Request]) -> Vec<Value> {
    requests
        .iter()
        .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
        .flat_map(|body| body.as_array().cloned().unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn created_product_is_pushed_with_denormalised_names() {
    let app = TestApp::new().await;
    let category = app.seed_category("Kitchen", None).await;
    let brand = app.seed_brand("Hearth").await;
    let product = app
        .seed_product("Cast Iron Pan", category.id, Some(brand.id), dec!(34.00))
        .await;

    let requests = app.wait_for_index_requests("POST", &documents_path(), 1).await;
    let documents = posted_documents(&requests);
    let document = documents
        .iter()
        .find(|d| d["id"] == product.id)
        .expect("document for the new product");

    assert_eq!(document["name"], "Cast Iron Pan");
    assert_eq!(document["category_id"], category.id);
    assert_eq!(document["category_name"], "Kitchen");
    assert_eq!(document["brand_name"], "Hearth");
    assert_eq!(document["price"], 34.0);
}

#[tokio::test]
async fn updated_product_is_pushed_again() {
    let app = TestApp::new().await;
    let category = app.seed_category("Kitchen", None).await;
    let product = app.seed_product("Pan", category.id, None, dec!(20)).await;
    app.wait_for_index_requests("POST", &documents_path(), 1).await;

    app.state
        .admin
        .update_product(
            product.id,
            ProductChanges {
                name: Some("Skillet".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let requests = app.wait_for_index_requests("POST", &documents_path(), 2).await;
    let names: Vec<Value> = posted_documents(&requests)
        .into_iter()
        .filter(|d| d["id"] == product.id)
        .map(|d| d["name"].clone())
        .collect();
    assert_eq!(names.last().and_then(Value::as_str), Some("Skillet"));
}

#[tokio::test]
async fn deleted_product_is_removed_from_the_index() {
    let app = TestApp::new().await;
    let category = app.seed_category("Garden", None).await;
    let product = app.seed_product("Trowel", category.id, None, dec!(7.25)).await;

    app.state.admin.delete_product(product.id).await.unwrap();

    let delete_path = format!("{}/{}", documents_path(), product.id);
    let requests = app.wait_for_index_requests("DELETE", &delete_path, 1).await;
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn category_rename_refreshes_its_products() {
    let app = TestApp::new().await;
    let category = app.seed_category("Outdoor", None).await;
    let product = app.seed_product("Tent", category.id, None, dec!(120)).await;
    app.wait_for_index_requests("POST", &documents_path(), 1).await;

    app.state
        .admin
        .update_category(
            category.id,
            CategoryChanges {
                name: Some("Camping".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let requests = app.wait_for_index_requests("POST", &documents_path(), 2).await;
    let latest = posted_documents(&requests)
        .into_iter()
        .filter(|d| d["id"] == product.id)
        .last()
        .expect("document for the tent");
    assert_eq!(latest["category_name"], "Camping");
}

#[tokio::test]
async fn fresh_reindex_clears_then_walks_the_catalog_in_batches() {
    let app = TestApp::builder()
        .without_sync_worker()
        .reindex_batch_size(2)
        .build()
        .await;
    let category = app.seed_category("Tools", None).await;
    let mut ids = Vec::new();
    for name in ["Hammer", "Saw", "Chisel"] {
        ids.push(app.seed_product(name, category.id, None, dec!(15)).await.id);
    }

    let report = app.state.sync.reindex_all(true).await.unwrap();

    assert_eq!(
        report,
        ReindexReport {
            documents: 3,
            batches: 2
        }
    );
    assert_eq!(app.index_requests("DELETE", &documents_path()).await.len(), 1);

    let posts = app.index_requests("POST", &documents_path()).await;
    assert_eq!(posts.len(), 2);
    let pushed: Vec<i64> = posted_documents(&posts)
        .iter()
        .filter_map(|d| d["id"].as_i64())
        .collect();
    assert_eq!(pushed, ids.iter().map(|id| *id as i64).collect::<Vec<_>>());
}

#[tokio::test]
async fn index_outage_does_not_block_catalog_writes() {
    let app = TestApp::new().await;
    app.meili.reset().await;

    let category = app.seed_category("Books", None).await;
    let product = app.seed_product("Atlas", category.id, None, dec!(30)).await;

    let stored = app.state.search.categories().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(product.id > 0);
}
