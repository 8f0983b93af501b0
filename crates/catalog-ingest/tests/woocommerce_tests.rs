//! WooCommerce client and synchronizer tests against a mock store

#![allow(clippy::unwrap_used, clippy::expect_used)]

use catalog_common::row::ProductRow;
use catalog_ingest::catalog::{
    CatalogEntry, CatalogService, ErrorKind, SyncOutcome, Synchronizer, TaxonomyKind, WooCommerceClient,
};
use catalog_ingest::context::RunContext;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRODUCTS: &str = "/wp-json/wc/v3/products";

fn client(server: &MockServer) -> WooCommerceClient {
    WooCommerceClient::new(format!("{}/", server.uri()), "ck", "cs", Duration::from_secs(5)).unwrap()
}

fn entry(sku: &str) -> CatalogEntry {
    let row = ProductRow::new(
        4,
        vec![
            ("Name".to_string(), "Red Mug".to_string()),
            ("SKU".to_string(), sku.to_string()),
            ("Price".to_string(), "9.99".to_string()),
            ("Categories".to_string(), "Mugs".to_string()),
        ],
    );
    CatalogEntry::from_row(&row, "publish")
}

#[tokio::test]
async fn test_find_by_sku_uses_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS))
        .and(query_param("sku", "SKU-1"))
        .and(header("authorization", "Basic Y2s6Y3M="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 5, "name": "Red Mug", "sku": "SKU-1", "status": "publish" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS))
        .and(query_param("sku", "SKU-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client(&server);

    let found = client.find_by_sku("SKU-1").await.unwrap().unwrap();
    assert_eq!((found.id, found.sku.as_str()), (5, "SKU-1"));
    assert_eq!(client.find_by_sku("SKU-2").await.unwrap(), None);
    assert_eq!(client.find_by_sku("  ").await.unwrap(), None);
}

#[tokio::test]
async fn test_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRODUCTS))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "woocommerce_rest_product_not_created",
            "message": "The SKU (SKU-1) you are trying to insert is already under processing",
            "data": { "status": 400 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/77", PRODUCTS)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "woocommerce_rest_product_invalid_id",
            "message": "Invalid ID."
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/78", PRODUCTS)))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = client(&server);

    let conflict = client.create(&entry("SKU-1")).await.unwrap_err();
    assert_eq!(conflict.kind, ErrorKind::Conflict);
    assert!(conflict.message.contains("under processing"));

    let missing = client.update(77, &entry("SKU-1")).await.unwrap_err();
    assert_eq!(missing.kind, ErrorKind::NotFound);

    let fatal = client.update(78, &entry("SKU-1")).await.unwrap_err();
    assert_eq!(fatal.kind, ErrorKind::Fatal);
    assert!(fatal.message.contains("upstream exploded"));
}

#[tokio::test]
async fn test_taxonomy_prefers_exact_match() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/categories", PRODUCTS)))
        .and(query_param("search", "Mugs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 3, "name": "Mugs Large" },
            { "id": 4, "name": "mugs" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/tags", PRODUCTS)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 9, "name": "red" })))
        .mount(&server)
        .await;

    let client = client(&server);

    assert_eq!(client.find_taxonomy(TaxonomyKind::Category, "Mugs").await.unwrap(), Some(4));
    assert_eq!(client.create_taxonomy(TaxonomyKind::Tag, "red").await.unwrap(), 9);
}

#[tokio::test]
async fn test_conflict_resolves_to_update_on_final_check() {
    let server = MockServer::start().await;

    // First lookup misses, the one after the conflict finds the product
    Mock::given(method("GET"))
        .and(path(PRODUCTS))
        .and(query_param("sku", "SKU-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRODUCTS))
        .and(query_param("sku", "SKU-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 31, "sku": "SKU-9" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/categories", PRODUCTS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/categories", PRODUCTS)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 12, "name": "Mugs" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PRODUCTS))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "product_invalid_sku",
            "message": "Invalid or duplicated SKU."
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/31", PRODUCTS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 31, "name": "Red Mug", "sku": "SKU-9" })))
        .expect(1)
        .mount(&server)
        .await;

    // No waits configured: a conflict goes straight to the final check
    let synchronizer = Synchronizer::new(Arc::new(client(&server)), Arc::new(RunContext::new()), Vec::new(), 1);
    let outcome = synchronizer.sync_entry(entry("SKU-9")).await;

    match outcome {
        SyncOutcome::Updated { product, waits } => {
            assert_eq!(product.id, 31);
            assert_eq!(waits, 0);
        },
        other => panic!("expected update, got {:?}", other),
    }

    let requests = server.received_requests().await.unwrap();
    let put = requests.iter().find(|r| r.method.to_string() == "PUT").unwrap();
    let body: Value = serde_json::from_slice(&put.body).unwrap();
    assert_eq!(body["sku"], "SKU-9");
    assert_eq!(body["regular_price"], "9.99");
    assert_eq!(body["categories"], json!([{ "id": 12 }]));
    assert!(body.get("category_names").is_none());
}
