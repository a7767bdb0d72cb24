//! Integration tests for the JSON API and health checks.
//!
//! Run with: cargo test -p product-stream-integration-tests

use std::sync::Arc;

use product_stream_integration_tests::{FailingStore, TestContext, test_config};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_api_lists_upper_cased_products() {
    let ctx = TestContext::seeded().await;
    let resp = ctx
        .client
        .get(ctx.url("/api/productos"))
        .send()
        .await
        .expect("Failed to list products");

    assert_eq!(resp.status(), StatusCode::OK);
    let products: Vec<Value> = resp.json().await.expect("Failed to parse products");
    let names: Vec<&str> = products
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(
        names,
        ["TELEVISOR", "RADIO", "LAPTOP", "TABLET", "IMPRESORA", "CELULAR"]
    );
    assert_eq!(products[0]["price"], "456.89");
}

#[tokio::test]
async fn test_api_show_returns_stored_product() {
    let ctx = TestContext::seeded().await;
    let products: Vec<Value> = ctx
        .client
        .get(ctx.url("/api/productos"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Failed to parse products");
    let id = products[1]["id"].as_str().expect("product without id");

    let product: Value = ctx
        .client
        .get(ctx.url(&format!("/api/productos/{id}")))
        .send()
        .await
        .expect("Failed to get product")
        .json()
        .await
        .expect("Failed to parse product");

    assert_eq!(product["id"], id);
    assert_eq!(product["name"], "Radio");
    assert_eq!(product["price"], "89.00");
}

#[tokio::test]
async fn test_api_show_missing_is_404() {
    let ctx = TestContext::seeded().await;
    let resp = ctx
        .client
        .get(ctx.url("/api/productos/nope"))
        .send()
        .await
        .expect("Failed to get product");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::seeded().await;

    let resp = ctx
        .client
        .get(ctx.url("/health"))
        .send()
        .await
        .expect("Failed to get health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("Failed to read body"), "ok");

    let resp = ctx
        .client
        .get(ctx.url("/health/ready"))
        .send()
        .await
        .expect("Failed to get readiness");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_readiness_fails_when_store_is_down() {
    let store = FailingStore::seeded(0).await;
    let ctx = TestContext::spawn(Arc::new(store), test_config()).await;

    let resp = ctx
        .client
        .get(ctx.url("/health/ready"))
        .send()
        .await
        .expect("Failed to get readiness");
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
