//! Integration tests for cart pricing and the checkout flow.

mod common;

use axum::http::Method;
use common::{decimal_field, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn pricing_merges_duplicate_lines_and_resolves_prices() {
    let app = TestApp::new().await;
    let product = app.seed_product("Home Jersey", dec!(100.00), dec!(20.00)).await;
    app.seed_variant(product.id, "M", None, 10, true).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/carts/price",
            Some(json!({
                "lines": [
                    { "product_id": product.id, "variant_size": "M", "quantity": 1 },
                    { "product_id": product.id, "variant_size": "M", "quantity": 1 },
                ]
            })),
        )
        .await;

    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let data = &body["data"];

    assert_eq!(data["items"].as_array().unwrap().len(), 1);
    assert_eq!(data["items"][0]["quantity"], 2);
    assert_eq!(decimal_field(&data["items"][0]["unit_price"]), dec!(100.00));
    assert_eq!(decimal_field(&data["total"]), dec!(200.00));
    assert!(data["dropped"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn pricing_adds_the_surcharge_for_customized_lines() {
    let app = TestApp::new().await;
    let product = app.seed_product("Home Jersey", dec!(100.00), dec!(20.00)).await;
    app.seed_variant(product.id, "M", None, 10, true).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/carts/price",
            Some(json!({
                "lines": [{
                    "product_id": product.id,
                    "variant_size": "M",
                    "quantity": 2,
                    "custom_name": "JOAO",
                    "custom_number": "10"
                }]
            })),
        )
        .await;

    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let item = &body["data"]["items"][0];

    assert_eq!(decimal_field(&item["unit_price"]), dec!(120.00));
    assert_eq!(decimal_field(&item["customization_price"]), dec!(20.00));
    assert_eq!(decimal_field(&body["data"]["total"]), dec!(240.00));
}

#[tokio::test]
async fn pricing_drops_stale_product_references_silently() {
    let app = TestApp::new().await;
    let product = app.seed_product("Home Jersey", dec!(100.00), dec!(0)).await;
    app.seed_variant(product.id, "M", None, 10, false).await;
    let stale_id = uuid::Uuid::new_v4();

    let response = app
        .request(
            Method::POST,
            "/api/v1/carts/price",
            Some(json!({
                "lines": [
                    { "product_id": product.id, "variant_size": "M", "quantity": 1 },
                    { "product_id": stale_id, "variant_size": "M", "quantity": 3 },
                ]
            })),
        )
        .await;

    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let data = &body["data"];

    assert_eq!(data["items"].as_array().unwrap().len(), 1);
    assert_eq!(decimal_field(&data["total"]), dec!(100.00));

    let dropped = data["dropped"].as_array().unwrap();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0]["reason"], "product_unavailable");
    assert_eq!(dropped[0]["product_id"].as_str().unwrap(), stale_id.to_string());
}

#[tokio::test]
async fn checkout_creates_a_pending_order_without_touching_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Home Jersey", dec!(100.00), dec!(20.00)).await;
    let variant = app.seed_variant(product.id, "M", None, 10, true).await;

    let priced = app
        .request(
            Method::POST,
            "/api/v1/carts/price",
            Some(json!({
                "lines": [{ "product_id": product.id, "variant_size": "M", "quantity": 2 }]
            })),
        )
        .await;
    let priced = response_json(priced).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "items": priced["data"]["items"],
                "total": priced["data"]["total"],
                "customer": {
                    "name": "Joao",
                    "phone": "+55 (11) 98888-7777",
                    "address": "Rua das Flores, 10",
                    "payment_method": "credit",
                    "installments": 3
                }
            })),
        )
        .await;

    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let data = &body["data"];

    let order_number = data["order"]["order_number"].as_str().unwrap();
    assert!(order_number.starts_with("ORD-"));
    assert_eq!(data["order"]["status"], "pending");
    assert_eq!(decimal_field(&data["order"]["total"]), dec!(200.00));

    let message = data["message"].as_str().unwrap();
    assert!(message.contains(order_number));
    assert!(message.contains("2x Home Jersey"));
    assert!(message.contains("Credit card (3x)"));

    let link = data["whatsapp_link"].as_str().unwrap();
    assert!(link.starts_with("https://wa.me/5500000000000?text="));

    // Stock is only decremented on confirmation, never at checkout.
    assert_eq!(app.variant_stock(variant.id).await, 10);

    // The created order is immediately retrievable by id and by number.
    let order_id = data["order"]["id"].as_str().unwrap();
    let by_id = app
        .request(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(by_id.status(), 200);

    let by_number = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/by-number/{}", order_number),
            None,
        )
        .await;
    assert_eq!(by_number.status(), 200);
    let by_number = response_json(by_number).await;
    assert_eq!(by_number["data"]["id"].as_str().unwrap(), order_id);
}

#[tokio::test]
async fn checkout_persists_item_snapshots() {
    let app = TestApp::new().await;
    let product = app.seed_product("Away Jersey", dec!(80.00), dec!(15.00)).await;
    app.seed_variant(product.id, "L", Some("Blue"), 5, true).await;

    let priced = app
        .request(
            Method::POST,
            "/api/v1/carts/price",
            Some(json!({
                "lines": [{
                    "product_id": product.id,
                    "variant_size": "L",
                    "color": "Blue",
                    "quantity": 1,
                    "custom_name": "ANA"
                }]
            })),
        )
        .await;
    let priced = response_json(priced).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "items": priced["data"]["items"],
                "total": priced["data"]["total"],
                "customer": { "name": "Ana", "phone": "5511977776666", "address": "Av. Central, 2" }
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();

    let items = app
        .request(Method::GET, &format!("/api/v1/orders/{}/items", order_id), None)
        .await;
    assert_eq!(items.status(), 200);
    let items = response_json(items).await;
    let item = &items["data"][0];

    assert_eq!(item["product_name"], "Away Jersey");
    assert_eq!(item["variant_size"], "L");
    assert_eq!(item["color"], "Blue");
    assert_eq!(item["custom_name"], "ANA");
    assert_eq!(decimal_field(&item["unit_price"]), dec!(95.00));
    assert_eq!(decimal_field(&item["customization_price"]), dec!(15.00));
    assert_eq!(decimal_field(&item["line_total"]), dec!(95.00));
}

#[tokio::test]
async fn checkout_rejects_a_tampered_total() {
    let app = TestApp::new().await;
    let product = app.seed_product("Home Jersey", dec!(100.00), dec!(0)).await;
    app.seed_variant(product.id, "M", None, 10, false).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "items": [{
                    "product_id": product.id,
                    "product_name": "Home Jersey",
                    "variant_size": "M",
                    "quantity": 2,
                    "unit_price": "100.00"
                }],
                "total": "150.00",
                "customer": { "name": "Joao", "phone": "5511988887777", "address": "Rua X" }
            })),
        )
        .await;

    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("150"));
    assert!(message.contains("200"));
}

#[tokio::test]
async fn checkout_rejects_an_empty_cart() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "items": [],
                "total": "0",
                "customer": { "name": "Joao", "phone": "5511988887777", "address": "Rua X" }
            })),
        )
        .await;

    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().to_lowercase().contains("empty"));
}

#[tokio::test]
async fn checkout_rejects_blank_customer_fields() {
    let app = TestApp::new().await;
    let product = app.seed_product("Home Jersey", dec!(100.00), dec!(0)).await;
    app.seed_variant(product.id, "M", None, 10, false).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "items": [{
                    "product_id": product.id,
                    "product_name": "Home Jersey",
                    "variant_size": "M",
                    "quantity": 1,
                    "unit_price": "100.00"
                }],
                "total": "100.00",
                "customer": { "name": "   ", "phone": "5511988887777", "address": "Rua X" }
            })),
        )
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn orders_are_listed_newest_first_with_status_filter() {
    let app = TestApp::new().await;
    let product = app.seed_product("Home Jersey", dec!(50.00), dec!(0)).await;
    app.seed_variant(product.id, "M", None, 100, false).await;

    for _ in 0..3 {
        let response = app
            .request(
                Method::POST,
                "/api/v1/checkout",
                Some(json!({
                    "items": [{
                        "product_id": product.id,
                        "product_name": "Home Jersey",
                        "variant_size": "M",
                        "quantity": 1,
                        "unit_price": "50.00"
                    }],
                    "total": "50.00",
                    "customer": { "name": "Joao", "phone": "5511988887777", "address": "Rua X" }
                })),
            )
            .await;
        assert_eq!(response.status(), 201);
    }

    let listed = app.request(Method::GET, "/api/v1/orders?limit=2", None).await;
    assert_eq!(listed.status(), 200);
    let listed = response_json(listed).await;

    assert_eq!(listed["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(listed["data"]["total"], 3);
    assert_eq!(listed["data"]["total_pages"], 2);

    let pending = app
        .request(Method::GET, "/api/v1/orders?status=pending", None)
        .await;
    let pending = response_json(pending).await;
    assert_eq!(pending["data"]["total"], 3);

    let confirmed = app
        .request(Method::GET, "/api/v1/orders?status=confirmed", None)
        .await;
    let confirmed = response_json(confirmed).await;
    assert_eq!(confirmed["data"]["total"], 0);

    let bogus = app
        .request(Method::GET, "/api/v1/orders?status=archived", None)
        .await;
    assert_eq!(bogus.status(), 400);
}

#[tokio::test]
async fn deleting_an_order_removes_it_and_its_items() {
    let app = TestApp::new().await;
    let product = app.seed_product("Home Jersey", dec!(50.00), dec!(0)).await;
    app.seed_variant(product.id, "M", None, 10, false).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "items": [{
                    "product_id": product.id,
                    "product_name": "Home Jersey",
                    "variant_size": "M",
                    "quantity": 1,
                    "unit_price": "50.00"
                }],
                "total": "50.00",
                "customer": { "name": "Joao", "phone": "5511988887777", "address": "Rua X" }
            })),
        )
        .await;
    let body = response_json(response).await;
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();

    let deleted = app
        .request(Method::DELETE, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(deleted.status(), 204);

    let gone = app
        .request(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(gone.status(), 404);

    let again = app
        .request(Method::DELETE, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(again.status(), 404);
}
