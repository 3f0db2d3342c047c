use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter, TextEncoder};

lazy_static! {
    pub static ref ORDERS_CREATED: IntCounter =
        register_int_counter!("orders_created_total", "Total number of orders created")
            .expect("metric can be created");
    pub static ref ORDERS_CONFIRMED: IntCounter =
        register_int_counter!("orders_confirmed_total", "Total number of orders confirmed")
            .expect("metric can be created");
    pub static ref STOCK_DECREMENT_FAILURES: IntCounter = register_int_counter!(
        "stock_decrement_failures_total",
        "Total number of rejected stock decrements"
    )
    .expect("metric can be created");
    pub static ref MESSAGES_RENDERED: IntCounter = register_int_counter!(
        "order_messages_rendered_total",
        "Total number of rendered order messages"
    )
    .expect("metric can be created");
}

/// Prometheus text exposition of the default registry.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}
