use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
Order checkout and fulfillment API for a WhatsApp storefront.

- **Carts**: price client-held cart lines against the current catalog
- **Checkout**: turn a priced cart into a pending order plus its confirmation message
- **Orders**: inspect orders, drive the status state machine (stock is decremented
  once, on the first transition into `confirmed`), and render customer messages
  with wa.me deep links

List endpoints support `page` and `limit` query parameters (default 1 / 20).
        "#,
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "carts", description = "Cart pricing endpoints"),
        (name = "checkout", description = "Checkout endpoints"),
        (name = "orders", description = "Order management endpoints"),
    ),
    paths(
        crate::handlers::carts::price_cart,
        crate::handlers::checkout::checkout,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::get_order_items,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::render_order_message,
        crate::handlers::orders::delete_order,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            // Cart types
            crate::services::cart::CartLine,
            crate::services::cart::PricedItem,
            crate::services::cart::PricedCart,
            crate::services::cart::DroppedLine,
            crate::services::cart::DropReason,
            crate::handlers::carts::PriceCartRequest,

            // Checkout types
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::CheckoutOutcome,
            crate::services::orders::CustomerData,
            crate::services::orders::PaymentMethod,

            // Order types
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::order_status::OrderStatus,
            crate::services::order_status::DecrementedItem,
            crate::services::order_status::FailedDecrement,
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::handlers::orders::OrderStatusUpdateResponse,
            crate::handlers::orders::RenderMessageRequest,
            crate::handlers::orders::RenderedMessage,
            crate::notifications::template::MessageVariant,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
