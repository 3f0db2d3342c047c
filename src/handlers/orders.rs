use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    response::Json,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::handlers::common::no_content_response;
use crate::metrics::MESSAGES_RENDERED;
use crate::notifications::deeplink::whatsapp_link;
use crate::notifications::template::{render, ItemSnapshot, MessageVariant, OrderSnapshot};
use crate::services::order_status::{
    DecrementedItem, FailedDecrement, OrderStatus, StatusUpdateOutcome,
};
use crate::services::orders::{
    order_item_to_response, order_to_response, OrderItemResponse, OrderResponse,
};
use crate::{errors::ServiceError, ApiResponse, AppState, ListQuery, PaginatedResponse};

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id", delete(delete_order))
        .route("/orders/by-number/:order_number", get(get_order_by_number))
        .route("/orders/:id/items", get(get_order_items))
        .route("/orders/:id/status", put(update_order_status))
        .route("/orders/:id/message", post(render_order_message))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStatusUpdateResponse {
    pub order: OrderResponse,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub decremented: Vec<DecrementedItem>,
    pub failed: Vec<FailedDecrement>,
}

impl From<StatusUpdateOutcome> for OrderStatusUpdateResponse {
    fn from(outcome: StatusUpdateOutcome) -> Self {
        Self {
            order: order_to_response(&outcome.order),
            previous_status: outcome.previous_status,
            new_status: outcome.new_status,
            decremented: outcome.decremented,
            failed: outcome.failed,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenderMessageRequest {
    #[serde(default = "default_variant")]
    pub variant: MessageVariant,
    /// Overrides both the store-configured and the built-in template.
    #[serde(default)]
    pub template: Option<String>,
}

fn default_variant() -> MessageVariant {
    MessageVariant::Order
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RenderedMessage {
    pub variant: MessageVariant,
    pub message: String,
    pub whatsapp_link: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Get a paginated list of orders, newest first, with optional status filtering",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20, max: 100)"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<PaginatedResponse<OrderResponse>>),
        (status = 400, description = "Invalid status filter", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(OrderStatus::parse(raw)?),
        None => None,
    };

    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);

    let (orders, total) = state.services.order.list_orders(page, limit, status).await?;

    let items: Vec<OrderResponse> = orders.iter().map(order_to_response).collect();
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    description = "Get a single order by its internal id",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.order.get_order(id).await?;

    Ok(Json(ApiResponse::success(order_to_response(&order))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/by-number/{order_number}",
    summary = "Get order by number",
    description = "Get a single order by its human-readable order number",
    params(("order_number" = String, Path, description = "Human-readable order number")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .order
        .get_order_by_number(&order_number)
        .await?;

    Ok(Json(ApiResponse::success(order_to_response(&order))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/items",
    summary = "Get order items",
    description = "Get the immutable item snapshots of an order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Items retrieved successfully", body = ApiResponse<Vec<OrderItemResponse>>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<OrderItemResponse>>>, ServiceError> {
    let items = state.services.order.get_order_items(id).await?;

    let items: Vec<OrderItemResponse> = items.iter().map(order_item_to_response).collect();

    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    description = "Move an order to a new status. The first transition into `confirmed` decrements \
                   stock once per item; per-item failures are reported without rolling the status back.",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderStatusUpdateResponse>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent update conflict", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderStatusUpdateResponse>>, ServiceError> {
    let status = OrderStatus::parse(&request.status)?;

    let outcome = state
        .services
        .order_status
        .set_status(id, status, request.notes)
        .await?;

    Ok(Json(ApiResponse::success(outcome.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/message",
    summary = "Render order message",
    description = "Render the order or recovery message for an existing order. The order variant \
                   links to the store's WhatsApp; the recovery variant links to the customer's.",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = RenderMessageRequest,
    responses(
        (status = 200, description = "Message rendered", body = ApiResponse<RenderedMessage>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn render_order_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RenderMessageRequest>,
) -> Result<Json<ApiResponse<RenderedMessage>>, ServiceError> {
    let order = state.services.order.get_order(id).await?;
    let items = state.services.order.get_order_items(id).await?;

    let snapshot = OrderSnapshot::from_order(&order, items.iter().map(ItemSnapshot::from).collect());

    let store = &state.config.store;
    let configured = match request.variant {
        MessageVariant::Order => store.order_template.as_deref(),
        MessageVariant::Recovery => store.recovery_template.as_deref(),
    };
    let template = request
        .template
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or(configured)
        .unwrap_or_else(|| request.variant.default_template());

    let message = render(template, &snapshot);

    let phone = match request.variant {
        MessageVariant::Order => store.whatsapp_phone.as_str(),
        MessageVariant::Recovery => order.customer_phone.as_str(),
    };
    let link = whatsapp_link(phone, &message);
    MESSAGES_RENDERED.inc();

    Ok(Json(ApiResponse::success(RenderedMessage {
        variant: request.variant,
        message,
        whatsapp_link: link,
    })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete order",
    description = "Administrative deletion of an order and its items",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    state.services.order.delete_order(id).await?;

    Ok(no_content_response())
}
