use crate::handlers::common::{created_response, map_service_error};
use crate::services::checkout::{CheckoutOutcome, CheckoutRequest};
use crate::{errors::ApiError, ApiResponse, AppState};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

/// Turn a priced cart plus customer data into a pending order and return the
/// rendered confirmation message with its WhatsApp deep link.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    summary = "Checkout",
    description = "Validate the payload, create a pending order and render its confirmation message",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CheckoutOutcome>),
        (status = 400, description = "Invalid or inconsistent payload", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .checkout
        .checkout(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::success(outcome)))
}
