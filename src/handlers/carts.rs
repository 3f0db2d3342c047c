use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::services::cart::{CartLine, PricedCart};
use crate::{errors::ApiError, ApiResponse, AppState};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new().route("/price", post(price_cart))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PriceCartRequest {
    #[validate]
    pub lines: Vec<CartLine>,
}

/// Price a client-held cart against the current catalog. Lines sharing a
/// uniqueness key are merged, stale references are dropped and reported.
#[utoipa::path(
    post,
    path = "/api/v1/carts/price",
    summary = "Price a cart",
    description = "Merge cart lines by key and resolve current catalog prices",
    request_body = PriceCartRequest,
    responses(
        (status = 200, description = "Cart priced", body = ApiResponse<PricedCart>),
        (status = 400, description = "Malformed cart lines", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn price_cart(
    State(state): State<AppState>,
    Json(payload): Json<PriceCartRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let priced = state
        .services
        .cart
        .price(&payload.lines)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(priced)))
}
