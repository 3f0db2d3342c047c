use crate::config::StoreConfig;
use crate::errors::ServiceError;
use crate::metrics::MESSAGES_RENDERED;
use crate::notifications::deeplink::whatsapp_link;
use crate::notifications::template::{render, ItemSnapshot, MessageVariant, OrderSnapshot};
use crate::services::cart::PricedItem;
use crate::services::orders::{
    order_to_response, CreateOrderInput, CustomerData, OrderResponse, OrderService,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

/// Checkout payload as sent by the storefront. Items arrive already priced
/// by the cart aggregator; the total is still treated as untrusted input.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[validate]
    pub items: Vec<PricedItem>,
    pub total: Decimal,
    #[validate]
    pub customer: CustomerData,
}

/// Everything the storefront needs after a successful checkout: the created
/// order, the rendered confirmation message, and the deep link that opens a
/// chat with the store with that message prefilled.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutOutcome {
    pub order: OrderResponse,
    pub message: String,
    pub whatsapp_link: String,
}

/// Turns a validated cart into a pending order plus its notification message.
#[derive(Clone)]
pub struct CheckoutService {
    orders: OrderService,
    store: StoreConfig,
}

impl CheckoutService {
    pub fn new(orders: OrderService, store: StoreConfig) -> Self {
        Self { orders, store }
    }

    /// Validates the payload, persists the order with status `pending`, and
    /// renders the order confirmation message. Inventory is untouched here.
    #[instrument(skip(self, request), fields(item_count = request.items.len()))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutOutcome, ServiceError> {
        validate_checkout(&request)?;

        let order = self
            .orders
            .create_order(CreateOrderInput {
                items: request.items.clone(),
                total: request.total,
                customer: request.customer.clone(),
            })
            .await?;

        let items: Vec<ItemSnapshot> = request.items.iter().map(ItemSnapshot::from).collect();
        let snapshot = OrderSnapshot::from_order(&order, items);

        let template = self
            .store
            .order_template
            .as_deref()
            .unwrap_or_else(|| MessageVariant::Order.default_template());

        let message = render(template, &snapshot);
        let link = whatsapp_link(&self.store.whatsapp_phone, &message);
        MESSAGES_RENDERED.inc();

        info!(order_number = %order.order_number, "checkout completed");

        Ok(CheckoutOutcome {
            order: order_to_response(&order),
            message,
            whatsapp_link: link,
        })
    }
}

/// Rejects malformed or inconsistent payloads before anything is persisted.
/// Every rejection names the offending field or item so the caller can fix
/// the payload instead of guessing.
fn validate_checkout(request: &CheckoutRequest) -> Result<(), ServiceError> {
    request.validate()?;

    if request.items.is_empty() {
        return Err(ServiceError::ValidationError("Cart is empty".to_string()));
    }

    if request.customer.name.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Customer name is required".to_string(),
        ));
    }

    if request.customer.phone.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Customer phone is required".to_string(),
        ));
    }

    if let Some(installments) = request.customer.installments {
        if installments < 1 {
            return Err(ServiceError::ValidationError(
                "Installments must be at least 1".to_string(),
            ));
        }
    }

    for (index, item) in request.items.iter().enumerate() {
        if item.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Item {} has a negative unit price",
                index + 1
            )));
        }

        if item.customization_price.unwrap_or_default() < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Item {} has a negative customization price",
                index + 1
            )));
        }
    }

    // The client computed this total; recompute and refuse mismatches.
    let computed: Decimal = request.items.iter().map(PricedItem::line_total).sum();
    if computed != request.total {
        return Err(ServiceError::ValidationError(format!(
            "Order total {} does not match the sum of item totals {}",
            request.total, computed
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn item(quantity: i32, unit_price: Decimal) -> PricedItem {
        PricedItem {
            product_id: Uuid::new_v4(),
            product_name: "Home Jersey".to_string(),
            variant_size: "M".to_string(),
            color: None,
            quantity,
            unit_price,
            custom_name: None,
            custom_number: None,
            customization_price: None,
        }
    }

    fn customer() -> CustomerData {
        CustomerData {
            name: "Joao".to_string(),
            phone: "5511999990000".to_string(),
            address: "Rua das Flores, 10".to_string(),
            payment_method: None,
            installments: None,
        }
    }

    fn request(items: Vec<PricedItem>, total: Decimal) -> CheckoutRequest {
        CheckoutRequest {
            items,
            total,
            customer: customer(),
        }
    }

    #[test]
    fn accepts_a_consistent_payload() {
        let request = request(vec![item(2, dec!(100.00))], dec!(200.00));

        assert!(validate_checkout(&request).is_ok());
    }

    #[test]
    fn rejects_an_empty_cart() {
        let request = request(vec![], dec!(0));

        let err = validate_checkout(&request).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("empty"));
    }

    #[test]
    fn rejects_a_whitespace_only_name() {
        let mut request = request(vec![item(1, dec!(50))], dec!(50));
        request.customer.name = "   ".to_string();

        let err = validate_checkout(&request).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn rejects_a_blank_phone() {
        let mut request = request(vec![item(1, dec!(50))], dec!(50));
        request.customer.phone = " ".to_string();

        let err = validate_checkout(&request).unwrap_err();
        assert!(err.to_string().contains("phone"));
    }

    #[test]
    fn rejects_a_tampered_total() {
        let request = request(vec![item(2, dec!(100.00))], dec!(150.00));

        let err = validate_checkout(&request).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("150"));
        assert!(message.contains("200"));
    }

    #[test]
    fn accepts_numerically_equal_totals_with_different_scales() {
        let request = request(vec![item(2, dec!(100))], dec!(200.00));

        assert!(validate_checkout(&request).is_ok());
    }

    #[test]
    fn rejects_a_negative_unit_price() {
        let request = request(vec![item(1, dec!(-10.00))], dec!(-10.00));

        let err = validate_checkout(&request).unwrap_err();
        assert!(err.to_string().contains("Item 1"));
    }

    #[test]
    fn rejects_zero_installments() {
        let mut request = request(vec![item(1, dec!(50))], dec!(50));
        request.customer.installments = Some(0);

        assert!(validate_checkout(&request).is_err());
    }

    #[test]
    fn rejects_a_zero_quantity_item() {
        let request = request(vec![item(0, dec!(50))], dec!(0));

        assert!(validate_checkout(&request).is_err());
    }
}
