use crate::entities::{order, order_item};
use crate::services::cart::PricedItem;
use crate::services::orders::PaymentMethod;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Built-in wording for the checkout confirmation message.
pub const DEFAULT_ORDER_TEMPLATE: &str = concat!(
    "Hello {{customerName}}!\n",
    "\n",
    "Your order *{{orderId}}* has been received and is awaiting confirmation.\n",
    "\n",
    "Items:\n",
    "\n",
    "{{items}}\n",
    "\n",
    "Payment: {{paymentMethod}}\n",
    "Total: *{{total}}*\n",
    "\n",
    "Delivery address: {{customerAddress}}\n",
    "\n",
    "Thank you for your purchase!",
);

/// Built-in wording for the pending-order recovery reminder.
pub const DEFAULT_RECOVERY_TEMPLATE: &str = concat!(
    "Hello {{customerName}}, your order *{{orderId}}* is still waiting to be completed.\n",
    "\n",
    "Items:\n",
    "\n",
    "{{items}}\n",
    "\n",
    "Total: *{{total}}*\n",
    "\n",
    "Reply to this message and we will finish it for you right away!",
);

/// The two message flavors. They share the renderer and the placeholder set
/// and differ only in default wording and in who the deep link targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MessageVariant {
    Order,
    Recovery,
}

impl MessageVariant {
    pub fn default_template(&self) -> &'static str {
        match self {
            MessageVariant::Order => DEFAULT_ORDER_TEMPLATE,
            MessageVariant::Recovery => DEFAULT_RECOVERY_TEMPLATE,
        }
    }
}

/// One order line as the renderer sees it. All prices are already resolved;
/// rendering never goes back to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
    pub product_name: String,
    pub variant_size: String,
    pub color: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub custom_name: Option<String>,
    pub custom_number: Option<String>,
    pub customization_price: Option<Decimal>,
}

impl ItemSnapshot {
    /// Unit price with the customization surcharge subtracted back out,
    /// which is the figure shown on the item's price line.
    pub fn base_unit_price(&self) -> Decimal {
        self.unit_price - self.customization_price.unwrap_or_default()
    }

    pub fn is_customized(&self) -> bool {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        has(&self.custom_name) || has(&self.custom_number)
    }
}

impl From<&order_item::Model> for ItemSnapshot {
    fn from(model: &order_item::Model) -> Self {
        Self {
            product_name: model.product_name.clone(),
            variant_size: model.variant_size.clone(),
            color: model.color.clone(),
            quantity: model.quantity,
            unit_price: model.unit_price,
            custom_name: model.custom_name.clone(),
            custom_number: model.custom_number.clone(),
            customization_price: model.customization_price,
        }
    }
}

impl From<&PricedItem> for ItemSnapshot {
    fn from(item: &PricedItem) -> Self {
        Self {
            product_name: item.product_name.clone(),
            variant_size: item.variant_size.clone(),
            color: item.color.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            custom_name: item.custom_name.clone(),
            custom_number: item.custom_number.clone(),
            customization_price: item.customization_price,
        }
    }
}

/// Everything the renderer may reference. Built from a persisted order or
/// straight from checkout input, then handed to [`render`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub payment_method: Option<PaymentMethod>,
    pub installments: Option<i32>,
    pub total: Decimal,
    pub items: Vec<ItemSnapshot>,
}

impl OrderSnapshot {
    pub fn from_order(order: &order::Model, items: Vec<ItemSnapshot>) -> Self {
        Self {
            order_number: order.order_number.clone(),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            customer_address: order.customer_address.clone(),
            payment_method: order
                .payment_method
                .as_deref()
                .and_then(|m| PaymentMethod::from_str(m).ok()),
            installments: order.installments,
            total: order.total,
            items,
        }
    }
}

/// Replaces every recognized placeholder with its value. Placeholders are
/// literal, case-sensitive tokens replaced globally; anything the renderer
/// does not recognize stays verbatim so template typos show up in output.
pub fn render(template: &str, snapshot: &OrderSnapshot) -> String {
    template
        .replace("{{orderId}}", &snapshot.order_number)
        .replace("{{customerName}}", &snapshot.customer_name)
        .replace("{{customerPhone}}", &snapshot.customer_phone)
        .replace("{{customerAddress}}", &snapshot.customer_address)
        .replace("{{total}}", &format_brl(snapshot.total))
        .replace(
            "{{paymentMethod}}",
            &payment_label(snapshot.payment_method, snapshot.installments),
        )
        .replace("{{items}}", &items_block(&snapshot.items))
}

/// Fixed two-decimal currency string, midpoint rounded away from zero.
pub fn format_brl(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("R$ {:.2}", rounded)
}

/// Human-readable payment label. Unset or unknown methods render as an
/// explicit "Not informed" rather than an empty string.
pub fn payment_label(method: Option<PaymentMethod>, installments: Option<i32>) -> String {
    match method {
        Some(PaymentMethod::Pix) => "Pix".to_string(),
        Some(PaymentMethod::Credit) => match installments {
            Some(n) if n >= 1 => format!("Credit card ({}x)", n),
            _ => "Credit card".to_string(),
        },
        Some(PaymentMethod::Debit) => "Debit card".to_string(),
        Some(PaymentMethod::Cash) => "Cash".to_string(),
        None => "Not informed".to_string(),
    }
}

/// Multi-line expansion of `{{items}}`: one paragraph per item, paragraphs
/// separated by a blank line.
pub fn items_block(items: &[ItemSnapshot]) -> String {
    items
        .iter()
        .map(item_paragraph)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn item_paragraph(item: &ItemSnapshot) -> String {
    let mut lines = vec![
        format!("{}x {}", item.quantity, item.product_name),
        format_brl(item.base_unit_price()),
    ];

    if !item.variant_size.is_empty() {
        lines.push(format!("Size: {}", item.variant_size));
    }

    if let Some(color) = item.color.as_deref().filter(|c| !c.is_empty()) {
        lines.push(format!("Color: {}", color));
    }

    if item.is_customized() {
        lines.push("Customization:".to_string());

        if let Some(name) = item.custom_name.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(format!("Name: {}", name));
        }

        if let Some(number) = item
            .custom_number
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            lines.push(format!("Number: {}", number));
        }

        if let Some(surcharge) = item.customization_price {
            if surcharge > Decimal::ZERO {
                lines.push(format!("+ {}", format_brl(surcharge)));
            }
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn plain_item() -> ItemSnapshot {
        ItemSnapshot {
            product_name: "Home Jersey".to_string(),
            variant_size: "M".to_string(),
            color: None,
            quantity: 2,
            unit_price: dec!(100.00),
            custom_name: None,
            custom_number: None,
            customization_price: None,
        }
    }

    fn customized_item() -> ItemSnapshot {
        ItemSnapshot {
            product_name: "Home Jersey".to_string(),
            variant_size: "M".to_string(),
            color: Some("Blue".to_string()),
            quantity: 2,
            unit_price: dec!(120.00),
            custom_name: Some("JOAO".to_string()),
            custom_number: Some("10".to_string()),
            customization_price: Some(dec!(20.00)),
        }
    }

    fn snapshot(items: Vec<ItemSnapshot>, total: Decimal) -> OrderSnapshot {
        OrderSnapshot {
            order_number: "ORD-AB12CD34".to_string(),
            customer_name: "Joao".to_string(),
            customer_phone: "5511999990000".to_string(),
            customer_address: "Rua das Flores, 10".to_string(),
            payment_method: Some(PaymentMethod::Pix),
            installments: None,
            total,
            items,
        }
    }

    #[test]
    fn renders_every_known_placeholder() {
        let rendered = render(DEFAULT_ORDER_TEMPLATE, &snapshot(vec![plain_item()], dec!(200)));

        assert!(rendered.contains("ORD-AB12CD34"));
        assert!(rendered.contains("Hello Joao!"));
        assert!(rendered.contains("Rua das Flores, 10"));
        assert!(rendered.contains("Total: *R$ 200.00*"));
        assert!(rendered.contains("Payment: Pix"));
        assert!(rendered.contains("2x Home Jersey"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn customized_item_shows_base_price_and_surcharge_lines() {
        let block = items_block(&[customized_item()]);

        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "2x Home Jersey");
        assert_eq!(lines[1], "R$ 100.00");
        assert_eq!(lines[2], "Size: M");
        assert_eq!(lines[3], "Color: Blue");
        assert_eq!(lines[4], "Customization:");
        assert_eq!(lines[5], "Name: JOAO");
        assert_eq!(lines[6], "Number: 10");
        assert_eq!(lines[7], "+ R$ 20.00");
    }

    #[test]
    fn plain_item_has_no_customization_block() {
        let block = items_block(&[plain_item()]);

        assert!(!block.contains("Customization:"));
        assert!(!block.contains('+'));
        assert!(block.contains("R$ 100.00"));
    }

    #[test]
    fn item_paragraphs_are_separated_by_blank_lines() {
        let block = items_block(&[plain_item(), customized_item()]);

        assert!(block.contains("\n\n"));
        assert_eq!(block.matches("\n\n").count(), 1);
    }

    #[test]
    fn unknown_placeholders_survive_verbatim() {
        let rendered = render(
            "{{customerName}} {{discountCode}}",
            &snapshot(vec![], dec!(0)),
        );

        assert_eq!(rendered, "Joao {{discountCode}}");
    }

    #[test_case(None, None => "Not informed" ; "unset method")]
    #[test_case(Some(PaymentMethod::Pix), None => "Pix" ; "pix")]
    #[test_case(Some(PaymentMethod::Credit), None => "Credit card" ; "credit without installments")]
    #[test_case(Some(PaymentMethod::Credit), Some(3) => "Credit card (3x)" ; "credit in three")]
    #[test_case(Some(PaymentMethod::Credit), Some(0) => "Credit card" ; "nonpositive installments ignored")]
    #[test_case(Some(PaymentMethod::Debit), None => "Debit card" ; "debit")]
    #[test_case(Some(PaymentMethod::Cash), Some(3) => "Cash" ; "installments irrelevant for cash")]
    fn payment_labels(method: Option<PaymentMethod>, installments: Option<i32>) -> String {
        payment_label(method, installments)
    }

    #[test_case(dec!(240) => "R$ 240.00" ; "whole amount gains decimals")]
    #[test_case(dec!(99.9) => "R$ 99.90" ; "single decimal padded")]
    #[test_case(dec!(10.005) => "R$ 10.01" ; "midpoint rounds away from zero")]
    #[test_case(dec!(0) => "R$ 0.00" ; "zero")]
    fn currency_formatting(amount: Decimal) -> String {
        format_brl(amount)
    }

    #[test]
    fn variants_pick_their_own_default_wording() {
        assert!(MessageVariant::Order
            .default_template()
            .contains("has been received"));
        assert!(MessageVariant::Recovery
            .default_template()
            .contains("still waiting"));
    }

    proptest! {
        #[test]
        fn rendering_is_deterministic(name in "[A-Za-z ]{1,30}", total in 0i64..1_000_000) {
            let mut snap = snapshot(vec![plain_item()], Decimal::from(total));
            snap.customer_name = name;

            let first = render(DEFAULT_ORDER_TEMPLATE, &snap);
            let second = render(DEFAULT_ORDER_TEMPLATE, &snap);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn unrecognized_tokens_round_trip(token in "[a-zA-Z]{3,12}") {
            prop_assume!(![
                "orderId",
                "customerName",
                "customerPhone",
                "customerAddress",
                "total",
                "paymentMethod",
                "items",
            ]
            .contains(&token.as_str()));

            let template = format!("before {{{{{}}}}} after", token);
            let rendered = render(&template, &snapshot(vec![], dec!(0)));
            prop_assert_eq!(rendered, template);
        }
    }
}
