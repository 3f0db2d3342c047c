use crate::errors::ServiceError;
use crate::services::catalog::CatalogReader;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn normalize(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Identity of a cart line. Two lines with the same key are the same
/// selection and merge by summing quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct CartKey {
    pub product_id: Uuid,
    pub variant_size: String,
    pub color: Option<String>,
    pub custom_name: Option<String>,
    pub custom_number: Option<String>,
}

/// One selected variant plus quantity, as held by the browsing session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "Variant size must not be empty"))]
    pub variant_size: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub custom_number: Option<String>,
}

impl CartLine {
    /// The uniqueness key, with blank customization/color fields collapsed
    /// to absent so `Some("")` and `None` cannot split a line in two.
    pub fn key(&self) -> CartKey {
        CartKey {
            product_id: self.product_id,
            variant_size: self.variant_size.clone(),
            color: normalize(&self.color),
            custom_name: normalize(&self.custom_name),
            custom_number: normalize(&self.custom_number),
        }
    }

    /// A custom name or number (non-blank) flags the line as customized.
    pub fn is_customized(&self) -> bool {
        normalize(&self.custom_name).is_some() || normalize(&self.custom_number).is_some()
    }
}

/// Client cart with merge-by-key semantics.
///
/// Lines keep first-seen order so the priced result reads the way the buyer
/// built it; add/update/remove are pure value operations, independent of
/// where the cart is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.add(line);
        }
        cart
    }

    /// Adds a line; an already-present key increments quantity instead of
    /// duplicating the line.
    pub fn add(&mut self, line: CartLine) {
        let key = line.key();
        if let Some(existing) = self.lines.iter_mut().find(|l| l.key() == key) {
            existing.quantity += line.quantity;
        } else {
            self.lines.push(line);
        }
    }

    /// Sets the quantity for a key; zero or negative removes the line.
    pub fn set_quantity(&mut self, key: &CartKey, quantity: i32) {
        if quantity <= 0 {
            self.remove(key);
        } else if let Some(line) = self.lines.iter_mut().find(|l| &l.key() == key) {
            line.quantity = quantity;
        }
    }

    pub fn remove(&mut self, key: &CartKey) {
        self.lines.retain(|l| &l.key() != key);
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

/// Priced line snapshot. At checkout these become order items verbatim;
/// `unit_price` already includes the surcharge, `customization_price` keeps
/// the surcharge portion for display.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PricedItem {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "Product name must not be empty"))]
    pub product_name: String,
    #[validate(length(min = 1, message = "Variant size must not be empty"))]
    pub variant_size: String,
    #[serde(default)]
    pub color: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub custom_number: Option<String>,
    #[serde(default)]
    pub customization_price: Option<Decimal>,
}

impl PricedItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Unit price with the customization surcharge subtracted back out.
    pub fn base_unit_price(&self) -> Decimal {
        self.unit_price - self.customization_price.unwrap_or_default()
    }
}

/// Why a line was dropped during pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    ProductUnavailable,
    VariantUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DroppedLine {
    pub product_id: Uuid,
    pub variant_size: String,
    pub color: Option<String>,
    pub reason: DropReason,
}

/// Result of pricing a cart against the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PricedCart {
    pub items: Vec<PricedItem>,
    pub total: Decimal,
    /// Lines removed because their catalog reference went stale; surfaced so
    /// the storefront can tell the buyer what disappeared.
    pub dropped: Vec<DroppedLine>,
}

/// Merges client cart lines with current catalog data into priced order
/// line items. Stale references are dropped, never an error: checkout must
/// not fail because a product vanished after it was added.
#[derive(Clone)]
pub struct CartAggregator {
    catalog: Arc<dyn CatalogReader>,
}

impl CartAggregator {
    pub fn new(catalog: Arc<dyn CatalogReader>) -> Self {
        Self { catalog }
    }

    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn price(&self, lines: &[CartLine]) -> Result<PricedCart, ServiceError> {
        let cart = Cart::from_lines(lines.iter().cloned());

        let mut items = Vec::with_capacity(cart.len());
        let mut dropped = Vec::new();
        let mut total = Decimal::ZERO;

        for line in cart.lines() {
            let key = line.key();

            let Some(product) = self.catalog.product_by_id(line.product_id).await? else {
                dropped.push(DroppedLine {
                    product_id: line.product_id,
                    variant_size: key.variant_size,
                    color: key.color,
                    reason: DropReason::ProductUnavailable,
                });
                continue;
            };

            let Some(variant) = product.variant(&key.variant_size, key.color.as_deref()) else {
                dropped.push(DroppedLine {
                    product_id: line.product_id,
                    variant_size: key.variant_size,
                    color: key.color,
                    reason: DropReason::VariantUnavailable,
                });
                continue;
            };

            // Variants that do not allow customization sell as plain lines.
            let customized = variant.allow_customization && line.is_customized();
            let customization_price = customized.then_some(product.customization_surcharge);
            let unit_price = product.base_price + customization_price.unwrap_or_default();

            total += unit_price * Decimal::from(line.quantity);

            items.push(PricedItem {
                product_id: product.id,
                product_name: product.name.clone(),
                variant_size: key.variant_size,
                color: key.color,
                quantity: line.quantity,
                unit_price,
                custom_name: customized.then(|| key.custom_name).flatten(),
                custom_number: customized.then(|| key.custom_number).flatten(),
                customization_price,
            });
        }

        Ok(PricedCart {
            items,
            total,
            dropped,
        })
    }
}
