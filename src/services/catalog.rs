use crate::db::DbPool;
use crate::entities::{product, product_variant};
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, ModelTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Read-only view of a product as cart pricing needs it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub base_price: Decimal,
    pub customization_surcharge: Decimal,
    pub variants: Vec<VariantSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VariantSnapshot {
    pub size: String,
    pub color: Option<String>,
    pub stock: i32,
    pub allow_customization: bool,
}

impl ProductSnapshot {
    /// Finds the variant matching a size/color pair exactly; a line without
    /// a color only matches variants without one.
    pub fn variant(&self, size: &str, color: Option<&str>) -> Option<&VariantSnapshot> {
        self.variants
            .iter()
            .find(|v| v.size == size && v.color.as_deref() == color)
    }
}

/// Catalog lookup interface consumed by the cart aggregator.
///
/// Returns `None` for products that are absent or deactivated; callers treat
/// both as a stale cart reference.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn product_by_id(
        &self,
        product_id: Uuid,
    ) -> Result<Option<ProductSnapshot>, ServiceError>;
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogReader for CatalogService {
    #[instrument(skip(self))]
    async fn product_by_id(
        &self,
        product_id: Uuid,
    ) -> Result<Option<ProductSnapshot>, ServiceError> {
        let product = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to fetch product {}: {}", product_id, e);
                ServiceError::DatabaseError(e)
            })?;

        let Some(product) = product else {
            return Ok(None);
        };

        if !product.is_active {
            return Ok(None);
        }

        let variants = product
            .find_related(product_variant::Entity)
            .order_by_asc(product_variant::Column::Size)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to fetch variants for product {}: {}", product_id, e);
                ServiceError::DatabaseError(e)
            })?;

        Ok(Some(ProductSnapshot {
            id: product.id,
            name: product.name,
            base_price: product.base_price,
            customization_surcharge: product.customization_surcharge,
            variants: variants
                .into_iter()
                .map(|v| VariantSnapshot {
                    size: v.size,
                    color: v.color,
                    stock: v.stock,
                    allow_customization: v.allow_customization,
                })
                .collect(),
        }))
    }
}
