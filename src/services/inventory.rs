use crate::db::DbPool;
use crate::entities::product_variant;
use crate::errors::ServiceError;
use crate::metrics::STOCK_DECREMENT_FAILURES;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, instrument, warn};
use uuid::Uuid;

/// Failure modes of a single decrement. Reported per item during order
/// confirmation rather than aborting the whole transition.
#[derive(Debug, Error)]
pub enum DecrementError {
    #[error("no variant of product {product_id} matches size {size}{}", color_suffix(.color))]
    VariantNotFound {
        product_id: Uuid,
        size: String,
        color: Option<String>,
    },

    #[error(
        "insufficient stock for product {product_id} size {size}{}: requested {requested}, available {available}",
        color_suffix(.color)
    )]
    InsufficientStock {
        product_id: Uuid,
        size: String,
        color: Option<String>,
        requested: i32,
        available: i32,
    },

    #[error("decrement quantity must be positive, got {requested}")]
    InvalidQuantity { requested: i32 },

    #[error("database error: {0}")]
    Db(#[from] sea_orm::error::DbErr),
}

fn color_suffix(color: &Option<String>) -> String {
    match color {
        Some(c) => format!(" color {}", c),
        None => String::new(),
    }
}

impl From<DecrementError> for ServiceError {
    fn from(err: DecrementError) -> Self {
        match err {
            DecrementError::VariantNotFound { .. } => ServiceError::VariantNotFound(err.to_string()),
            DecrementError::InsufficientStock { .. } => {
                ServiceError::InsufficientStock(err.to_string())
            }
            DecrementError::InvalidQuantity { .. } => ServiceError::ValidationError(err.to_string()),
            DecrementError::Db(e) => ServiceError::DatabaseError(e),
        }
    }
}

/// Inventory ledger: the only mutator of variant stock.
///
/// Each decrement is a single conditional UPDATE guarded by `stock >= qty`,
/// so concurrent orders against the same variant cannot lose updates and a
/// failed decrement mutates nothing. Sibling variants of the same product
/// are never touched.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Decrements the variant identified by (product, size, color) by
    /// `quantity`. A line without a color only matches variants without one.
    #[instrument(skip(self))]
    pub async fn decrement(
        &self,
        product_id: Uuid,
        size: &str,
        color: Option<&str>,
        quantity: i32,
    ) -> Result<(), DecrementError> {
        if quantity <= 0 {
            return Err(DecrementError::InvalidQuantity {
                requested: quantity,
            });
        }

        let update = product_variant::Entity::update_many()
            .col_expr(
                product_variant::Column::Stock,
                Expr::col(product_variant::Column::Stock).sub(quantity),
            )
            .col_expr(
                product_variant::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(product_variant::Column::ProductId.eq(product_id))
            .filter(product_variant::Column::Size.eq(size))
            .filter(product_variant::Column::Stock.gte(quantity));

        let update = match color {
            Some(c) => update.filter(product_variant::Column::Color.eq(c)),
            None => update.filter(product_variant::Column::Color.is_null()),
        };

        let result = update.exec(&*self.db).await.map_err(|e| {
            error!(
                "Stock decrement failed for product {} size {}: {}",
                product_id, size, e
            );
            DecrementError::Db(e)
        })?;

        if result.rows_affected > 0 {
            return Ok(());
        }

        // The guarded update matched nothing. Re-read to tell a missing
        // variant apart from insufficient stock; the read is advisory only,
        // the update above is the actual guard.
        let lookup = product_variant::Entity::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .filter(product_variant::Column::Size.eq(size));

        let lookup = match color {
            Some(c) => lookup.filter(product_variant::Column::Color.eq(c)),
            None => lookup.filter(product_variant::Column::Color.is_null()),
        };

        let variant = lookup.one(&*self.db).await.map_err(DecrementError::Db)?;

        STOCK_DECREMENT_FAILURES.inc();

        match variant {
            None => {
                warn!(
                    "Variant not found for decrement: product {} size {} color {:?}",
                    product_id, size, color
                );
                Err(DecrementError::VariantNotFound {
                    product_id,
                    size: size.to_string(),
                    color: color.map(str::to_string),
                })
            }
            Some(v) => {
                warn!(
                    "Insufficient stock for product {} size {}: requested {}, available {}",
                    product_id, size, quantity, v.stock
                );
                Err(DecrementError::InsufficientStock {
                    product_id,
                    size: size.to_string(),
                    color: color.map(str::to_string),
                    requested: quantity,
                    available: v.stock,
                })
            }
        }
    }
}
