use crate::db::DbPool;
use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics::ORDERS_CREATED;
use crate::services::cart::PricedItem;
use crate::services::order_status::OrderStatus;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ORDER_NUMBER_LEN: usize = 8;
const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Payment method label attached to an order. No gateway sits behind this;
/// it only informs the rendered message and the operator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PaymentMethod {
    Pix,
    Credit,
    Debit,
    Cash,
}

/// Accepts the method as a free-form string: blank or unknown values mean
/// "not informed" rather than a rejected checkout.
fn deserialize_payment_method<'de, D>(deserializer: D) -> Result<Option<PaymentMethod>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| PaymentMethod::from_str(s).ok()))
}

/// Customer details captured once at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerData {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Customer phone is required"))]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, deserialize_with = "deserialize_payment_method")]
    pub payment_method: Option<PaymentMethod>,
    /// Meaningful only for credit payments.
    #[serde(default)]
    pub installments: Option<i32>,
}

/// Order as returned to API callers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub total: Decimal,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub payment_method: Option<String>,
    pub installments: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub variant_size: String,
    pub color: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub custom_name: Option<String>,
    pub custom_number: Option<String>,
    pub customization_price: Option<Decimal>,
    pub line_total: Decimal,
}

/// Maps a persisted order to its API shape.
pub fn order_to_response(model: &order::Model) -> OrderResponse {
    OrderResponse {
        id: model.id,
        order_number: model.order_number.clone(),
        status: model.status.clone(),
        total: model.total,
        customer_name: model.customer_name.clone(),
        customer_phone: model.customer_phone.clone(),
        customer_address: model.customer_address.clone(),
        payment_method: model.payment_method.clone(),
        installments: model.installments,
        notes: model.notes.clone(),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub fn order_item_to_response(model: &order_item::Model) -> OrderItemResponse {
    OrderItemResponse {
        id: model.id,
        product_id: model.product_id,
        product_name: model.product_name.clone(),
        variant_size: model.variant_size.clone(),
        color: model.color.clone(),
        quantity: model.quantity,
        unit_price: model.unit_price,
        custom_name: model.custom_name.clone(),
        custom_number: model.custom_number.clone(),
        customization_price: model.customization_price,
        line_total: model.unit_price * Decimal::from(model.quantity),
    }
}

/// Input for order creation; already validated by the checkout orchestrator.
#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub items: Vec<PricedItem>,
    pub total: Decimal,
    pub customer: CustomerData,
}

/// Persistence for orders and their immutable item snapshots.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates the order and all item snapshots in one transaction with
    /// status `pending`. Stock is untouched here; the decrement belongs to
    /// the first transition into `confirmed`.
    #[instrument(skip(self, input), fields(item_count = input.items.len()))]
    pub async fn create_order(&self, input: CreateOrderInput) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let order_id = Uuid::new_v4();
        let order_number = self.unique_order_number(&txn).await?;
        let now = Utc::now();

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            status: Set(OrderStatus::Pending.to_string()),
            total: Set(input.total),
            customer_name: Set(input.customer.name.trim().to_string()),
            customer_phone: Set(input.customer.phone.trim().to_string()),
            customer_address: Set(input.customer.address.trim().to_string()),
            payment_method: Set(input.customer.payment_method.map(|m| m.to_string())),
            installments: Set(input.customer.installments),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let order = order.insert(&txn).await.map_err(|e| {
            error!("Failed to insert order: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        for item in &input.items {
            let item_model = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                product_name: Set(item.product_name.clone()),
                variant_size: Set(item.variant_size.clone()),
                color: Set(item.color.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                custom_name: Set(item.custom_name.clone()),
                custom_number: Set(item.custom_number.clone()),
                customization_price: Set(item.customization_price),
                created_at: Set(now),
            };

            item_model.insert(&txn).await.map_err(|e| {
                error!("Failed to insert order item: {}", e);
                ServiceError::DatabaseError(e)
            })?;
        }

        txn.commit().await.map_err(|e| {
            error!("Failed to commit order creation: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        ORDERS_CREATED.inc();
        info!(%order_id, %order_number, "order created");

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderCreated {
                    order_id,
                    order_number,
                    total: input.total,
                })
                .await;
        }

        Ok(order)
    }

    /// Picks an order number not yet taken; the generator's entropy makes
    /// more than one attempt unusual.
    async fn unique_order_number<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<String, ServiceError> {
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let candidate = generate_order_number();

            let taken = order::Entity::find()
                .filter(order::Column::OrderNumber.eq(candidate.clone()))
                .one(conn)
                .await
                .map_err(ServiceError::DatabaseError)?
                .is_some();

            if !taken {
                return Ok(candidate);
            }
        }

        Err(ServiceError::InternalError(
            "could not allocate a unique order number".to_string(),
        ))
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to fetch order {}: {}", order_id, e);
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_order_by_number(&self, order_number: &str) -> Result<order::Model, ServiceError> {
        order::Entity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to fetch order {}: {}", order_number, e);
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))
    }

    /// Item snapshots in insertion order. Fails with NotFound when the order
    /// itself is absent, so callers can distinguish "no order" from "no items".
    #[instrument(skip(self))]
    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        self.get_order(order_id).await?;

        order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .order_by_asc(order_item::Column::Id)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to fetch items for order {}: {}", order_id, e);
                ServiceError::DatabaseError(e)
            })
    }

    /// Paginated listing, newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        limit: u64,
        status: Option<OrderStatus>,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = order::Entity::find().order_by_desc(order::Column::CreatedAt);

        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status.to_string()));
        }

        let paginator = query.paginate(&*self.db, limit.max(1));

        let total = paginator.num_items().await.map_err(|e| {
            error!("Failed to count orders: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!("Failed to fetch orders page {}: {}", page, e);
                ServiceError::DatabaseError(e)
            })?;

        Ok((orders, total))
    }

    /// Administrative deletion of an order and its items.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        // Existence check up front so deletion of a missing order is a 404.
        self.get_order(order_id).await?;

        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!("Failed to delete items for order {}: {}", order_id, e);
                ServiceError::DatabaseError(e)
            })?;

        order::Entity::delete_by_id(order_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!("Failed to delete order {}: {}", order_id, e);
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit order deletion: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(%order_id, "order deleted");

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::OrderDeleted { order_id }).await;
        }

        Ok(())
    }
}

fn generate_order_number() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_NUMBER_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ORDER_NUMBER_CHARSET.len());
            ORDER_NUMBER_CHARSET[idx] as char
        })
        .collect();

    format!("ORD-{}", suffix)
}
