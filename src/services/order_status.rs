use crate::db::DbPool;
use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics::ORDERS_CONFIRMED;
use crate::services::inventory::InventoryService;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// How many times a lost status race is retried before giving up.
const STATUS_UPDATE_ATTEMPTS: usize = 3;

/// Lifecycle states of an order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Parses client input, rejecting anything outside the known set.
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        Self::from_str(value.trim()).map_err(|_| {
            let valid = Self::iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            ServiceError::InvalidStatus(format!(
                "Unknown status '{}'. Valid statuses: {}",
                value, valid
            ))
        })
    }
}

/// One stock decrement owed to an order item on confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecrementIntent {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub variant_size: String,
    pub color: Option<String>,
    pub quantity: i32,
}

/// Outcome of planning a status transition before touching the database.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub decrements: Vec<DecrementIntent>,
}

impl TransitionPlan {
    /// True exactly when this transition enters `confirmed` from elsewhere.
    pub fn is_confirmation(&self) -> bool {
        self.to == OrderStatus::Confirmed && self.from != OrderStatus::Confirmed
    }
}

/// Decides what a transition entails. Stock is owed only on the edge into
/// `confirmed`; re-confirming an already confirmed order owes nothing, and
/// no transition ever restocks.
pub fn plan_transition(
    current: OrderStatus,
    requested: OrderStatus,
    items: &[order_item::Model],
) -> TransitionPlan {
    let decrements = if requested == OrderStatus::Confirmed && current != OrderStatus::Confirmed {
        items
            .iter()
            .map(|item| DecrementIntent {
                item_id: item.id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                variant_size: item.variant_size.clone(),
                color: item.color.clone(),
                quantity: item.quantity,
            })
            .collect()
    } else {
        Vec::new()
    };

    TransitionPlan {
        from: current,
        to: requested,
        decrements,
    }
}

/// Item whose stock was decremented during confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecrementedItem {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub variant_size: String,
    pub color: Option<String>,
    pub quantity: i32,
}

/// Item whose stock could not be decremented. The order stays confirmed;
/// the operator resolves these by hand.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FailedDecrement {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub variant_size: String,
    pub color: Option<String>,
    pub quantity: i32,
    pub reason: String,
}

/// Result of a status update, including per-item inventory outcomes when
/// the transition confirmed the order.
#[derive(Debug, Clone)]
pub struct StatusUpdateOutcome {
    pub order: order::Model,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub decremented: Vec<DecrementedItem>,
    pub failed: Vec<FailedDecrement>,
}

/// Drives order status transitions and the inventory side effects they owe.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DbPool>,
    inventory: InventoryService,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderStatusService {
    pub fn new(
        db: Arc<DbPool>,
        inventory: InventoryService,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            inventory,
            event_sender,
        }
    }

    /// Moves an order to `new_status`, optionally replacing its notes.
    ///
    /// The transition is claimed with a conditional update predicated on the
    /// status the order was observed in, so two concurrent confirmations
    /// cannot both own the edge into `confirmed` and stock is decremented at
    /// most once per order. Losing the race re-reads and retries; exhausting
    /// the retries reports a conflict.
    #[instrument(skip(self, notes))]
    pub async fn set_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        notes: Option<String>,
    ) -> Result<StatusUpdateOutcome, ServiceError> {
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        // Item snapshots are immutable, one fetch serves every attempt.
        let items = if new_status == OrderStatus::Confirmed {
            order_item::Entity::find()
                .filter(order_item::Column::OrderId.eq(order_id))
                .order_by_asc(order_item::Column::CreatedAt)
                .order_by_asc(order_item::Column::Id)
                .all(&*self.db)
                .await
                .map_err(|e| {
                    error!("Failed to fetch items for order {}: {}", order_id, e);
                    ServiceError::DatabaseError(e)
                })?
        } else {
            Vec::new()
        };

        for attempt in 1..=STATUS_UPDATE_ATTEMPTS {
            let observed = order::Entity::find_by_id(order_id)
                .one(&*self.db)
                .await
                .map_err(|e| {
                    error!("Failed to fetch order {}: {}", order_id, e);
                    ServiceError::DatabaseError(e)
                })?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

            let current = OrderStatus::from_str(&observed.status).map_err(|_| {
                ServiceError::InternalError(format!(
                    "Order {} has unrecognized status '{}'",
                    order_id, observed.status
                ))
            })?;

            let plan = plan_transition(current, new_status, &items);

            let mut update = order::Entity::update_many()
                .col_expr(order::Column::Status, Expr::value(new_status.to_string()))
                .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(order::Column::Id.eq(order_id))
                .filter(order::Column::Status.eq(current.to_string()));

            if let Some(notes) = &notes {
                update = update.col_expr(order::Column::Notes, Expr::value(Some(notes.clone())));
            }

            let result = update.exec(&*self.db).await.map_err(|e| {
                error!("Failed to update status for order {}: {}", order_id, e);
                ServiceError::DatabaseError(e)
            })?;

            if result.rows_affected == 0 {
                // Someone else moved the order between our read and write.
                warn!(%order_id, attempt, "lost status update race, retrying");
                continue;
            }

            let (decremented, failed) = self.apply_decrements(&plan).await;

            if plan.is_confirmation() {
                ORDERS_CONFIRMED.inc();

                if let Some(sender) = &self.event_sender {
                    sender
                        .send_or_log(Event::OrderConfirmed {
                            order_id,
                            decremented_items: decremented.len(),
                            failed_items: failed.len(),
                        })
                        .await;
                }
            }

            if let Some(sender) = &self.event_sender {
                sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id,
                        old_status: current.to_string(),
                        new_status: new_status.to_string(),
                    })
                    .await;
            }

            info!(%order_id, %current, %new_status, "order status updated");

            let order = order::Entity::find_by_id(order_id)
                .one(&*self.db)
                .await
                .map_err(|e| {
                    error!("Failed to reload order {}: {}", order_id, e);
                    ServiceError::DatabaseError(e)
                })?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

            return Ok(StatusUpdateOutcome {
                order,
                previous_status: current,
                new_status,
                decremented,
                failed,
            });
        }

        Err(ServiceError::Conflict(format!(
            "Order {} was updated concurrently, please retry",
            order_id
        )))
    }

    /// Executes the plan's decrements one item at a time. Failures are
    /// collected instead of rolled back: the confirmation stands and the
    /// outcome names every item the operator must reconcile.
    async fn apply_decrements(
        &self,
        plan: &TransitionPlan,
    ) -> (Vec<DecrementedItem>, Vec<FailedDecrement>) {
        let mut decremented = Vec::new();
        let mut failed = Vec::new();

        for intent in &plan.decrements {
            let result = self
                .inventory
                .decrement(
                    intent.product_id,
                    &intent.variant_size,
                    intent.color.as_deref(),
                    intent.quantity,
                )
                .await;

            match result {
                Ok(()) => {
                    if let Some(sender) = &self.event_sender {
                        sender
                            .send_or_log(Event::StockDecremented {
                                product_id: intent.product_id,
                                size: intent.variant_size.clone(),
                                color: intent.color.clone(),
                                quantity: intent.quantity,
                            })
                            .await;
                    }

                    decremented.push(DecrementedItem {
                        item_id: intent.item_id,
                        product_id: intent.product_id,
                        product_name: intent.product_name.clone(),
                        variant_size: intent.variant_size.clone(),
                        color: intent.color.clone(),
                        quantity: intent.quantity,
                    });
                }
                Err(err) => {
                    let reason = err.to_string();

                    if let Some(sender) = &self.event_sender {
                        sender
                            .send_or_log(Event::StockDecrementFailed {
                                product_id: intent.product_id,
                                size: intent.variant_size.clone(),
                                color: intent.color.clone(),
                                requested: intent.quantity,
                                reason: reason.clone(),
                            })
                            .await;
                    }

                    failed.push(FailedDecrement {
                        item_id: intent.item_id,
                        product_id: intent.product_id,
                        product_name: intent.product_name.clone(),
                        variant_size: intent.variant_size.clone(),
                        color: intent.color.clone(),
                        quantity: intent.quantity,
                        reason,
                    });
                }
            }
        }

        (decremented, failed)
    }
}
