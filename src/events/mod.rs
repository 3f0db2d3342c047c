use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Domain events emitted by the order pipeline.
///
/// Events are observability hooks, not part of request correctness: a full
/// channel or missing consumer is logged and the request continues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        total: rust_decimal::Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderConfirmed {
        order_id: Uuid,
        decremented_items: usize,
        failed_items: usize,
    },
    StockDecremented {
        product_id: Uuid,
        size: String,
        color: Option<String>,
        quantity: i32,
    },
    StockDecrementFailed {
        product_id: Uuid,
        size: String,
        color: Option<String>,
        requested: i32,
        reason: String,
    },
    OrderDeleted {
        order_id: Uuid,
    },
}

/// Envelope used when events are serialized for logs or downstream sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: Event,
    pub occurred_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            occurred_at: Utc::now(),
        }
    }
}

/// Cloneable handle for emitting events from services.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Services call this after commit so event loss never fails a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Consumes events off the channel for the lifetime of the process.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        let envelope = EventEnvelope::new(event);

        match &envelope.event {
            Event::OrderCreated {
                order_id,
                order_number,
                total,
            } => {
                info!(%order_id, %order_number, %total, "order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "order status changed");
            }
            Event::OrderConfirmed {
                order_id,
                decremented_items,
                failed_items,
            } => {
                if *failed_items > 0 {
                    warn!(
                        %order_id,
                        decremented_items,
                        failed_items,
                        "order confirmed with inventory failures"
                    );
                } else {
                    info!(%order_id, decremented_items, "order confirmed");
                }
            }
            Event::StockDecremented {
                product_id,
                size,
                color,
                quantity,
            } => {
                info!(%product_id, %size, ?color, quantity, "stock decremented");
            }
            Event::StockDecrementFailed {
                product_id,
                size,
                color,
                requested,
                reason,
            } => {
                error!(
                    %product_id,
                    %size,
                    ?color,
                    requested,
                    %reason,
                    "stock decrement failed"
                );
            }
            Event::OrderDeleted { order_id } => {
                info!(%order_id, "order deleted");
            }
        }
    }

    info!("Event channel closed, stopping event processing loop");
}
