pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;

use crate::config::StoreConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::cart::CartAggregator;
use crate::services::catalog::{CatalogReader, CatalogService};
use crate::services::checkout::CheckoutService;
use crate::services::inventory::InventoryService;
use crate::services::order_status::OrderStatusService;
use crate::services::orders::OrderService;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartAggregator>,
    pub checkout: Arc<CheckoutService>,
    pub order: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, store: StoreConfig) -> Self {
        let catalog: Arc<dyn CatalogReader> = Arc::new(CatalogService::new(db.clone()));
        let cart = Arc::new(CartAggregator::new(catalog));

        let inventory = InventoryService::new(db.clone());
        let order = OrderService::new(db.clone(), Some(event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(order.clone(), store));
        let order_status = Arc::new(OrderStatusService::new(
            db,
            inventory,
            Some(event_sender),
        ));

        Self {
            cart,
            checkout,
            order: Arc::new(order),
            order_status,
        }
    }
}
