pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod inventory;
pub mod order_status;
pub mod orders;
