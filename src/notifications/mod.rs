pub mod deeplink;
pub mod template;
