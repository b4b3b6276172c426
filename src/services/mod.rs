pub mod address_service;
pub mod admin_service;
pub mod auth_service;
pub mod cart_service;
pub mod inventory_service;
pub mod lifecycle;
pub mod order_service;
pub mod payment_service;
pub mod pricing;
pub mod product_service;
