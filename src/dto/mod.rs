pub mod addresses;
pub mod auth;
pub mod cart;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;
