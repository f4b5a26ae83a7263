pub mod auth;
pub mod cart;
pub mod catalog;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod vouchers;
pub mod wishlist;
