pub mod auth_service;
pub mod cart_service;
pub mod catalog;
pub mod category_service;
pub mod dashboard_service;
pub mod material_service;
pub mod notification_service;
pub mod order_service;
pub mod product_service;
pub mod voucher_service;
pub mod wishlist_service;
