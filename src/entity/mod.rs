pub mod audit_logs;
pub mod categories;
pub mod materials;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod users;
pub mod vouchers;
pub mod wishlist_items;

pub use audit_logs::Entity as AuditLogs;
pub use categories::Entity as Categories;
pub use materials::Entity as Materials;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use users::Entity as Users;
pub use vouchers::Entity as Vouchers;
pub use wishlist_items::Entity as WishlistItems;
