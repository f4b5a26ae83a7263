use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    cart::{AppliedVoucher, Cart, CartItem},
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{CartQuote, CartQuoteLine, CartQuoteRequest},
        catalog::{CategoryList, CreateCatalogEntryRequest, MaterialList, UpdateCatalogEntryRequest},
        dashboard::DashboardStats,
        orders::{CreateOrderRequest, OrderItemRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        vouchers::{
            CreateVoucherRequest, UpdateVoucherRequest, ValidateVoucherRequest, VoucherList,
            VoucherValidationResponse,
        },
        wishlist::{AddWishlistRequest, WishlistProductList},
    },
    entity::{
        orders::{OrderStatus, PaymentStatus},
        products::ProductStatus,
        users::Role,
        vouchers::{VoucherKind, VoucherStatus},
    },
    models::{Category, Material, Order, OrderItem, Product, User, Voucher},
    pricing::VoucherTerms,
    response::{ApiResponse, Meta},
    routes::{
        auth, cart, categories, dashboard, health, materials, orders, params, products, vouchers,
        wishlist,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        materials::list_materials,
        materials::get_material,
        materials::create_material,
        materials::update_material,
        materials::delete_material,
        vouchers::validate_voucher,
        vouchers::list_vouchers,
        vouchers::get_voucher,
        vouchers::create_voucher,
        vouchers::update_voucher,
        vouchers::delete_voucher,
        cart::quote_cart,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        dashboard::stats,
        dashboard::list_seller_orders,
        dashboard::get_seller_order,
        dashboard::update_order_status
    ),
    components(
        schemas(
            User,
            Role,
            Product,
            ProductStatus,
            Category,
            Material,
            Voucher,
            VoucherKind,
            VoucherStatus,
            VoucherTerms,
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            Cart,
            CartItem,
            AppliedVoucher,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateCatalogEntryRequest,
            UpdateCatalogEntryRequest,
            CategoryList,
            MaterialList,
            CreateVoucherRequest,
            UpdateVoucherRequest,
            VoucherList,
            ValidateVoucherRequest,
            VoucherValidationResponse,
            CartQuoteLine,
            CartQuoteRequest,
            CartQuote,
            AddWishlistRequest,
            WishlistProductList,
            CreateOrderRequest,
            OrderItemRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            DashboardStats,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::CatalogQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<DashboardStats>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Products", description = "Catalog products"),
        (name = "Categories", description = "Seller-managed categories"),
        (name = "Materials", description = "Seller-managed materials"),
        (name = "Vouchers", description = "Voucher validation and seller management"),
        (name = "Cart", description = "Cart pricing"),
        (name = "Wishlist", description = "Customer wishlist"),
        (name = "Orders", description = "Customer orders"),
        (name = "Dashboard", description = "Seller dashboard"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
