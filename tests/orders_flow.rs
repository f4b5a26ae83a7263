use std::sync::Arc;

use chrono::{Duration, Utc};
use jewelry_storefront_api::{
    db::{create_orm_conn, run_migrations},
    dto::{
        catalog::CreateCatalogEntryRequest,
        orders::{CreateOrderRequest, OrderItemRequest, UpdateOrderStatusRequest},
        products::CreateProductRequest,
        vouchers::{CreateVoucherRequest, ValidateVoucherRequest},
    },
    entity::{
        orders::{OrderStatus, PaymentStatus},
        products::{Entity as Products, ProductStatus},
        users::{ActiveModel as UserActive, Role},
        vouchers::{Entity as Vouchers, VoucherKind},
    },
    error::AppError,
    middleware::auth::{AuthPolicy, Principal},
    models::Product,
    services::{
        category_service, dashboard_service, material_service,
        notification_service::{LogMailer, Notifier},
        order_service, product_service, voucher_service,
    },
    state::AppState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

struct Fixture {
    state: AppState,
    seller: Principal,
    customer: Principal,
    category_id: Uuid,
    product: Product,
}

// Integration flows need Postgres; they are skipped when no database is configured.
async fn fixture(price: Decimal, stock: i32) -> anyhow::Result<Option<Fixture>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    let state = AppState {
        orm,
        auth: Arc::new(AuthPolicy::Enforce {
            secret: "flow-test-secret".into(),
        }),
        notifier: Notifier::new(Arc::new(LogMailer), "Test Jewelers"),
    };

    let seller = Principal::seller(create_user(&state, Role::Seller).await?);
    let customer = Principal::customer(create_user(&state, Role::Customer).await?);

    let category = category_service::create_category(
        &state,
        &seller,
        CreateCatalogEntryRequest {
            name: "Rings".into(),
            description: None,
            is_active: None,
        },
    )
    .await?
    .data
    .expect("category");

    let product = create_product(
        &state,
        &seller,
        "Diamond Solitaire Ring",
        price,
        stock,
        Some(category.id),
        None,
    )
    .await?;

    Ok(Some(Fixture {
        state,
        seller,
        customer,
        category_id: category.id,
        product,
    }))
}

async fn create_product(
    state: &AppState,
    seller: &Principal,
    name: &str,
    price: Decimal,
    stock: i32,
    category_id: Option<Uuid>,
    material_id: Option<Uuid>,
) -> anyhow::Result<Product> {
    let product = product_service::create_product(
        state,
        seller,
        CreateProductRequest {
            name: name.into(),
            description: Some("1 ct".into()),
            price,
            stock,
            status: None,
            category_id,
            material_id,
            featured: true,
            images: "/img/ring.jpg".into(),
        },
    )
    .await?
    .data
    .expect("product");
    Ok(product)
}

async fn create_user(state: &AppState, role: Role) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{id}@example.com")),
        name: Set(format!("{role} {id}")),
        password_hash: Set("unused".into()),
        role: Set(role),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(id)
}

async fn create_voucher(f: &Fixture, usage_limit: i32) -> anyhow::Result<String> {
    let code = format!("T{}", &Uuid::new_v4().simple().to_string()[..10]).to_uppercase();
    voucher_service::create_voucher(
        &f.state,
        &f.seller,
        CreateVoucherRequest {
            code: code.to_lowercase(),
            kind: VoucherKind::Percentage,
            value: dec!(10),
            min_order_amount: dec!(100),
            max_discount: None,
            usage_limit,
            status: None,
            start_date: Utc::now() - Duration::days(1),
            end_date: Utc::now() + Duration::days(30),
        },
    )
    .await?;
    Ok(code)
}

fn order_request(f: &Fixture, quantity: i32, voucher_code: Option<String>) -> CreateOrderRequest {
    let subtotal = f.product.price * Decimal::from(quantity);
    CreateOrderRequest {
        items: vec![OrderItemRequest {
            product_id: f.product.id,
            quantity,
            price: f.product.price,
        }],
        shipping_address: "12 Gold Street".into(),
        billing_address: None,
        payment_method: "card".into(),
        shipping_cost: Decimal::ZERO,
        tax: Decimal::ZERO,
        subtotal,
        total: subtotal,
        special_instructions: Some("Gift wrap".into()),
        voucher_code,
    }
}

async fn stock_of(f: &Fixture) -> anyhow::Result<(i32, ProductStatus)> {
    stock_by_id(f, f.product.id).await
}

async fn stock_by_id(f: &Fixture, id: Uuid) -> anyhow::Result<(i32, ProductStatus)> {
    let product = Products::find_by_id(id)
        .one(&f.state.orm)
        .await?
        .expect("product exists");
    Ok((product.stock, product.status))
}

async fn voucher_uses(f: &Fixture, code: &str) -> anyhow::Result<i32> {
    use sea_orm::{ColumnTrait, QueryFilter};
    use jewelry_storefront_api::entity::vouchers::Column;
    let voucher = Vouchers::find()
        .filter(Column::Code.eq(code))
        .one(&f.state.orm)
        .await?
        .expect("voucher exists");
    Ok(voucher.used_count)
}

fn bad_request_message(err: AppError) -> String {
    match err {
        AppError::BadRequest(msg) => msg,
        other => panic!("expected bad request, got {other:?}"),
    }
}

#[tokio::test]
async fn voucher_order_prices_decrements_stock_and_records_usage() -> anyhow::Result<()> {
    let Some(f) = fixture(dec!(2499.99), 5).await? else {
        return Ok(());
    };
    let code = create_voucher(&f, 100).await?;

    let validation = voucher_service::validate_voucher(
        &f.state,
        ValidateVoucherRequest {
            code: code.to_lowercase(),
            order_amount: dec!(2499.99),
        },
    )
    .await?;
    assert!(validation.success);
    assert_eq!(validation.discount_amount, Some(dec!(250.00)));
    assert_eq!(voucher_uses(&f, &code).await?, 0, "validation must not consume a use");

    let created = order_service::create_order(&f.state, &f.customer, order_request(&f, 1, Some(code.clone())))
        .await?
        .data
        .expect("order");
    assert_eq!(created.order.discount_amount, dec!(250.00));
    assert_eq!(created.order.total, dec!(2249.99));
    assert_eq!(created.order.status, OrderStatus::Pending);
    assert!(created.order.order_number.starts_with("ORD-"));
    assert_eq!(created.items.len(), 1);
    assert_eq!(created.items[0].product_name.as_deref(), Some("Diamond Solitaire Ring"));

    assert_eq!(stock_of(&f).await?, (4, ProductStatus::Active));
    assert_eq!(voucher_uses(&f, &code).await?, 1);
    Ok(())
}

#[tokio::test]
async fn insufficient_stock_rejects_without_mutation() -> anyhow::Result<()> {
    let Some(f) = fixture(dec!(150.00), 2).await? else {
        return Ok(());
    };
    let code = create_voucher(&f, 10).await?;

    let err = order_service::create_order(&f.state, &f.customer, order_request(&f, 3, Some(code.clone())))
        .await
        .unwrap_err();
    assert_eq!(
        bad_request_message(err),
        "Insufficient stock for Diamond Solitaire Ring. Available: 2"
    );
    assert_eq!(stock_of(&f).await?, (2, ProductStatus::Active));
    assert_eq!(voucher_uses(&f, &code).await?, 0);

    let orders = order_service::list_orders(&f.state, &f.customer, Default::default())
        .await?
        .data
        .expect("orders");
    assert!(orders.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn short_second_line_rolls_back_the_whole_order() -> anyhow::Result<()> {
    let Some(f) = fixture(dec!(300.00), 5).await? else {
        return Ok(());
    };
    let earrings = create_product(
        &f.state,
        &f.seller,
        "Pearl Drop Earrings",
        dec!(189.00),
        1,
        Some(f.category_id),
        None,
    )
    .await?;
    let code = create_voucher(&f, 10).await?;

    let mut request = order_request(&f, 2, Some(code.clone()));
    request.items.push(OrderItemRequest {
        product_id: earrings.id,
        quantity: 3,
        price: earrings.price,
    });
    request.subtotal = dec!(1167.00);
    request.total = dec!(1167.00);

    let err = order_service::create_order(&f.state, &f.customer, request)
        .await
        .unwrap_err();
    assert_eq!(
        bad_request_message(err),
        "Insufficient stock for Pearl Drop Earrings. Available: 1"
    );

    // The ring line was written and decremented before the earrings failed.
    assert_eq!(stock_of(&f).await?, (5, ProductStatus::Active));
    assert_eq!(stock_by_id(&f, earrings.id).await?, (1, ProductStatus::Active));
    assert_eq!(voucher_uses(&f, &code).await?, 0);
    let orders = order_service::list_orders(&f.state, &f.customer, Default::default())
        .await?
        .data
        .expect("orders");
    assert!(orders.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn selling_the_last_unit_marks_product_out_of_stock() -> anyhow::Result<()> {
    let Some(f) = fixture(dec!(80.00), 2).await? else {
        return Ok(());
    };
    order_service::create_order(&f.state, &f.customer, order_request(&f, 2, None)).await?;
    assert_eq!(stock_of(&f).await?, (0, ProductStatus::OutOfStock));

    let err = order_service::create_order(&f.state, &f.customer, order_request(&f, 1, None))
        .await
        .unwrap_err();
    assert_eq!(bad_request_message(err), "Some items are no longer available");
    Ok(())
}

#[tokio::test]
async fn exhausted_voucher_fails_the_whole_order() -> anyhow::Result<()> {
    let Some(f) = fixture(dec!(200.00), 10).await? else {
        return Ok(());
    };
    let code = create_voucher(&f, 1).await?;

    order_service::create_order(&f.state, &f.customer, order_request(&f, 1, Some(code.clone()))).await?;
    assert_eq!(stock_of(&f).await?.0, 9);

    let err = order_service::create_order(&f.state, &f.customer, order_request(&f, 1, Some(code.clone())))
        .await
        .unwrap_err();
    assert_eq!(bad_request_message(err), "Voucher usage limit reached");
    assert_eq!(stock_of(&f).await?.0, 9);
    assert_eq!(voucher_uses(&f, &code).await?, 1);

    let validation = voucher_service::validate_voucher(
        &f.state,
        ValidateVoucherRequest {
            code,
            order_amount: dec!(100000),
        },
    )
    .await?;
    assert!(!validation.success);
    assert_eq!(validation.error.as_deref(), Some("Voucher usage limit reached"));
    Ok(())
}

#[tokio::test]
async fn seller_moves_orders_forward_and_sees_revenue() -> anyhow::Result<()> {
    let Some(f) = fixture(dec!(2499.99), 5).await? else {
        return Ok(());
    };
    let order = order_service::create_order(&f.state, &f.customer, order_request(&f, 1, None))
        .await?
        .data
        .expect("order")
        .order;

    let stats = dashboard_service::stats(&f.state, &f.seller).await?.data.expect("stats");
    assert_eq!(stats.total_orders, 1);
    assert_eq!(stats.pending_orders, 1);
    assert_eq!(stats.total_revenue, Decimal::ZERO);

    let shipped = dashboard_service::update_order_status(
        &f.state,
        &f.seller,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipped,
            tracking_number: Some("TRACK-123".into()),
            payment_status: Some(PaymentStatus::Paid),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(shipped.tracking_number.as_deref(), Some("TRACK-123"));

    let err = dashboard_service::update_order_status(
        &f.state,
        &f.seller,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Processing,
            tracking_number: None,
            payment_status: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let stats = dashboard_service::stats(&f.state, &f.seller).await?.data.expect("stats");
    assert_eq!(stats.pending_orders, 0);
    assert_eq!(stats.total_revenue, dec!(2499.99));
    assert_eq!(stats.total_products, 1);

    // Another seller cannot see or touch the order.
    let stranger = Principal::seller(create_user(&f.state, Role::Seller).await?);
    let err = dashboard_service::get_seller_order(&f.state, &stranger, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn category_with_products_cannot_be_deleted() -> anyhow::Result<()> {
    let Some(f) = fixture(dec!(10.00), 1).await? else {
        return Ok(());
    };
    let err = category_service::delete_category(&f.state, &f.seller, f.category_id)
        .await
        .unwrap_err();
    assert_eq!(
        bad_request_message(err),
        "Cannot delete category with 1 existing product(s)"
    );

    let err = category_service::create_category(
        &f.state,
        &f.seller,
        CreateCatalogEntryRequest {
            name: "rings".into(),
            description: None,
            is_active: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(bad_request_message(err), "Category with this name already exists");
    Ok(())
}

#[tokio::test]
async fn material_with_products_cannot_be_deleted() -> anyhow::Result<()> {
    let Some(f) = fixture(dec!(10.00), 1).await? else {
        return Ok(());
    };
    let platinum = material_service::create_material(
        &f.state,
        &f.seller,
        CreateCatalogEntryRequest {
            name: "Platinum".into(),
            description: None,
            is_active: None,
        },
    )
    .await?
    .data
    .expect("material");
    create_product(
        &f.state,
        &f.seller,
        "Platinum Band",
        dec!(899.00),
        3,
        None,
        Some(platinum.id),
    )
    .await?;

    let err = material_service::delete_material(&f.state, &f.seller, platinum.id)
        .await
        .unwrap_err();
    assert_eq!(
        bad_request_message(err),
        "Cannot delete material with 1 existing product(s)"
    );

    let unused = material_service::create_material(
        &f.state,
        &f.seller,
        CreateCatalogEntryRequest {
            name: "Rose Gold".into(),
            description: None,
            is_active: None,
        },
    )
    .await?
    .data
    .expect("material");
    material_service::delete_material(&f.state, &f.seller, unused.id).await?;
    let err = material_service::get_material(&f.state, unused.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}
