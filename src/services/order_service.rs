use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, LockType},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, OrderStatus,
            PaymentStatus,
        },
        products::{Column as ProdCol, Entity as Products, Model as ProductModel, ProductStatus},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::{Order, OrderItem},
    pricing::{MAX_MONEY, is_storable_money, round_money},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::voucher_service,
    state::AppState,
};

pub async fn create_order(
    state: &AppState,
    user: &Principal,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let subtotal = validate_request(&payload)?;
    let now = Utc::now();

    let txn = state.orm.begin().await?;

    let product_ids: Vec<Uuid> = payload.items.iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, ProductModel> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    if payload.items.iter().any(|line| {
        products
            .get(&line.product_id)
            .is_none_or(|p| p.status != ProductStatus::Active)
    }) {
        return Err(AppError::bad_request("Some items are no longer available"));
    }

    let (voucher_id, voucher_code, discount) = match payload
        .voucher_code
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        Some(code) => {
            let (voucher, discount) = voucher_service::redeem(&txn, code, subtotal, now).await?;
            (Some(voucher.id), Some(voucher.code), discount)
        }
        None => (None, None, Decimal::ZERO),
    };

    let total = order_total(subtotal, discount, payload.shipping_cost, payload.tax)?;
    if total != payload.total {
        tracing::debug!(submitted = %payload.total, computed = %total, "order total recomputed");
    }

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(build_order_number(order_id, now)),
        user_id: Set(user.user_id),
        status: Set(OrderStatus::Pending),
        payment_status: Set(PaymentStatus::Pending),
        subtotal: Set(subtotal),
        discount_amount: Set(discount),
        voucher_id: Set(voucher_id),
        voucher_code: Set(voucher_code),
        shipping_cost: Set(payload.shipping_cost),
        tax: Set(payload.tax),
        total: Set(total),
        shipping_address: Set(payload.shipping_address.trim().to_string()),
        billing_address: Set(payload.billing_address.clone()),
        payment_method: Set(payload.payment_method.trim().to_string()),
        tracking_number: Set(None),
        notes: Set(payload.special_instructions.clone()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::with_capacity(payload.items.len());
    let mut by_seller: BTreeMap<Uuid, Vec<OrderItem>> = BTreeMap::new();

    for line in &payload.items {
        let Some(product) = products.get(&line.product_id) else {
            return Err(AppError::bad_request("Some items are no longer available"));
        };
        // Earlier lines are already written; returning drops `txn` and rolls them back.
        if line.quantity > product.stock {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}. Available: {}",
                product.name, product.stock
            )));
        }

        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        let decremented = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::value(now))
            .filter(ProdCol::Id.eq(line.product_id))
            .filter(ProdCol::Stock.gte(line.quantity))
            .exec(&txn)
            .await?;
        if decremented.rows_affected == 0 {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}. Available: {}",
                product.name, product.stock
            )));
        }

        if product.stock == line.quantity {
            Products::update_many()
                .col_expr(ProdCol::Status, Expr::value(ProductStatus::OutOfStock))
                .filter(ProdCol::Id.eq(line.product_id))
                .filter(ProdCol::Stock.eq(0))
                .filter(ProdCol::Status.eq(ProductStatus::Active))
                .exec(&txn)
                .await?;
        }

        let item = OrderItem::from_entity(item, Some(product.name.clone()));
        by_seller
            .entry(product.seller_id)
            .or_default()
            .push(item.clone());
        order_items.push(item);
    }

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        user_id = %user.user_id,
        %total,
        "order created"
    );

    let result = OrderWithItems {
        order: Order::from(order),
        items: order_items,
    };

    notify_order_created(state, user.user_id, &result, &by_seller).await;

    audit::record(
        &state.orm,
        user.user_id,
        "order_create",
        "orders",
        serde_json::json!({
            "order_id": result.order.id,
            "order_number": result.order.order_number,
            "voucher_code": result.order.voucher_code,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        result,
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &Principal,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = attach_items(&state.orm, orders.into_iter().map(Order::from).collect(), None).await?;

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &Principal,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut with_items = attach_items(&state.orm, vec![Order::from(order)], None).await?;
    let data = with_items.pop().ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Order", data, Some(Meta::empty())))
}

/// Loads the items of every order in one query, joining product names.
/// With `seller_id` only that seller's lines are kept.
pub async fn attach_items<C: ConnectionTrait>(
    db: &C,
    orders: Vec<Order>,
    seller_id: Option<Uuid>,
) -> AppResult<Vec<OrderWithItems>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut finder = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(ids))
        .order_by_asc(OrderItemCol::CreatedAt)
        .find_also_related(Products);
    if let Some(seller_id) = seller_id {
        finder = finder.filter(ProdCol::SellerId.eq(seller_id));
    }
    let rows = finder.all(db).await?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for (item, product) in rows {
        grouped
            .entry(item.order_id)
            .or_default()
            .push(OrderItem::from_entity(item, product.map(|p| p.name)));
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = grouped.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect())
}

/// Request-level checks that need no database. Returns the line subtotal.
fn validate_request(payload: &CreateOrderRequest) -> AppResult<Decimal> {
    if payload.items.is_empty() {
        return Err(AppError::bad_request("Order must contain at least one item"));
    }
    let mut seen = HashSet::new();
    for line in &payload.items {
        if line.quantity <= 0 {
            return Err(AppError::bad_request("Quantity must be greater than 0"));
        }
        if line.price < Decimal::ZERO {
            return Err(AppError::bad_request("Price must not be negative"));
        }
        if !seen.insert(line.product_id) {
            return Err(AppError::bad_request("Duplicate product in order items"));
        }
    }
    if payload.shipping_address.trim().is_empty() {
        return Err(AppError::bad_request("Shipping address is required"));
    }
    if payload.payment_method.trim().is_empty() {
        return Err(AppError::bad_request("Payment method is required"));
    }
    let amounts = [payload.shipping_cost, payload.tax, payload.subtotal, payload.total];
    if amounts.iter().any(|a| *a < Decimal::ZERO) {
        return Err(AppError::bad_request("Amounts must not be negative"));
    }
    if !amounts
        .into_iter()
        .chain(payload.items.iter().map(|i| i.price))
        .all(is_storable_money)
    {
        return Err(AppError::bad_request("Amounts out of range"));
    }

    let subtotal = payload
        .items
        .iter()
        .try_fold(Decimal::ZERO, |acc, i| {
            i.price
                .checked_mul(Decimal::from(i.quantity))
                .and_then(|line| acc.checked_add(line))
        })
        .map(round_money)
        .filter(|s| *s <= MAX_MONEY)
        .ok_or_else(|| AppError::bad_request("Amounts out of range"))?;
    if round_money(payload.subtotal) != subtotal {
        return Err(AppError::BadRequest(format!(
            "Subtotal does not match items (expected {subtotal})"
        )));
    }
    Ok(subtotal)
}

fn order_total(
    subtotal: Decimal,
    discount: Decimal,
    shipping: Decimal,
    tax: Decimal,
) -> AppResult<Decimal> {
    let total = round_money((subtotal - discount).max(Decimal::ZERO) + shipping + tax);
    if total > MAX_MONEY {
        return Err(AppError::bad_request("Amounts out of range"));
    }
    Ok(total)
}

fn build_order_number(order_id: Uuid, at: DateTime<Utc>) -> String {
    let date = at.format("%Y%m%d");
    let suffix = order_id.simple().to_string().to_uppercase();
    format!("ORD-{}-{}", date, &suffix[..8])
}

async fn notify_order_created(
    state: &AppState,
    customer_id: Uuid,
    order: &OrderWithItems,
    by_seller: &BTreeMap<Uuid, Vec<OrderItem>>,
) {
    let mut ids: Vec<Uuid> = by_seller.keys().copied().collect();
    ids.push(customer_id);
    let users = match Users::find()
        .filter(UserCol::Id.is_in(ids))
        .all(&state.orm)
        .await
    {
        Ok(users) => users
            .into_iter()
            .map(|u| (u.id, u))
            .collect::<HashMap<_, _>>(),
        Err(err) => {
            tracing::warn!(error = %err, order_id = %order.order.id, "could not load notification recipients");
            return;
        }
    };

    match users.get(&customer_id) {
        Some(customer) => {
            state
                .notifier
                .order_confirmation(order, &customer.email, &customer.name)
                .await
        }
        None => tracing::warn!(user_id = %customer_id, "customer not found for confirmation email"),
    }

    for (seller_id, items) in by_seller {
        if let Some(seller) = users.get(seller_id) {
            state
                .notifier
                .seller_new_order(&order.order, items, &seller.email, &seller.name)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::orders::OrderItemRequest;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn request(items: Vec<OrderItemRequest>, subtotal: Decimal) -> CreateOrderRequest {
        CreateOrderRequest {
            items,
            shipping_address: "12 Gold Street".into(),
            billing_address: None,
            payment_method: "card".into(),
            shipping_cost: Decimal::ZERO,
            tax: Decimal::ZERO,
            subtotal,
            total: subtotal,
            special_instructions: None,
            voucher_code: None,
        }
    }

    fn line(quantity: i32, price: Decimal) -> OrderItemRequest {
        OrderItemRequest {
            product_id: Uuid::new_v4(),
            quantity,
            price,
        }
    }

    #[test]
    fn subtotal_is_recomputed_from_lines() {
        let req = request(vec![line(2, dec!(10.25)), line(1, dec!(2499.99))], dec!(2520.49));
        assert_eq!(validate_request(&req).unwrap(), dec!(2520.49));
    }

    #[test]
    fn mismatched_subtotal_is_rejected() {
        let req = request(vec![line(1, dec!(100))], dec!(90));
        assert!(matches!(validate_request(&req), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn empty_and_non_positive_lines_are_rejected() {
        assert!(validate_request(&request(vec![], Decimal::ZERO)).is_err());
        assert!(validate_request(&request(vec![line(0, dec!(5))], Decimal::ZERO)).is_err());
        assert!(validate_request(&request(vec![line(1, dec!(-5))], dec!(-5))).is_err());
    }

    #[test]
    fn duplicate_products_are_rejected() {
        let first = line(1, dec!(10));
        let dup = OrderItemRequest {
            product_id: first.product_id,
            ..line(1, dec!(10))
        };
        let req = request(vec![first, dup], dec!(20));
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn blank_address_is_rejected() {
        let mut req = request(vec![line(1, dec!(10))], dec!(10));
        req.shipping_address = "   ".into();
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn oversized_amounts_are_rejected_not_panicking() {
        let req = request(vec![line(2, Decimal::MAX)], Decimal::ZERO);
        assert!(matches!(
            validate_request(&req),
            Err(AppError::BadRequest(msg)) if msg == "Amounts out of range"
        ));

        let lines: Vec<_> = (0..2).map(|_| line(i32::MAX, MAX_MONEY)).collect();
        let req = request(lines, Decimal::ZERO);
        assert!(matches!(
            validate_request(&req),
            Err(AppError::BadRequest(msg)) if msg == "Amounts out of range"
        ));

        let mut req = request(vec![line(1, dec!(10))], dec!(10));
        req.shipping_cost = Decimal::MAX;
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn sub_cent_prices_are_rejected() {
        let req = request(vec![line(1, dec!(10.005))], dec!(10.01));
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn total_applies_discount_then_adds_shipping_and_tax() {
        assert_eq!(
            order_total(dec!(2499.99), dec!(250.00), Decimal::ZERO, Decimal::ZERO).unwrap(),
            dec!(2249.99)
        );
        assert_eq!(
            order_total(dec!(20), dec!(50), dec!(5), dec!(1.5)).unwrap(),
            dec!(6.5)
        );
        assert!(order_total(MAX_MONEY, Decimal::ZERO, MAX_MONEY, Decimal::ZERO).is_err());
    }

    #[test]
    fn order_number_has_date_and_short_id() {
        let id = Uuid::parse_str("3f2a9c1e-0000-4000-8000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(build_order_number(id, at), "ORD-20240309-3F2A9C1E");
    }
}
