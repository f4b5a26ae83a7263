use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
    sea_query::{Expr, Query, SelectStatement},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        dashboard::DashboardStats,
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
    },
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::order_service::attach_items,
    state::AppState,
};

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    total_vouchers: i64,
    active_vouchers: i64,
    total_orders: i64,
    pending_orders: i64,
    total_revenue: Decimal,
    total_products: i64,
    active_products: i64,
}

const STATS_SQL: &str = r#"
SELECT
    (SELECT COUNT(*) FROM vouchers v WHERE v.seller_id = $1) AS total_vouchers,
    (SELECT COUNT(*) FROM vouchers v
        WHERE v.seller_id = $1 AND v.status = 'ACTIVE' AND v.end_date >= NOW()) AS active_vouchers,
    (SELECT COUNT(DISTINCT oi.order_id) FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1) AS total_orders,
    (SELECT COUNT(DISTINCT o.id) FROM orders o
        JOIN order_items oi ON oi.order_id = o.id
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1 AND o.status = 'PENDING') AS pending_orders,
    (SELECT COALESCE(SUM(oi.price * oi.quantity), 0) FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1 AND o.payment_status = 'PAID') AS total_revenue,
    (SELECT COUNT(*) FROM products p WHERE p.seller_id = $1) AS total_products,
    (SELECT COUNT(*) FROM products p
        WHERE p.seller_id = $1 AND p.status = 'ACTIVE') AS active_products
"#;

pub async fn stats(state: &AppState, user: &Principal) -> AppResult<ApiResponse<DashboardStats>> {
    let seller_id = state.auth.require_seller(user)?;
    let pool = state.orm.get_postgres_connection_pool();

    let row: StatsRow = sqlx::query_as(STATS_SQL)
        .bind(seller_id)
        .fetch_one(pool)
        .await?;

    let stats = DashboardStats {
        total_vouchers: row.total_vouchers,
        active_vouchers: row.active_vouchers,
        total_orders: row.total_orders,
        pending_orders: row.pending_orders,
        total_revenue: row.total_revenue.round_dp(2),
        total_products: row.total_products,
        active_products: row.active_products,
    };
    tracing::debug!(%seller_id, ?stats, "dashboard stats computed");

    Ok(ApiResponse::success("Dashboard stats", stats, None))
}

pub async fn list_seller_orders(
    state: &AppState,
    user: &Principal,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let seller_id = state.auth.require_seller(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition =
        Condition::all().add(OrderCol::Id.in_subquery(seller_order_ids(seller_id)));
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
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let items = attach_items(&state.orm, orders, Some(seller_id)).await?;

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_seller_order(
    state: &AppState,
    user: &Principal,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let seller_id = state.auth.require_seller(user)?;
    let order = find_seller_order(state, seller_id, id).await?;

    let data = attach_items(&state.orm, vec![Order::from(order)], Some(seller_id))
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Order found", data, Some(Meta::empty())))
}

pub async fn update_order_status(
    state: &AppState,
    user: &Principal,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let seller_id = state.auth.require_seller(user)?;
    let existing = find_seller_order(state, seller_id, id).await?;

    let previous = existing.status;
    if !previous.can_transition_to(payload.status) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order status from {} to {}",
            previous.label(),
            payload.status.label()
        )));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(payload.status);
    if let Some(tracking) = payload
        .tracking_number
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
    {
        active.tracking_number = Set(Some(tracking));
    }
    if let Some(payment_status) = payload.payment_status {
        active.payment_status = Set(payment_status);
    }
    active.updated_at = Set(Utc::now().into());
    let order = Order::from(active.update(&state.orm).await?);

    tracing::info!(
        order_id = %order.id,
        from = previous.label(),
        to = order.status.label(),
        "order status updated"
    );

    if previous != order.status {
        match Users::find_by_id(order.user_id).one(&state.orm).await {
            Ok(Some(customer)) => {
                state
                    .notifier
                    .status_update(&order, &customer.email, &customer.name)
                    .await
            }
            Ok(None) => tracing::warn!(user_id = %order.user_id, "customer not found for status email"),
            Err(err) => tracing::warn!(error = %err, "could not load customer for status email"),
        }
    }

    audit::record(
        &state.orm,
        seller_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        order,
        Some(Meta::empty()),
    ))
}

/// Orders with at least one line for a product of `seller_id`.
fn seller_order_ids(seller_id: Uuid) -> SelectStatement {
    Query::select()
        .column((OrderItems, OrderItemCol::OrderId))
        .from(OrderItems)
        .inner_join(
            Products,
            Expr::col((Products, ProdCol::Id)).equals((OrderItems, OrderItemCol::ProductId)),
        )
        .and_where(Expr::col((Products, ProdCol::SellerId)).eq(seller_id))
        .to_owned()
}

async fn find_seller_order(state: &AppState, seller_id: Uuid, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .filter(OrderCol::Id.in_subquery(seller_order_ids(seller_id)))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}
