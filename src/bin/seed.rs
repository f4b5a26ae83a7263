use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jewelry_storefront_api::db::{create_orm_conn, run_migrations};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;

    let orm = create_orm_conn(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;
    let pool = orm.get_postgres_connection_pool();

    let seller_id = ensure_user(pool, "seller@example.com", "Aurora Atelier", "seller123", "SELLER").await?;
    let customer_id =
        ensure_user(pool, "customer@example.com", "Casey Customer", "customer123", "CUSTOMER").await?;

    let rings = ensure_catalog_entry(pool, "categories", seller_id, "Rings").await?;
    let necklaces = ensure_catalog_entry(pool, "categories", seller_id, "Necklaces").await?;
    let earrings = ensure_catalog_entry(pool, "categories", seller_id, "Earrings").await?;
    let gold = ensure_catalog_entry(pool, "materials", seller_id, "Gold").await?;
    let silver = ensure_catalog_entry(pool, "materials", seller_id, "Silver").await?;
    let platinum = ensure_catalog_entry(pool, "materials", seller_id, "Platinum").await?;

    let products = [
        ("Diamond Solitaire Ring", "1 ct round brilliant in a six-prong setting", Decimal::new(249999, 2), 5, rings, platinum, true),
        ("Gold Band", "Classic 18k polished band", Decimal::new(45000, 2), 20, rings, gold, false),
        ("Pearl Pendant Necklace", "Freshwater pearl on an 18 inch chain", Decimal::new(18900, 2), 12, necklaces, silver, true),
        ("Silver Hoop Earrings", "Lightweight sterling hoops", Decimal::new(7900, 2), 30, earrings, silver, false),
    ];
    for (name, description, price, stock, category_id, material_id, featured) in products {
        ensure_product(pool, seller_id, name, description, price, stock, category_id, material_id, featured)
            .await?;
    }

    ensure_voucher(pool, seller_id, "SAVE10").await?;

    println!("Seed completed. Seller ID: {seller_id}, Customer ID: {customer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &PgPool,
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

/// `table` is one of the two catalog tables; both share the same shape.
async fn ensure_catalog_entry(
    pool: &PgPool,
    table: &'static str,
    seller_id: Uuid,
    name: &str,
) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> = sqlx::query_as(&format!(
        "SELECT id FROM {table} WHERE seller_id = $1 AND LOWER(name) = LOWER($2)"
    ))
    .bind(seller_id)
    .bind(name)
    .fetch_optional(pool)
    .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (Uuid,) = sqlx::query_as(&format!(
        "INSERT INTO {table} (id, seller_id, name) VALUES ($1, $2, $3) RETURNING id"
    ))
    .bind(Uuid::new_v4())
    .bind(seller_id)
    .bind(name)
    .fetch_one(pool)
    .await?;
    println!("Seeded {table}: {name}");
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
async fn ensure_product(
    pool: &PgPool,
    seller_id: Uuid,
    name: &str,
    description: &str,
    price: Decimal,
    stock: i32,
    category_id: Uuid,
    material_id: Uuid,
    featured: bool,
) -> anyhow::Result<()> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM products WHERE seller_id = $1 AND name = $2")
            .bind(seller_id)
            .bind(name)
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO products
            (id, seller_id, category_id, material_id, name, description, price, stock, status, featured)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'ACTIVE', $9)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seller_id)
    .bind(category_id)
    .bind(material_id)
    .bind(name)
    .bind(description)
    .bind(price)
    .bind(stock)
    .bind(featured)
    .execute(pool)
    .await?;

    println!("Seeded product {name}");
    Ok(())
}

async fn ensure_voucher(pool: &PgPool, seller_id: Uuid, code: &str) -> anyhow::Result<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO vouchers
            (id, seller_id, code, kind, value, min_order_amount, usage_limit, status, start_date, end_date)
        VALUES ($1, $2, $3, 'PERCENTAGE', 10, 100, 100, 'ACTIVE', $4, $5)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seller_id)
    .bind(code)
    .bind(now - Duration::days(1))
    .bind(now + Duration::days(365))
    .execute(pool)
    .await?;

    println!("Ensured voucher {code}");
    Ok(())
}
