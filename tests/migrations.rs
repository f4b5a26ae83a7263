use jewelry_storefront_api::db::{MIGRATOR, create_orm_conn, run_migrations};

#[test]
fn schema_migrations_are_embedded_in_version_order() {
    let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
    assert_eq!(versions.first(), Some(&1));
    assert!(versions.windows(2).all(|w| w[0] < w[1]));

    let init = MIGRATOR.iter().next().expect("initial migration");
    assert_eq!(init.description, "init");
    assert!(init.sql.contains("CREATE TABLE IF NOT EXISTS orders"));
}

#[tokio::test]
async fn applied_migrations_are_recorded_and_not_rerun() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run migration tests.");
            return Ok(());
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    run_migrations(&orm).await?;

    let applied: Vec<(i64, bool)> =
        sqlx::query_as("SELECT version, success FROM _sqlx_migrations ORDER BY version")
            .fetch_all(orm.get_postgres_connection_pool())
            .await?;
    let expected: Vec<(i64, bool)> = MIGRATOR.iter().map(|m| (m.version, true)).collect();
    assert_eq!(applied, expected);
    Ok(())
}
