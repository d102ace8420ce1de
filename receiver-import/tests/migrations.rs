use receiver_import::test_support::TestDatabase;
use sqlx::migrate::Migrator;

static TEST_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn table_count(pool: &sqlx::PgPool) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name IN ('subscribers', 'subscriber_groups')",
    )
    .fetch_one(pool)
    .await
    .expect("lookup succeeded")
}

#[tokio::test]
async fn migrations_apply_and_revert_cleanly() {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping migration revert test: {err}");
            return;
        }
    };

    let pool = test_db.pool_clone();

    TEST_MIGRATOR.run(&pool).await.expect("migrations run");
    assert_eq!(table_count(&pool).await, 2);

    TEST_MIGRATOR.undo(&pool, 0).await.expect("migrations revert");
    assert_eq!(table_count(&pool).await, 0, "tables should be dropped after revert");

    TEST_MIGRATOR.run(&pool).await.expect("migrations rerun");
    assert_eq!(table_count(&pool).await, 2);

    let title_length: Option<i32> = sqlx::query_scalar(
        "SELECT character_maximum_length::int4 FROM information_schema.columns WHERE table_name = 'subscriber_groups' AND column_name = 'title'",
    )
    .fetch_one(&pool)
    .await
    .expect("column lookup");
    assert_eq!(title_length, Some(255));

    test_db.close().await.expect("failed to drop test database");
}
