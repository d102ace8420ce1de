//! Imports against a real Postgres database.

use receiver_import::credentials::CredentialService;
use receiver_import::import::{
    ImportConfig, ImportSettings, ImportStatus, PgSubscriberStore, ReceiverImporter,
    SubscriberStore,
};
use receiver_import::models::GroupSet;
use receiver_import::test_support::{TestDatabase, TestFixtures};
use rust_xlsxwriter::Workbook;

const PID: i32 = 21;

fn workbook(rows: &[(&str, &str)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.write_string(0, 0, "Groups").expect("write");
    worksheet.write_string(0, 1, "Email").expect("write");
    for (index, (title, email)) in rows.iter().enumerate() {
        let row = index as u32 + 1;
        if !title.is_empty() {
            worksheet.write_string(row, 0, *title).expect("write");
        }
        worksheet.write_string(row, 1, *email).expect("write");
    }
    workbook.save_to_buffer().expect("buffer")
}

fn settings() -> ImportSettings {
    ImportSettings {
        title_column: 0,
        email_column: 1,
        pid: PID,
        has_title_row: true,
    }
}

fn credentials() -> CredentialService {
    CredentialService::with_cost(8, 1).expect("credential service")
}

async fn database(test: &str) -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(err) => {
            eprintln!("skipping {test}: {err}");
            None
        }
    }
}

#[tokio::test]
async fn imports_and_reimports_against_postgres() {
    let Some(test_db) = database("postgres import test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let sales = fixtures.insert_group(PID, "Sales").await.expect("seed group");

    let store = PgSubscriberStore::new(pool.clone());
    let importer = ReceiverImporter::new(&store, ImportConfig::default(), credentials());
    let bytes = workbook(&[
        ("Sales", "a@x.com"),
        ("Sales,VIP", "b@x.com"),
        ("", "c@x.com"),
    ]);

    let first = importer
        .import_workbook(&settings(), bytes.clone())
        .await
        .expect("first import");
    assert_eq!(first.stats.imported, 2);
    assert_eq!(first.stats.skipped, 1);
    assert_eq!(first.status, ImportStatus::Warning);
    assert_eq!(first.row_errors[0].row, 4);

    let groups = fixtures.groups(PID).await.expect("groups");
    assert_eq!(
        groups,
        vec![("Sales".to_string(), false), ("VIP".to_string(), true)]
    );

    let a_groups = fixtures.usergroup(PID, "a@x.com").await.expect("lookup");
    assert_eq!(a_groups, Some(sales.to_string()));
    let b_groups = GroupSet::parse(
        &fixtures
            .usergroup(PID, "b@x.com")
            .await
            .expect("lookup")
            .expect("b exists"),
    );
    assert_eq!(b_groups.len(), 2);
    assert!(b_groups.iter().any(|id| id == sales));

    let second = importer
        .import_workbook(&settings(), bytes)
        .await
        .expect("second import");
    assert_eq!(second.stats.imported, 0);
    assert_eq!(second.stats.updated, 0);
    assert_eq!(second.stats.unchanged, 2);
    assert_eq!(fixtures.groups(PID).await.expect("groups").len(), 2);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn existing_subscribers_gain_groups_and_keep_old_ones() {
    let Some(test_db) = database("postgres merge test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let legacy = fixtures.insert_group(PID, "Legacy").await.expect("seed group");
    fixtures
        .insert_subscriber(PID, "old@x.com", &format!("{legacy},junk,-4"))
        .await
        .expect("seed subscriber");

    let store = PgSubscriberStore::new(pool.clone());
    let config = ImportConfig::default().with_batch_size(1);
    let report = ReceiverImporter::new(&store, config, credentials())
        .import_workbook(
            &settings(),
            workbook(&[("News", "old@x.com"), ("News", "new@x.com")]),
        )
        .await
        .expect("import");

    assert_eq!(report.stats.imported, 1);
    assert_eq!(report.stats.updated, 1);
    assert_eq!(report.status, ImportStatus::Ok);

    let merged = GroupSet::parse(
        &fixtures
            .usergroup(PID, "old@x.com")
            .await
            .expect("lookup")
            .expect("old exists"),
    );
    assert_eq!(merged.len(), 2);
    assert!(merged.iter().any(|id| id == legacy));

    let imported: bool =
        sqlx::query_scalar("SELECT imported FROM subscribers WHERE pid = $1 AND email = $2")
            .bind(PID)
            .bind("new@x.com")
            .fetch_one(&pool)
            .await
            .expect("imported flag");
    assert!(imported);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn bulk_insert_reports_only_new_rows() {
    let Some(test_db) = database("postgres bulk insert test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    fixtures
        .insert_subscriber(PID, "taken@x.com", "")
        .await
        .expect("seed subscriber");

    let store = PgSubscriberStore::new(pool.clone());
    assert_eq!(store.title_column_limit().await.expect("limit"), Some(255));

    let mut batch = receiver_import::import::NewSubscriberBatch::with_capacity(2);
    let now = chrono::Utc::now();
    for email in ["taken@x.com", "fresh@x.com"] {
        batch.push(receiver_import::import::NewSubscriber {
            pid: PID,
            email: email.to_string(),
            password_hash: "hash".to_string(),
            groups: [3].into_iter().collect(),
            created_at: now,
        });
    }

    let inserted = store.bulk_insert_subscribers(&batch).await.expect("insert");
    assert_eq!(inserted, vec!["fresh@x.com".to_string()]);

    let found = store
        .find_subscribers_by_email(PID, &["taken@x.com".to_string(), "fresh@x.com".to_string()])
        .await
        .expect("find");
    assert_eq!(found.len(), 2);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn soft_deleted_email_is_imported_as_a_new_subscriber() {
    let Some(test_db) = database("postgres soft delete test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    sqlx::query(
        "INSERT INTO subscribers (pid, username, email, password_hash, deleted) VALUES ($1, $2, $2, '', TRUE)",
    )
    .bind(PID)
    .bind("gone@x.com")
    .execute(&pool)
    .await
    .expect("seed deleted subscriber");

    let store = PgSubscriberStore::new(pool.clone());
    let report = ReceiverImporter::new(&store, ImportConfig::default(), credentials())
        .import_workbook(&settings(), workbook(&[("Sales", "gone@x.com")]))
        .await
        .expect("import");

    assert_eq!(report.stats.imported, 1);
    assert_eq!(report.status, ImportStatus::Ok);

    let (live, deleted): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*) FILTER (WHERE NOT deleted), COUNT(*) FILTER (WHERE deleted) FROM subscribers WHERE pid = $1 AND email = $2",
    )
    .bind(PID)
    .bind("gone@x.com")
    .fetch_one(&pool)
    .await
    .expect("count rows");
    assert_eq!((live, deleted), (1, 1));

    test_db.close().await.expect("failed to drop test database");
}
