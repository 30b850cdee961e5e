//! Shared fixtures: SQLite files in a temp dir, a schema per datasource, a bootstrapped engine.
#![allow(dead_code)]

use dynamodel::{AppState, DataSourceConfig, Settings};
use tempfile::TempDir;

pub const MASTER_SCHEMA: &str = "
CREATE TABLE user_account (
    id INTEGER PRIMARY KEY,
    name TEXT,
    email TEXT,
    is_delete INTEGER DEFAULT 0,
    record_version INTEGER,
    created_by TEXT,
    updated_by TEXT
);
CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    user_id INTEGER,
    status TEXT,
    is_delete INTEGER DEFAULT 0
);
CREATE TABLE order_item (
    id INTEGER PRIMARY KEY,
    order_id INTEGER REFERENCES orders(id),
    sku TEXT,
    is_delete INTEGER DEFAULT 0
);
CREATE TABLE order_tag (
    order_id INTEGER,
    tag TEXT,
    PRIMARY KEY (order_id, tag)
);
";

pub const REPORTS_SCHEMA: &str = "
CREATE TABLE audit_log (
    id INTEGER PRIMARY KEY,
    message TEXT
);
";

pub struct TestEngine {
    // held so the database files outlive the engine
    pub dir: TempDir,
    pub state: AppState,
}

pub fn sqlite_url(dir: &TempDir, name: &str) -> String {
    format!("sqlite:{}?mode=rwc", dir.path().join(name).display())
}

/// Create the schema with a throwaway pool so discovery sees it on bootstrap.
pub async fn create_schema(url: &str, schema: &str) {
    sqlx::any::install_default_drivers();
    let pool = sqlx::any::AnyPoolOptions::new()
        .max_connections(1)
        .connect(url)
        .await
        .unwrap();
    sqlx::raw_sql(schema).execute(&pool).await.unwrap();
    pool.close().await;
}

/// `master` and `reports` datasources, each with its schema, discovered and ready.
pub async fn engine() -> TestEngine {
    engine_with(|_| {}).await
}

pub async fn engine_with(tune: impl FnOnce(&mut Settings)) -> TestEngine {
    let dir = tempfile::tempdir().unwrap();
    let master = sqlite_url(&dir, "master.db");
    let reports = sqlite_url(&dir, "reports.db");
    create_schema(&master, MASTER_SCHEMA).await;
    create_schema(&reports, REPORTS_SCHEMA).await;

    let mut settings = Settings::new(vec![
        DataSourceConfig {
            key: "master".into(),
            url: master,
            max_connections: 4,
        },
        DataSourceConfig {
            key: "reports".into(),
            url: reports,
            max_connections: 4,
        },
    ]);
    settings.worker_concurrency = 2;
    settings.audit_user = "tester".into();
    tune(&mut settings);
    let state = AppState::bootstrap(settings).await.unwrap();
    TestEngine { dir, state }
}

/// Row count straight from the database, outside any connection set.
pub async fn count_rows(state: &AppState, datasource: &str, table: &str) -> i64 {
    use sqlx::Row;
    let pool = &state.sources.get(datasource).unwrap().pool;
    let row = sqlx::query(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap();
    row.try_get::<i64, _>(0).unwrap()
}

pub fn obj(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    v.as_object().cloned().unwrap()
}
