//! Example consumer: a separate Rust project that uses dynamodel-sdk as a dependency.
//!
//! Run from repo root: `cargo run -p example-consumer -- <table> [filter-json]`
//! Datasources come from `DATASOURCES` (`key=url,...`) or `DATABASE_URL`.

use dynamodel::{init_tracing, load_from_env, AppState, Envelope, MatchMode};
use serde_json::{Map, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut args = std::env::args().skip(1);
    let table = args.next().unwrap_or_else(|| "user_account".into());
    let filter: Map<String, Value> = match args.next() {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Map::new(),
    };

    let settings = load_from_env()?;
    let state = AppState::bootstrap(settings).await?;
    for entity in state.registry.entities() {
        tracing::info!(table = %entity.table, model = %entity.name, datasource = %entity.datasource, "model");
    }

    let crud = state.crud();
    let svc = crud.clone();
    let result = crud
        .transaction(&[], move |conns| {
            Box::pin(async move { svc.page_query(conns, &table, filter, MatchMode::Fuzzy).await })
        })
        .await;
    let envelope = match result {
        Ok(page) => Envelope::success(serde_json::to_value(page)?),
        Err(e) => Envelope::from_error(&e),
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    state.shutdown().await;
    Ok(())
}
