/// Row operation tests: create, update with version checks, soft delete, batches, locks
///
/// Run with: cargo test --test crud_tests
mod common;

use common::{count_rows, engine, obj};
use dynamodel::{with_connections, AppError, ConnectionSet};
use serde_json::{json, Value};

#[tokio::test]
async fn test_create_assigns_id_and_defaults() {
    let t = engine().await;
    let crud = t.state.crud();
    let mut conns = ConnectionSet::new(&t.state.sources);

    let saved = crud
        .create(&mut conns, "user_account", &obj(json!({"name": "john", "email": "j@x.io", "password": "x"})))
        .await
        .unwrap();
    assert_eq!(saved.get("id"), Some(&json!(1)));
    assert!(saved.get("password").is_none());

    let found = crud.find_by_id(&mut conns, "user_account", &json!(1)).await.unwrap();
    assert_eq!(found.get("name"), Some(&json!("john")));
    assert_eq!(found.get("is_delete"), Some(&json!(0)));
    assert_eq!(found.get("record_version"), Some(&json!(1)));
    assert_eq!(found.get("created_by"), Some(&json!("tester")));
    conns.release().await;
}

#[tokio::test]
async fn test_find_by_id_missing_and_invalid() {
    let t = engine().await;
    let crud = t.state.crud();
    let mut conns = ConnectionSet::new(&t.state.sources);

    let err = crud.find_by_id(&mut conns, "user_account", &json!(99)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref m) if m == "object not exists"));
    let err = crud.find_by_id(&mut conns, "user_account", &json!(" ")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    conns.release().await;
}

#[tokio::test]
async fn test_version_check_on_update() {
    let t = engine().await;
    let crud = t.state.crud();
    let mut conns = ConnectionSet::new(&t.state.sources);

    crud.create(&mut conns, "user_account", &obj(json!({"name": "ann"}))).await.unwrap();
    let updated = crud
        .save_by_id(&mut conns, "user_account", &json!(1), &obj(json!({"name": "anne", "record_version": 1})))
        .await
        .unwrap();
    assert_eq!(updated.get("record_version"), Some(&json!(2)));

    let found = crud.find_by_id(&mut conns, "user_account", &json!(1)).await.unwrap();
    assert_eq!(found.get("name"), Some(&json!("anne")));
    assert_eq!(found.get("record_version"), Some(&json!(2)));
    assert_eq!(found.get("updated_by"), Some(&json!("tester")));

    // a writer still holding version 1 lost the race
    let err = crud
        .save_by_id(&mut conns, "user_account", &json!(1), &obj(json!({"name": "late", "record_version": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StaleRecord { .. }));
    assert_eq!(err.code(), "conflict");
    conns.release().await;
}

#[tokio::test]
async fn test_create_or_update_by_id_presence() {
    let t = engine().await;
    let crud = t.state.crud();
    let mut conns = ConnectionSet::new(&t.state.sources);

    let created = crud
        .create_or_update(&mut conns, "orders", &obj(json!({"id": "", "status": "open"})))
        .await
        .unwrap();
    let id = created.get("id").cloned().unwrap();
    crud.create_or_update(&mut conns, "orders", &obj(json!({"id": id.clone(), "status": "paid"})))
        .await
        .unwrap();
    let found = crud.find_by_id(&mut conns, "orders", &id).await.unwrap();
    assert_eq!(found.get("status"), Some(&json!("paid")));
    conns.release().await;
    assert_eq!(count_rows(&t.state, "master", "orders").await, 1);
}

#[tokio::test]
async fn test_delete_tag_keeps_row_reachable_by_id() {
    let t = engine().await;
    let crud = t.state.crud();
    let mut conns = ConnectionSet::new(&t.state.sources);

    for name in ["a", "b", "c"] {
        crud.create(&mut conns, "user_account", &obj(json!({ "name": name }))).await.unwrap();
    }
    assert_eq!(crud.delete_tag(&mut conns, "user_account", &json!(1)).await.unwrap(), 1);
    assert_eq!(crud.delete_tags(&mut conns, "user_account", &[json!(2), json!(3)]).await.unwrap(), 2);

    let found = crud.find_by_id(&mut conns, "user_account", &json!(1)).await.unwrap();
    assert_eq!(found.get("is_delete"), Some(&json!(1)));

    assert!(crud.delete_tags(&mut conns, "user_account", &[]).await.is_err());
    assert!(crud.delete_tag(&mut conns, "audit_log", &json!(1)).await.is_err());
    conns.release().await;
}

#[tokio::test]
async fn test_find_first_orders_by_id() {
    let t = engine().await;
    let crud = t.state.crud();
    let mut conns = ConnectionSet::new(&t.state.sources);

    for status in ["open", "paid", "open"] {
        crud.create(&mut conns, "orders", &obj(json!({ "status": status }))).await.unwrap();
    }
    let first = crud
        .find_first(&mut conns, "orders", "STATUS = ?", &[json!("open")])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.get("id"), Some(&json!(1)));
    let none = crud
        .find_first(&mut conns, "orders", "STATUS = ?", &[json!("void")])
        .await
        .unwrap();
    assert!(none.is_none());
    conns.release().await;
}

#[tokio::test]
async fn test_batch_create_or_update_in_one_transaction() {
    let t = engine().await;
    let crud = t.state.crud();
    let svc = crud.clone();
    let rows = vec![
        obj(json!({"status": "open"})),
        obj(json!({"status": "paid"})),
        obj(json!({"status": "void"})),
    ];
    let saved = crud
        .transaction(&["master"], move |conns| {
            Box::pin(async move { svc.batch_create_or_update(conns, "orders", &rows).await })
        })
        .await
        .unwrap();
    let ids: Vec<Value> = saved.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn test_batch_async_runs_each_row_on_the_worker_pool() {
    // one worker: SQLite serializes writers anyway
    let t = common::engine_with(|s| s.worker_concurrency = 1).await;
    let crud = t.state.crud();
    let rows: Vec<_> = (0..8).map(|i| obj(json!({ "sku": format!("sku-{}", i) }))).collect();

    let saved = crud.batch_async_create_or_update("order_item", rows).await.unwrap();
    assert_eq!(saved.len(), 8);
    assert!(saved.iter().all(|r| r.get("id").map(|v| v.is_i64()).unwrap_or(false)));
    assert_eq!(count_rows(&t.state, "master", "order_item").await, 8);
    assert_eq!(t.state.tasks.limit(), 1);
    assert_eq!(t.state.tasks.available(), 1);
}

#[tokio::test]
async fn test_replace_batch_inserts_and_overwrites() {
    let t = engine().await;
    let crud = t.state.crud();
    let svc = crud.clone();

    let affected = with_connections(&t.state.sources, &["master"], move |conns| {
        Box::pin(async move {
            svc.replace_batch(
                conns,
                "orders",
                &[
                    obj(json!({"id": 1, "status": "open"})),
                    obj(json!({"id": 2, "status": "it's paid"})),
                ],
            )
            .await?;
            svc.replace_batch(conns, "orders", &[obj(json!({"id": 1, "status": "closed"}))]).await
        })
    })
    .await
    .unwrap();
    assert!(affected >= 1);

    let mut conns = ConnectionSet::new(&t.state.sources);
    let one = crud.find_by_id(&mut conns, "orders", &json!(1)).await.unwrap();
    let two = crud.find_by_id(&mut conns, "orders", &json!(2)).await.unwrap();
    assert_eq!(one.get("status"), Some(&json!("closed")));
    assert_eq!(two.get("status"), Some(&json!("it's paid")));
    conns.release().await;
    assert_eq!(count_rows(&t.state, "master", "orders").await, 2);
}

#[tokio::test]
async fn test_closed_lock_skips_versioning_until_reopened() {
    let t = engine().await;
    let crud = t.state.crud();
    let mut conns = ConnectionSet::new(&t.state.sources);

    crud.create(&mut conns, "user_account", &obj(json!({"name": "v"}))).await.unwrap();
    crud.close_lock("user_account").unwrap();

    // stale version is ignored while the lock is closed
    crud.save_by_id(&mut conns, "user_account", &json!(1), &obj(json!({"name": "w", "record_version": 7})))
        .await
        .unwrap();
    crud.create(&mut conns, "user_account", &obj(json!({"name": "unversioned"}))).await.unwrap();
    let row = crud.find_by_id(&mut conns, "user_account", &json!(2)).await.unwrap();
    assert!(row.get("record_version").is_none());

    let backfilled = crud.open_lock(&mut conns, "user_account").await.unwrap();
    assert_eq!(backfilled, 1);
    let row = crud.find_by_id(&mut conns, "user_account", &json!(2)).await.unwrap();
    assert_eq!(row.get("record_version"), Some(&json!(1)));
    conns.release().await;
}

#[tokio::test]
async fn test_find_or_init_returns_match_or_creates() {
    let t = engine().await;
    let crud = t.state.crud();
    let mut conns = ConnectionSet::new(&t.state.sources);

    crud.create(&mut conns, "user_account", &obj(json!({"name": "ann", "email": "a@x.io"}))).await.unwrap();
    let found = crud
        .find_or_init(&mut conns, "user_account", &obj(json!({"NAME": "ann", "isOr": true})))
        .await
        .unwrap();
    assert_eq!(found.get("id"), Some(&json!(1)));
    assert_eq!(found.get("email"), Some(&json!("a@x.io")));

    let made = crud
        .find_or_init(&mut conns, "user_account", &obj(json!({"name": "bob", "email": "b@x.io", "nope": 1})))
        .await
        .unwrap();
    assert_eq!(made.get("id"), Some(&json!(2)));
    // an or-flag must not widen the match to ann
    let again = crud
        .find_or_init(&mut conns, "user_account", &obj(json!({"name": "bob", "email": "a@x.io", "isOr": true})))
        .await
        .unwrap();
    assert_eq!(again.get("id"), Some(&json!(3)));

    let err = crud
        .find_or_init(&mut conns, "user_account", &obj(json!({"nope": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    conns.release().await;
    assert_eq!(count_rows(&t.state, "master", "user_account").await, 3);
}

#[tokio::test]
async fn test_batch_async_ignoring_versions_skips_the_check() {
    let t = common::engine_with(|s| s.worker_concurrency = 1).await;
    let crud = t.state.crud();
    let mut conns = ConnectionSet::new(&t.state.sources);
    crud.create(&mut conns, "user_account", &obj(json!({"name": "v1"}))).await.unwrap();
    crud.save_by_id(&mut conns, "user_account", &json!(1), &obj(json!({"name": "v2", "record_version": 1})))
        .await
        .unwrap();
    conns.release().await;

    // version 1 is stale now
    let stale = vec![obj(json!({"id": 1, "name": "lost", "record_version": 1}))];
    let err = crud.batch_async_create_or_update("user_account", stale.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::StaleRecord { .. }));

    let mut rows = stale;
    rows.push(obj(json!({"name": "fresh", "RECORD_VERSION": 9})));
    let saved = crud
        .batch_async_create_or_update_ignore_version("user_account", rows)
        .await
        .unwrap();
    assert_eq!(saved.len(), 2);

    let mut conns = ConnectionSet::new(&t.state.sources);
    let updated = crud.find_by_id(&mut conns, "user_account", &json!(1)).await.unwrap();
    assert_eq!(updated.get("name"), Some(&json!("lost")));
    assert_eq!(updated.get("record_version"), Some(&json!(3)));
    let created = crud.find_by_id(&mut conns, "user_account", &json!(2)).await.unwrap();
    assert_eq!(created.get("record_version"), Some(&json!(1)));
    conns.release().await;
}

#[tokio::test]
async fn test_children_load_inside_a_transaction() {
    let t = engine().await;
    let crud = t.state.crud();
    let svc = crud.clone();

    let order = crud
        .transaction(&["master"], move |conns| {
            Box::pin(async move {
                svc.create(conns, "orders", &obj(json!({"status": "open"}))).await?;
                svc.create(conns, "order_item", &obj(json!({"order_id": 1, "sku": "a"}))).await?;
                svc.find_with_children(conns, "orders", &json!(1)).await
            })
        })
        .await
        .unwrap();
    assert_eq!(order["children"]["order_item"].as_array().unwrap().len(), 1);
    assert_eq!(count_rows(&t.state, "master", "order_item").await, 1);
}
