//! Transaction brackets: open, begin, run the body, commit or roll back, always release.

use crate::context::{ConnectionSet, DataSources, TaskPool};
use crate::error::AppError;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;

/// Run `body` inside a transaction on every datasource in `keys` (the default datasource
/// when empty). Commits in open order on success; on failure rolls back all of them and
/// returns the body's error. Connections are released on every path.
///
/// The body's future must be `Send` for any borrow of the set, so statements inside it go
/// through `ConnectionSet::acquire` and the boxed helpers in `sql::exec`.
///
/// ```ignore
/// let id = with_transaction(&sources, &["master", "reports"], |conns| {
///     Box::pin(async move {
///         let conn = conns.acquire("master").await?;
///         let done = exec::execute(conn, "DELETE FROM audit", &[]).await?;
///         Ok(done.rows_affected())
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<T, F>(sources: &DataSources, keys: &[&str], body: F) -> Result<T, AppError>
where
    F: for<'c> FnOnce(&'c mut ConnectionSet) -> BoxFuture<'c, Result<T, AppError>>,
{
    let mut conns = ConnectionSet::new(sources);
    let result = run_in_transaction(&mut conns, keys, body).await;
    conns.release().await;
    result
}

async fn run_in_transaction<T, F>(conns: &mut ConnectionSet, keys: &[&str], body: F) -> Result<T, AppError>
where
    F: for<'c> FnOnce(&'c mut ConnectionSet) -> BoxFuture<'c, Result<T, AppError>>,
{
    if keys.is_empty() {
        let key = conns.current_key().to_string();
        conns.open(&[key.as_str()]).await?;
    } else {
        conns.open(keys).await?;
    }
    tracing::info!(datasources = ?conns.open_keys(), "transaction open");
    conns.begin_all().await?;
    match body(&mut *conns).await {
        Ok(value) => match conns.commit_all().await {
            Ok(()) => Ok(value),
            Err(e) => {
                conns.rollback_all().await;
                Err(e)
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "transaction body failed");
            conns.rollback_all().await;
            Err(e)
        }
    }
}

/// Run `body` with connections for `keys` open but no transaction; each statement
/// commits on its own. Connections are released on every path.
pub async fn with_connections<T, F>(sources: &DataSources, keys: &[&str], body: F) -> Result<T, AppError>
where
    F: for<'c> FnOnce(&'c mut ConnectionSet) -> BoxFuture<'c, Result<T, AppError>>,
{
    let mut conns = ConnectionSet::new(sources);
    let result = match conns.open(keys).await {
        Ok(()) => body(&mut conns).await,
        Err(e) => Err(e),
    };
    conns.release().await;
    result
}

/// `with_transaction` on the worker pool. The handle resolves to the body's result;
/// bodies submitted this way run concurrently, each with its own connections.
pub fn spawn_transaction<T, F>(
    pool: &TaskPool,
    sources: &DataSources,
    keys: Vec<String>,
    body: F,
) -> JoinHandle<Result<T, AppError>>
where
    F: for<'c> FnOnce(&'c mut ConnectionSet) -> BoxFuture<'c, Result<T, AppError>> + Send + 'static,
    T: Send + 'static,
{
    let sources = sources.clone();
    pool.submit(async move {
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        with_transaction(&sources, &keys, body).await
    })
}
