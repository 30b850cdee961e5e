//! The connections one logical operation holds, across datasources, and their transaction state.

use crate::context::DataSources;
use crate::error::AppError;
use crate::sql::exec;
use futures::future::BoxFuture;
use sqlx::any::Any;
use sqlx::pool::PoolConnection;
use sqlx::AnyConnection;

/// Open connections of one logical operation, in the order they were opened.
///
/// Begin, commit and rollback apply to every connection in that order. Connections opened
/// while a transaction is active join it. `release` hands them back to their pools; a set
/// dropped without `release` closes connections still inside a transaction instead of
/// pooling them.
pub struct ConnectionSet {
    sources: DataSources,
    conns: Vec<(String, PoolConnection<Any>)>,
    current: String,
    in_tx: bool,
}

impl ConnectionSet {
    pub fn new(sources: &DataSources) -> Self {
        ConnectionSet {
            current: sources.default_key().to_string(),
            sources: sources.clone(),
            conns: Vec::new(),
            in_tx: false,
        }
    }

    pub fn sources(&self) -> &DataSources {
        &self.sources
    }

    /// Datasource used when a caller does not name one.
    pub fn current_key(&self) -> &str {
        &self.current
    }

    /// Select the current datasource. Fails fast on a key that is not configured.
    pub fn switch_to(&mut self, key: &str) -> Result<(), AppError> {
        self.sources.get(key)?;
        tracing::debug!(from = %self.current, to = %key, "datasource switched");
        self.current = key.to_string();
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.in_tx
    }

    /// Keys of the open connections, in open order.
    pub fn open_keys(&self) -> Vec<&str> {
        self.conns.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Acquire a connection for each key not already open.
    pub async fn open(&mut self, keys: &[&str]) -> Result<(), AppError> {
        for key in keys {
            self.position(key.to_string()).await?;
        }
        Ok(())
    }

    /// Begin a transaction on every open connection.
    pub async fn begin_all(&mut self) -> Result<(), AppError> {
        for (key, conn) in self.conns.iter_mut() {
            exec::control(&mut **conn, "BEGIN")
                .await
                .map_err(|e| AppError::Transaction {
                    datasource: key.clone(),
                    source: e,
                })?;
            tracing::debug!(datasource = %key, "transaction begun");
            // set after the first BEGIN so a later failure still rolls back
            self.in_tx = true;
        }
        // connections opened from now on join the transaction
        self.in_tx = true;
        Ok(())
    }

    /// Commit every connection in open order. Stops at the first failure; connections
    /// already committed stay committed.
    pub async fn commit_all(&mut self) -> Result<(), AppError> {
        if !self.in_tx {
            return Ok(());
        }
        for (key, conn) in self.conns.iter_mut() {
            exec::control(&mut **conn, "COMMIT")
                .await
                .map_err(|e| AppError::Transaction {
                    datasource: key.clone(),
                    source: e,
                })?;
            tracing::debug!(datasource = %key, "committed");
        }
        self.in_tx = false;
        tracing::info!(datasources = ?self.open_keys(), "transaction committed");
        Ok(())
    }

    /// Roll back every connection. Failures are logged, never returned, so the error that
    /// caused the rollback is the one the caller sees.
    pub async fn rollback_all(&mut self) {
        if !self.in_tx {
            return;
        }
        for (key, conn) in self.conns.iter_mut() {
            match exec::control(&mut **conn, "ROLLBACK").await {
                Ok(_) => tracing::warn!(datasource = %key, "transaction rolled back"),
                Err(e) => tracing::warn!(datasource = %key, error = %e, "rollback failed"),
            }
        }
        self.in_tx = false;
    }

    /// Return every connection to its pool. Safe to call more than once.
    pub async fn release(&mut self) {
        if self.in_tx {
            tracing::warn!("releasing connections with an open transaction");
            self.rollback_all().await;
        }
        for (key, conn) in self.conns.drain(..) {
            tracing::debug!(datasource = %key, "connection released");
            drop(conn);
        }
    }

    /// Connection for `key`, opened on demand. A connection opened while a transaction is
    /// active begins one too.
    pub fn acquire(&mut self, key: &str) -> BoxFuture<'_, Result<&mut AnyConnection, AppError>> {
        let key = key.to_string();
        Box::pin(async move {
            let i = self.position(key).await?;
            Ok(&mut *self.conns[i].1)
        })
    }

    /// Connection for the current datasource.
    pub fn current(&mut self) -> BoxFuture<'_, Result<&mut AnyConnection, AppError>> {
        Box::pin(async move {
            let key = self.current.clone();
            let i = self.position(key).await?;
            Ok(&mut *self.conns[i].1)
        })
    }

    fn position(&mut self, key: String) -> BoxFuture<'_, Result<usize, AppError>> {
        Box::pin(async move {
            if let Some(i) = self.conns.iter().position(|(k, _)| *k == key) {
                return Ok(i);
            }
            let source = self.sources.get(&key)?;
            let mut conn = source.pool.acquire().await.map_err(|e| AppError::Transaction {
                datasource: key.clone(),
                source: e,
            })?;
            if self.in_tx {
                exec::control(&mut *conn, "BEGIN")
                    .await
                    .map_err(|e| AppError::Transaction {
                        datasource: key.clone(),
                        source: e,
                    })?;
            }
            tracing::debug!(datasource = %key, joined_tx = self.in_tx, "connection opened");
            self.conns.push((key, conn));
            Ok(self.conns.len() - 1)
        })
    }
}

impl Drop for ConnectionSet {
    fn drop(&mut self) {
        if self.conns.is_empty() {
            return;
        }
        let in_tx = self.in_tx;
        for (key, conn) in self.conns.drain(..) {
            if in_tx {
                tracing::warn!(datasource = %key, "dropping connection inside a transaction; closing it");
                drop(conn.detach());
            }
        }
    }
}
