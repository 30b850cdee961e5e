//! Engine state: pools, models and the worker pool, built once from settings.

use crate::config::{validate, Settings};
use crate::context::{DataSources, TaskPool};
use crate::error::AppError;
use crate::model::ModelRegistry;
use crate::service::CrudService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub sources: DataSources,
    /// Rebuilt in place by `refresh`; queries must not run during a refresh.
    pub registry: Arc<ModelRegistry>,
    pub tasks: TaskPool,
}

impl AppState {
    /// Validate settings, connect every datasource and discover its tables. A datasource
    /// whose catalog cannot be read is logged and left without models.
    pub async fn bootstrap(settings: Settings) -> Result<Self, AppError> {
        validate(&settings)?;
        let sources = DataSources::connect(&settings).await?;
        let registry = Arc::new(ModelRegistry::new());
        let tables = registry.init(&sources, &settings).await;
        tracing::info!(
            datasources = ?sources.keys(),
            tables,
            workers = settings.worker_concurrency,
            "engine ready"
        );
        Ok(AppState {
            tasks: TaskPool::new(settings.worker_concurrency),
            settings: Arc::new(settings),
            sources,
            registry,
        })
    }

    pub fn crud(&self) -> CrudService {
        CrudService::new(self.sources.clone(), self.registry.clone(), self.tasks.clone())
            .with_audit_user(&self.settings.audit_user)
            .with_batch_size(self.settings.batch_size)
    }

    /// Rescan every datasource and replace all models.
    pub async fn refresh(&self) -> usize {
        self.registry.refresh(&self.sources, &self.settings).await
    }

    pub async fn shutdown(&self) {
        self.sources.close().await;
    }
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `dynamodel=info`).
/// Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dynamodel=info")),
        )
        .try_init();
}
