//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use optica_core::lens::MatrixRow;
use optica_core::{LensFamilyId, OrganizationId};

use crate::config::AdminConfig;

/// Matrix rows keyed by organization and family.
pub type LensMatrixCache = Cache<(OrganizationId, LensFamilyId), Arc<Vec<MatrixRow>>>;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    lens_cache: LensMatrixCache,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool) -> Self {
        let lens_cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                lens_cache,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Cache of lens price matrices.
    #[must_use]
    pub fn lens_cache(&self) -> &LensMatrixCache {
        &self.inner.lens_cache
    }
}
