//! Shared state for bkl-daemon handlers.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The pool is the only
//! cross-request state; everything else the daemon knows lives in Postgres.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            build: BuildInfo {
                service: "bkl-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}
