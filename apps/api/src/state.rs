use std::sync::Arc;

use crate::applications::store::ApplicationStore;
use crate::config::Config;
use crate::notifications::Notifier;
use crate::storage::ResumeStorage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Default: `PgApplicationStore`. Tests swap in an in-memory store.
    pub store: Arc<dyn ApplicationStore>,
    /// S3-backed when a bucket is configured, `DisabledStorage` otherwise.
    pub storage: Arc<dyn ResumeStorage>,
    pub notifier: Notifier,
    pub config: Config,
}
