//! Application state shared across all route handlers.
//!
//! AppState holds the long-lived pieces of the service: the record store,
//! the host mirror, the monitor registry and the webhook scheduler. The
//! request-scoped engine is built per ingest call from these.

use std::sync::Arc;
use std::time::Instant;

use actionlog_core::config::ActionLogConfig;
use actionlog_core::error::ActionLogError;
use actionlog_monitor::{
    ActionMonitor, DispatchScheduler, InMemoryHost, MonitorRegistry, Policies,
};
use actionlog_storage::{ActionRecordRepository, Database};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<ActionLogConfig>,
    /// Persistent action record store.
    pub repo: Arc<ActionRecordRepository>,
    /// Mirror of the host repository, fed by ingest catalogs.
    pub host: Arc<InMemoryHost>,
    /// Monitors instantiated for every ingest request.
    pub registry: Arc<MonitorRegistry>,
    /// Injectable decision points.
    pub policies: Arc<Policies>,
    /// End-of-request webhook dispatch.
    pub dispatcher: Arc<DispatchScheduler>,
    /// Bearer token for protected endpoints.
    pub api_token: String,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with default policies and monitors, and a
    /// webhook scheduler built from `config`.
    pub fn new(config: ActionLogConfig, database: Database) -> Result<Self, ActionLogError> {
        let policies = Arc::new(Policies::new());
        let dispatcher = DispatchScheduler::from_config(&config, policies.clone())
            .map_err(|e| ActionLogError::Dispatch(e.to_string()))?;
        Ok(Self::with_parts(
            config,
            database,
            policies,
            MonitorRegistry::with_defaults(),
            dispatcher,
        ))
    }

    /// Create an AppState from explicitly provided parts.
    pub fn with_parts(
        config: ActionLogConfig,
        database: Database,
        policies: Arc<Policies>,
        registry: MonitorRegistry,
        dispatcher: DispatchScheduler,
    ) -> Self {
        Self {
            config: Arc::new(config),
            repo: Arc::new(ActionRecordRepository::new(Arc::new(database))),
            host: Arc::new(InMemoryHost::with_core_types()),
            registry: Arc::new(registry),
            policies,
            dispatcher: Arc::new(dispatcher),
            api_token: String::new(),
            start_time: Instant::now(),
        }
    }

    /// A fresh request-scoped engine over the shared store, host and
    /// policies.
    pub fn engine(&self) -> Arc<ActionMonitor> {
        Arc::new(ActionMonitor::new(
            self.repo.clone(),
            self.host.clone(),
            self.policies.clone(),
        ))
    }
}
