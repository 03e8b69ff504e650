pub mod config;
pub mod error;
pub mod events;
pub mod ingest;
pub mod install;
pub mod observability;
pub mod rest;
pub mod state_service;
pub mod topology;
pub mod transport;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use config::MeshdConfig;
use events::EventBroadcaster;
use install::RuntimeInstaller;
use state_service::StateServiceClient;
use topology::reconciler::Reconciler;
use transport::EventTransport;

/// Shared application state passed to every route handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<MeshdConfig>,
    /// The topology model behind its single serialized mutation path. The
    /// ingest loop is the only writer; everything else takes the lock to read.
    pub topology: Arc<Mutex<Reconciler>>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub transport: Arc<dyn EventTransport>,
    pub state: Arc<StateServiceClient>,
    pub installer: Arc<RuntimeInstaller>,
    pub started_at: Instant,
}
