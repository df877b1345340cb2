//! Per-connection session handling
//!
//! - `state`: lifecycle state machine
//! - `transport`: client connection abstraction and the WebSocket transport
//! - `controller`: admission, frame loop and close sequence

pub mod controller;
pub mod state;
pub mod transport;

pub use controller::{SessionController, SessionOutcome};
pub use state::{Lifecycle, SessionState, StateTransition};
pub use transport::{Inbound, Transport, WsTransport};

use emotrack_common::EventBus;
use std::sync::Arc;

use crate::aggregator::SessionAggregator;
use crate::config::IngestConfig;
use crate::db::EmotionRepository;
use crate::identity::IdentityResolver;
use crate::inference::InferencePool;
use crate::registry::ConnectionRegistry;
use crate::report::{ReportGenerator, ReportTrigger};

/// Shared collaborators handed to every session
#[derive(Clone)]
pub struct SessionServices {
    pub config: Arc<IngestConfig>,
    pub registry: Arc<ConnectionRegistry>,
    pub identity: Arc<dyn IdentityResolver>,
    pub inference: Arc<InferencePool>,
    pub repo: Arc<dyn EmotionRepository>,
    pub aggregator: SessionAggregator,
    pub reports: ReportTrigger,
    pub events: EventBus,
}

impl SessionServices {
    pub fn new(
        config: IngestConfig,
        identity: Arc<dyn IdentityResolver>,
        inference: Arc<InferencePool>,
        repo: Arc<dyn EmotionRepository>,
        reports: Arc<dyn ReportGenerator>,
        events: EventBus,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(ConnectionRegistry::new()),
            identity,
            inference,
            aggregator: SessionAggregator::new(Arc::clone(&repo), events.clone()),
            reports: ReportTrigger::new(reports, events.clone()),
            repo,
            events,
        }
    }
}

/// Admit and run one session to completion
///
/// `None` when admission was rejected.
pub async fn run_session<T: Transport>(
    services: SessionServices,
    transport: T,
    credential: Option<&str>,
) -> Option<SessionOutcome> {
    let controller = SessionController::admit(services, transport, credential).await.ok()?;
    Some(controller.run().await)
}
