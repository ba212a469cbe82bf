//! HTTP surface: provider webhooks and outbound call placement

mod handlers;
mod types;

pub use handlers::create_router;

use crate::gateway::TelephonyGateway;
use crate::ivr::{DialogEngine, StateCodec};
use std::sync::Arc;

/// Application state shared across handlers. Everything in it is read-only.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DialogEngine>,
    pub codec: Arc<StateCodec>,
    pub gateway: Arc<dyn TelephonyGateway>,
    /// Fixed public origin; derived per request when unset
    pub public_base_url: Option<String>,
}

impl AppState {
    pub fn new(
        engine: Arc<DialogEngine>,
        gateway: Arc<dyn TelephonyGateway>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            codec: Arc::new(engine.codec()),
            engine,
            gateway,
            public_base_url,
        }
    }
}
