//! HTTP surface: campaign control, one-off sends, approvals, and the
//! provider's inbound webhook.

pub mod campaigns;
pub mod error;
pub mod messages;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::campaign::{CampaignDeps, CampaignManager};
use crate::inbound::InboundRouter;
use crate::store::AudienceSource;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<CampaignManager>,
    pub inbound: InboundRouter,
    /// Transport, merger, store, and sender number for one-off sends.
    pub deps: CampaignDeps,
    pub source: Arc<dyn AudienceSource>,
}

impl AppState {
    pub fn new(deps: CampaignDeps, source: Arc<dyn AudienceSource>) -> Self {
        let inbound = InboundRouter::new(deps.store.clone(), source.clone(), deps.api.clone());
        let manager = Arc::new(CampaignManager::new(deps.clone(), source.clone()));
        Self {
            manager,
            inbound,
            deps,
            source,
        }
    }
}

/// Build the Axum router with every texter route.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/status", get(messages::status))
        .route("/incoming", post(messages::incoming))
        .route("/messages", post(messages::send_message))
        .route("/intro", post(messages::send_intro))
        .route("/approvals/{campaign_ref}", post(messages::request_approval))
        .route("/campaigns", post(campaigns::start_campaign))
        .route("/campaigns/test", post(campaigns::test_campaign))
        .route("/campaigns/{id}/stop", post(campaigns::stop_campaign))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
