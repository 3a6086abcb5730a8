//! Campaign execution engine.
//!
//! - `model`: campaign, recipient, and run-state types
//! - `audience`: who a new run sends to
//! - `worker`: one resumable, cancellable send loop per campaign
//! - `manager`: registry keyed by campaign identity

pub mod audience;
pub mod manager;
pub mod model;
pub mod worker;

pub use manager::CampaignManager;
pub use model::{
    AudienceSelectionMode, Campaign, CampaignId, CampaignState, CampaignStats, CampaignTarget,
    RepInfo, Representatives, Status,
};
pub use worker::{CampaignDeps, CampaignWorker};
