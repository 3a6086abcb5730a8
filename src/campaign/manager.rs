//! Campaign registry: start, resume, and stop campaigns by identity.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::audience::resolve_audience;
use super::model::{Campaign, CampaignId, CampaignState, Status};
use super::worker::{CampaignDeps, CampaignWorker};
use crate::error::{CampaignError, Error, Result};
use crate::external::CampaignSystemStatus;
use crate::store::AudienceSource;

/// Registry entry for one campaign identity. Empty until a worker is built.
type Slot = Arc<Mutex<Option<Arc<CampaignWorker>>>>;

/// Owns every campaign worker; at most one per campaign identity.
///
/// The map lock is only held to fetch or insert a slot. The slot lock is
/// held across check-then-launch, so two starts for one identity serialize
/// while different identities never wait on each other.
pub struct CampaignManager {
    deps: CampaignDeps,
    source: Arc<dyn AudienceSource>,
    slots: Mutex<HashMap<CampaignId, Slot>>,
}

impl CampaignManager {
    pub fn new(deps: CampaignDeps, source: Arc<dyn AudienceSource>) -> Self {
        Self {
            deps,
            source,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, id: &CampaignId) -> Slot {
        self.slots
            .lock()
            .await
            .entry(id.clone())
            .or_default()
            .clone()
    }

    async fn existing_slot(&self, id: &CampaignId) -> Option<Slot> {
        self.slots.lock().await.get(id).cloned()
    }

    async fn worker(&self, id: &CampaignId) -> Option<Arc<CampaignWorker>> {
        let slot = self.existing_slot(id).await?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Start or resume `campaign`. Idempotent for a running campaign.
    ///
    /// Finished campaigns are never restarted; that is logged, not an error.
    /// When no worker can be built the campaign system is told the campaign
    /// terminated and nothing is registered.
    pub async fn start(&self, campaign: Campaign) -> Result<()> {
        let slot = self.slot(&campaign.id).await;
        let mut guard = slot.lock().await;

        if let Some(worker) = guard.as_ref() {
            launch(worker).await;
            return Ok(());
        }

        match self.build_worker(&campaign).await {
            Ok(worker) => {
                let worker = Arc::new(worker);
                *guard = Some(worker.clone());
                launch(&worker).await;
                Ok(())
            }
            Err(source) => {
                error!(campaign_id = %campaign.id, error = %source, "Campaign failed to start");
                let notify_error = self
                    .deps
                    .api
                    .campaign_completed(CampaignSystemStatus::Terminated, &campaign)
                    .await
                    .err()
                    .map(|e| {
                        warn!(campaign_id = %campaign.id, error = %e, "Failed to report campaign termination");
                        Box::new(Error::from(e))
                    });

                Err(CampaignError::StartFailed {
                    id: campaign.id,
                    source: Box::new(source),
                    notify_error,
                }
                .into())
            }
        }
    }

    /// Rehydrate from the saved state when there is one, otherwise resolve a
    /// fresh audience.
    async fn build_worker(&self, campaign: &Campaign) -> Result<CampaignWorker> {
        let prior = self.deps.store.get_campaign_state(&campaign.id).await?;
        let reps = self.source.representatives().await?;

        let state = match prior {
            Some(state) => {
                info!(
                    campaign_id = %campaign.id,
                    status = %state.status,
                    pointer = state.audience_pointer,
                    "Rehydrating campaign from saved state"
                );
                state
            }
            None => {
                let audience =
                    resolve_audience(campaign, self.deps.store.as_ref(), self.source.as_ref())
                        .await?;
                CampaignState::new(campaign.clone(), audience)
            }
        };

        Ok(CampaignWorker::new(state, reps, self.deps.clone()))
    }

    /// Stop a running campaign and save where it came to rest.
    ///
    /// Unknown or not-running campaigns are left alone.
    pub async fn stop(&self, id: &CampaignId) {
        let Some(slot) = self.existing_slot(id).await else {
            info!(campaign_id = %id, "Stop requested for unknown campaign");
            return;
        };
        let guard = slot.lock().await;
        let Some(worker) = guard.as_ref() else {
            return;
        };

        let status = worker.status().await;
        if status != Status::Running {
            info!(campaign_id = %id, status = %status, "Stop requested for campaign that is not running");
            return;
        }

        worker.request_stop();
        worker.join().await;

        let snapshot = worker.snapshot().await;
        if let Err(e) = self.deps.store.save_campaign_state(&snapshot).await {
            error!(campaign_id = %id, error = %e, "Failed to save stopped campaign state");
        }
    }

    /// Stop every running campaign (graceful shutdown).
    pub async fn stop_all(&self) {
        let active = self.active_campaigns().await;
        join_all(active.iter().map(|id| self.stop(id))).await;
    }

    pub async fn status(&self, id: &CampaignId) -> Option<Status> {
        Some(self.worker(id).await?.status().await)
    }

    pub async fn snapshot(&self, id: &CampaignId) -> Option<CampaignState> {
        Some(self.worker(id).await?.snapshot().await)
    }

    /// Wait for the campaign's current run to finish.
    pub async fn join(&self, id: &CampaignId) {
        if let Some(worker) = self.worker(id).await {
            worker.join().await;
        }
    }

    /// Identities of campaigns currently running.
    pub async fn active_campaigns(&self) -> Vec<CampaignId> {
        let slots: Vec<Slot> = self.slots.lock().await.values().cloned().collect();
        let mut active = Vec::new();
        for slot in slots {
            let worker = slot.lock().await.clone();
            if let Some(worker) = worker {
                if worker.status().await == Status::Running {
                    active.push(worker.campaign_id().clone());
                }
            }
        }
        active
    }
}

/// Apply the start rules to a registered worker.
async fn launch(worker: &CampaignWorker) {
    let id = worker.campaign_id();
    match worker.status().await {
        Status::Running => info!(campaign_id = %id, "Campaign already running"),
        status if status.is_terminal() => {
            info!(campaign_id = %id, status = %status, "Campaign already finished, not restarting")
        }
        _ => {
            worker.run().await;
        }
    }
}
