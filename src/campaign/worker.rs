//! Per-campaign worker: walks the audience from the saved pointer until the
//! audience is exhausted or a stop is requested.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::model::{CampaignId, CampaignState, Representatives, Status};
use crate::config::CampaignConfig;
use crate::external::{CampaignSystemStatus, ExternalCampaignSystem};
use crate::merge::TemplateMerger;
use crate::sms::{Message, MessageTransport};
use crate::store::RecordStore;

/// Shared dependencies for campaign execution.
#[derive(Clone)]
pub struct CampaignDeps {
    pub transport: Arc<dyn MessageTransport>,
    pub merger: Arc<dyn TemplateMerger>,
    pub store: Arc<dyn RecordStore>,
    pub api: Arc<dyn ExternalCampaignSystem>,
    pub config: CampaignConfig,
}

/// Worker that executes a single campaign.
///
/// The state is only mutated by the worker's own task while it runs; the
/// manager reads it through [`CampaignWorker::snapshot`].
pub struct CampaignWorker {
    campaign_id: CampaignId,
    state: Arc<RwLock<CampaignState>>,
    reps: Arc<Representatives>,
    deps: CampaignDeps,
    cancel: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CampaignWorker {
    /// Wrap a fresh or rehydrated state.
    ///
    /// A snapshot saved while RUNNING belongs to a run that no longer exists
    /// and is treated as STOPPED so it can be resumed.
    pub fn new(mut state: CampaignState, reps: Representatives, deps: CampaignDeps) -> Self {
        if state.status == Status::Running {
            state.status = Status::Stopped;
        }
        let (cancel, _) = watch::channel(false);
        Self {
            campaign_id: state.campaign.id.clone(),
            state: Arc::new(RwLock::new(state)),
            reps: Arc::new(reps),
            deps,
            cancel,
            handle: Mutex::new(None),
        }
    }

    pub fn campaign_id(&self) -> &CampaignId {
        &self.campaign_id
    }

    pub async fn status(&self) -> Status {
        self.state.read().await.status
    }

    pub async fn snapshot(&self) -> CampaignState {
        self.state.read().await.clone()
    }

    /// Mark the campaign RUNNING and start the send loop on its own task.
    ///
    /// Returns `false` without doing anything when the current status cannot
    /// move to RUNNING.
    pub async fn run(&self) -> bool {
        {
            let mut state = self.state.write().await;
            if !state.status.can_transition_to(Status::Running) {
                return false;
            }
            state.status = Status::Running;
            info!(
                campaign_id = %self.campaign_id,
                pointer = state.audience_pointer,
                remaining = state.remaining(),
                "Campaign running"
            );
        }

        self.cancel.send_replace(false);
        let cancel = self.cancel.subscribe();
        let task = send_loop(
            self.state.clone(),
            self.reps.clone(),
            self.deps.clone(),
            cancel,
        );
        *self.handle.lock().await = Some(tokio::spawn(task));
        true
    }

    /// Raise the cancellation signal. The run comes to rest at the next
    /// recipient boundary.
    pub fn request_stop(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait for the current run task, if any, to finish.
    pub async fn join(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(campaign_id = %self.campaign_id, error = %e, "Campaign task failed");
            }
        }
    }
}

async fn send_loop(
    state: Arc<RwLock<CampaignState>>,
    reps: Arc<Representatives>,
    deps: CampaignDeps,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let (target, body, campaign_id) = {
            let state = state.read().await;
            if state.is_exhausted() {
                break;
            }
            (
                state.audience[state.audience_pointer].clone(),
                state.campaign.body.clone(),
                state.campaign.id.clone(),
            )
        };

        if *cancel.borrow_and_update() {
            let mut state = state.write().await;
            state.status = Status::Stopped;
            info!(
                campaign_id = %campaign_id,
                pointer = state.audience_pointer,
                remaining = state.remaining(),
                "Campaign stopped"
            );
            return;
        }

        let Some(rep) = reps.get(&target.district) else {
            warn!(
                campaign_id = %campaign_id,
                district = %target.district,
                "No representative for district, skipping recipient"
            );
            state.write().await.audience_pointer += 1;
            continue;
        };

        let message = Message::new(
            &target.phone_number,
            &deps.config.from_number,
            deps.merger.merge(&body, Some(rep)),
        );
        let result = deps.transport.send(&message).await;

        {
            let mut state = state.write().await;
            match result {
                Ok(status) => {
                    state.stats.sent_to += 1;
                    debug!(campaign_id = %campaign_id, to = %message.to, status, "Recipient sent");
                }
                Err(e) => {
                    state.stats.errors += 1;
                    warn!(campaign_id = %campaign_id, to = %message.to, error = %e, "Recipient send failed");
                }
            }
            state.audience_pointer += 1;
        }

        tokio::select! {
            _ = tokio::time::sleep(deps.config.throttle) => {}
            changed = cancel.changed() => {
                // Sender gone: nobody can stop this run, keep pacing.
                if changed.is_err() {
                    tokio::time::sleep(deps.config.throttle).await;
                }
            }
        }
    }

    finish(&state, &deps).await;
}

/// Persist the final state and tell the campaign system the run completed.
async fn finish(state: &RwLock<CampaignState>, deps: &CampaignDeps) {
    let snapshot = {
        let mut state = state.write().await;
        state.status = Status::Done;
        state.clone()
    };

    let campaign_id = &snapshot.campaign.id;
    match deps.store.save_campaign_state(&snapshot).await {
        Ok(()) => info!(
            campaign_id = %campaign_id,
            sent = snapshot.stats.sent_to,
            errors = snapshot.stats.errors,
            "Campaign done"
        ),
        Err(e) => {
            state.write().await.status = Status::CompletedWithErrors;
            error!(campaign_id = %campaign_id, error = %e, "Campaign finished but final state was not saved");
        }
    }

    if let Err(e) = deps
        .api
        .campaign_completed(CampaignSystemStatus::Completed, &snapshot.campaign)
        .await
    {
        warn!(campaign_id = %campaign_id, error = %e, "Failed to report campaign completion");
    }
}
