//! Dispatch of classified inbound replies to their workflows.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::classify::{InboundIntent, classify};
use super::InboundMessage;
use crate::approvals::find_approver;
use crate::error::{ApprovalError, Result};
use crate::external::ExternalCampaignSystem;
use crate::store::{AudienceSource, RecordStore};

/// Where an inbound reply ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The vote was recorded with the campaign system.
    Approved { campaign_ref: i64, approver_id: String },
    Subscribed { emails: usize },
    Unsubscribed { emails: usize },
    /// Kept in lost-and-found.
    Stowed,
}

/// Routes inbound replies to approval, subscription, or lost-and-found.
#[derive(Clone)]
pub struct InboundRouter {
    store: Arc<dyn RecordStore>,
    source: Arc<dyn AudienceSource>,
    api: Arc<dyn ExternalCampaignSystem>,
}

impl InboundRouter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        source: Arc<dyn AudienceSource>,
        api: Arc<dyn ExternalCampaignSystem>,
    ) -> Self {
        Self { store, source, api }
    }

    /// Classify `message` and run the matching workflow.
    pub async fn dispatch(&self, message: &InboundMessage) -> Result<Disposition> {
        match classify(&message.body) {
            InboundIntent::Approval { campaign_ref } => self.approve(campaign_ref, message).await,
            InboundIntent::Subscribe => {
                let emails = self.source.emails_for_phone(&message.from).await?;
                self.api.subscribe(&emails).await?;
                Ok(Disposition::Subscribed {
                    emails: emails.len(),
                })
            }
            InboundIntent::Unsubscribe => {
                let emails = self.source.emails_for_phone(&message.from).await?;
                self.api.unsubscribe(&emails).await?;
                Ok(Disposition::Unsubscribed {
                    emails: emails.len(),
                })
            }
            InboundIntent::Unclassified => {
                info!(from = %message.from, sid = %message.message_sid, "Unclassified reply, stowing");
                self.store.stow_message(message).await?;
                Ok(Disposition::Stowed)
            }
        }
    }

    /// Dispatch and log the outcome. Errors never reach the caller.
    pub async fn handle(&self, message: InboundMessage) {
        match self.dispatch(&message).await {
            Ok(disposition) => info!(
                from = %message.from,
                sid = %message.message_sid,
                ?disposition,
                "Inbound message handled"
            ),
            Err(e) => error!(
                from = %message.from,
                sid = %message.message_sid,
                error = %e,
                "Error processing inbound message"
            ),
        }
    }

    async fn approve(
        &self,
        campaign_ref: i64,
        message: &InboundMessage,
    ) -> Result<Disposition> {
        let request = self
            .store
            .get_most_recent_approval(campaign_ref)
            .await?
            .ok_or(ApprovalError::RequestNotFound { campaign_ref })?;

        let approver = find_approver(self.api.as_ref(), &message.from, &request).await?;
        self.api.approve_campaign(&request, &approver).await?;

        // The campaign system already holds the vote; the local copy is audit only.
        if let Err(e) = self.store.approve_campaign(&request, &approver).await {
            warn!(
                campaign_ref,
                approver_id = %approver.id,
                error = %e,
                "Approval recorded externally but not in the record store"
            );
        }

        info!(
            campaign_ref,
            version = request.version,
            approver_id = %approver.id,
            "Campaign approved"
        );
        Ok(Disposition::Approved {
            campaign_ref,
            approver_id: approver.id,
        })
    }
}
