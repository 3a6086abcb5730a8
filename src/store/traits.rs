//! Persistence and audience traits the campaign engine depends on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::approvals::{ApprovalRequest, Approver};
use crate::campaign::model::{CampaignId, CampaignState, CampaignTarget, Representatives};
use crate::error::{DatabaseError, SourceError};
use crate::inbound::InboundMessage;

/// A named, reusable message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub key: String,
    pub body: String,
    #[serde(default)]
    pub active: bool,
}

/// Durable record store: campaign snapshots, approvals, lost-and-found
/// messages, and message templates.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Campaign state ──────────────────────────────────────────────

    /// Insert or replace the snapshot keyed by its state id.
    async fn save_campaign_state(&self, state: &CampaignState) -> Result<(), DatabaseError>;

    /// Snapshot for the given campaign identity, if one was ever saved.
    async fn get_campaign_state(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignState>, DatabaseError>;

    // ── Approvals ───────────────────────────────────────────────────

    /// Store a new approval request version.
    ///
    /// The store assigns the next version for the campaign reference, stamps
    /// `requested_at`, and clears any prior votes. Returns the stored request.
    async fn register_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalRequest, DatabaseError>;

    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>, DatabaseError>;

    /// Highest-version request for a campaign reference.
    async fn get_most_recent_approval(
        &self,
        campaign_ref: i64,
    ) -> Result<Option<ApprovalRequest>, DatabaseError>;

    /// Record `approver`'s vote on `request` for audit.
    async fn approve_campaign(
        &self,
        request: &ApprovalRequest,
        approver: &Approver,
    ) -> Result<(), DatabaseError>;

    // ── Lost and found ──────────────────────────────────────────────

    /// Keep an inbound message nothing else knew how to handle.
    async fn stow_message(&self, message: &InboundMessage) -> Result<(), DatabaseError>;

    /// Stowed messages, oldest first.
    async fn stowed_messages(&self, limit: usize) -> Result<Vec<InboundMessage>, DatabaseError>;

    // ── Message templates ───────────────────────────────────────────

    async fn get_message_template(&self, key: &str)
    -> Result<Option<MessageTemplate>, DatabaseError>;

    async fn get_active_message_templates(&self) -> Result<Vec<MessageTemplate>, DatabaseError>;

    /// Insert or replace a template by key.
    async fn put_message_template(&self, template: &MessageTemplate) -> Result<(), DatabaseError>;
}

/// Read-only view of the subscriber list and representative table.
#[async_trait]
pub trait AudienceSource: Send + Sync {
    /// Every subscribed recipient, one per phone number, in source order.
    async fn current_subscribers(&self) -> Result<Vec<CampaignTarget>, SourceError>;

    /// District code → representative.
    async fn representatives(&self) -> Result<Representatives, SourceError>;

    /// Best guess at the district for a postal code.
    async fn district_for_postal_code(&self, postal_code: &str)
    -> Result<Option<String>, SourceError>;

    /// Subscriber emails registered for a phone number.
    async fn emails_for_phone(&self, phone: &str) -> Result<Vec<String>, SourceError>;
}
