//! External campaign system of record. It owns campaign status, approver
//! rosters, and list subscriptions.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::approvals::{ApprovalRequest, Approver};
use crate::campaign::model::Campaign;
use crate::error::ExternalError;

pub use client::CampaignSystemClient;

/// Campaign status codes understood by the campaign system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CampaignSystemStatus {
    /// Content approved, campaign may be sent.
    Ready = 2,
    /// Campaign ended abnormally.
    Terminated = 5,
    /// Campaign finished sending.
    Completed = 6,
}

impl From<CampaignSystemStatus> for u8 {
    fn from(status: CampaignSystemStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for CampaignSystemStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::Ready),
            5 => Ok(Self::Terminated),
            6 => Ok(Self::Completed),
            other => Err(format!("unknown campaign status {other}")),
        }
    }
}

/// Calls the core makes into the campaign system.
#[async_trait]
pub trait ExternalCampaignSystem: Send + Sync {
    /// Report that a campaign finished or terminated.
    async fn campaign_completed(
        &self,
        status: CampaignSystemStatus,
        campaign: &Campaign,
    ) -> Result<(), ExternalError>;

    /// The authoritative approver roster.
    async fn get_all_approvers(&self) -> Result<Vec<Approver>, ExternalError>;

    /// Record `approver`'s vote on `request`.
    async fn approve_campaign(
        &self,
        request: &ApprovalRequest,
        approver: &Approver,
    ) -> Result<(), ExternalError>;

    /// Subscribe every email to the SMS list.
    async fn subscribe(&self, emails: &[String]) -> Result<(), ExternalError>;

    /// Unsubscribe every email from the SMS list.
    async fn unsubscribe(&self, emails: &[String]) -> Result<(), ExternalError>;
}
