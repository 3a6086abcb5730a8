//! Campaign data model: definitions, recipients, and the resumable run state.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque campaign identity assigned by the external caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(String);

impl CampaignId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A blank identity cannot refer to another campaign.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CampaignId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CampaignId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which part of a source campaign's audience a cloned campaign reuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudienceSelectionMode {
    /// Recipients the source campaign already processed.
    Received,
    /// Recipients after the source campaign's pointer.
    NotReceived,
    /// The source campaign's whole audience.
    #[default]
    All,
}

/// A bulk-SMS send definition. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    /// Numeric reference used by the external campaign system.
    #[serde(default, alias = "campaignId", alias = "campaignID")]
    pub campaign_ref: i64,
    /// Campaign this one was cloned from, if any.
    #[serde(default, alias = "createdFrom")]
    pub created_from: Option<CampaignId>,
    #[serde(default, alias = "audienceType")]
    pub audience_type: AudienceSelectionMode,
    /// Message body template.
    pub body: String,
}

impl Campaign {
    pub fn new(id: impl Into<CampaignId>, campaign_ref: i64, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            campaign_ref,
            created_from: None,
            audience_type: AudienceSelectionMode::All,
            body: body.into(),
        }
    }

    /// Derive this campaign's audience from another campaign's run.
    pub fn cloned_from(mut self, source: impl Into<CampaignId>, mode: AudienceSelectionMode) -> Self {
        self.created_from = Some(source.into());
        self.audience_type = mode;
        self
    }

    /// The source campaign, when one is set and well-formed.
    pub fn source(&self) -> Option<&CampaignId> {
        self.created_from.as_ref().filter(|id| id.is_valid())
    }
}

/// One recipient of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignTarget {
    /// Subscriber id in the audience source.
    #[serde(default)]
    pub id: i64,
    /// Normalized phone number.
    pub phone_number: String,
    pub postal_code: String,
    #[serde(default)]
    pub plus4: Option<String>,
    /// Congressional district used to find the representative.
    pub district: String,
    #[serde(default)]
    pub state_district: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
}

impl CampaignTarget {
    pub fn new(
        phone_number: impl Into<String>,
        postal_code: impl Into<String>,
        district: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            phone_number: phone_number.into(),
            postal_code: postal_code.into(),
            plus4: None,
            district: district.into(),
            state_district: None,
            county: None,
        }
    }
}

/// Representative metadata used for tag merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepInfo {
    pub title: String,
    pub long_title: String,
    pub district: String,
    pub first_name: String,
    pub last_name: String,
    pub official_name: String,
    pub phone_number: String,
}

/// District code → representative.
pub type Representatives = HashMap<String, RepInfo>;

/// Lifecycle of one campaign run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Built but never run.
    Initialized,
    /// A worker task is iterating the audience.
    Running,
    /// Cancelled at a recipient boundary; resumable.
    Stopped,
    /// Audience exhausted and final state persisted.
    Done,
    /// Audience exhausted but the final state could not be persisted.
    CompletedWithErrors,
}

impl Status {
    /// Check if a status allows transitioning to another.
    pub fn can_transition_to(&self, target: Status) -> bool {
        use Status::*;

        matches!(
            (self, target),
            (Initialized, Running)
                | (Running, Stopped)
                | (Running, Done)
                | (Running, CompletedWithErrors)
                | (Stopped, Running)
        )
    }

    /// Terminal runs can never be restarted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::CompletedWithErrors)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Done => "done",
            Self::CompletedWithErrors => "completed_with_errors",
        };
        write!(f, "{s}")
    }
}

/// Delivery counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub sent_to: usize,
    pub total_recipients: usize,
    pub errors: usize,
}

/// Durable, resumable progress record for one campaign.
///
/// `audience_pointer` is the index of the next unprocessed recipient and the
/// only resumption cursor. It never decreases and never exceeds the audience
/// length; `stats.sent_to + stats.errors` never exceeds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignState {
    pub id: Uuid,
    pub campaign: Campaign,
    pub status: Status,
    pub audience: Vec<CampaignTarget>,
    pub audience_pointer: usize,
    pub stats: CampaignStats,
}

impl CampaignState {
    /// A fresh, never-run state over a resolved audience.
    pub fn new(campaign: Campaign, audience: Vec<CampaignTarget>) -> Self {
        let total = audience.len();
        Self {
            id: Uuid::new_v4(),
            campaign,
            status: Status::Initialized,
            audience,
            audience_pointer: 0,
            stats: CampaignStats {
                sent_to: 0,
                total_recipients: total,
                errors: 0,
            },
        }
    }

    /// Recipients not yet processed.
    pub fn remaining(&self) -> usize {
        self.audience.len().saturating_sub(self.audience_pointer)
    }

    pub fn is_exhausted(&self) -> bool {
        self.audience_pointer >= self.audience.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        assert!(Status::Initialized.can_transition_to(Status::Running));
        assert!(Status::Running.can_transition_to(Status::Stopped));
        assert!(Status::Stopped.can_transition_to(Status::Running));
        assert!(Status::Running.can_transition_to(Status::CompletedWithErrors));
        assert!(!Status::Done.can_transition_to(Status::Running));
        assert!(!Status::CompletedWithErrors.can_transition_to(Status::Running));
        assert!(!Status::Initialized.can_transition_to(Status::Done));
    }

    #[test]
    fn terminal_statuses() {
        assert!(Status::Done.is_terminal());
        assert!(Status::CompletedWithErrors.is_terminal());
        assert!(!Status::Stopped.is_terminal());
        assert!(!Status::Running.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&Status::CompletedWithErrors).unwrap();
        assert_eq!(json, "\"completed_with_errors\"");
        assert_eq!(Status::Stopped.to_string(), "stopped");
    }

    #[test]
    fn new_state_counts_audience() {
        let audience = vec![
            CampaignTarget::new("7065550001", "30601", "GA-10"),
            CampaignTarget::new("7065550002", "30602", "GA-10"),
        ];
        let state = CampaignState::new(Campaign::new("c1", 7, "hi"), audience);
        assert_eq!(state.status, Status::Initialized);
        assert_eq!(state.stats.total_recipients, 2);
        assert_eq!(state.remaining(), 2);
        assert!(!state.is_exhausted());
    }

    #[test]
    fn blank_source_is_ignored() {
        let campaign = Campaign::new("c2", 1, "hi").cloned_from("  ", AudienceSelectionMode::Received);
        assert!(campaign.source().is_none());

        let campaign = Campaign::new("c3", 1, "hi").cloned_from("c2", AudienceSelectionMode::Received);
        assert_eq!(campaign.source().map(CampaignId::as_str), Some("c2"));
    }

    #[test]
    fn campaign_accepts_camel_case_payload() {
        let campaign: Campaign = serde_json::from_str(
            r#"{"id":"5a1","campaignId":42,"createdFrom":"4f0","audienceType":"NOT_RECEIVED","body":"Call {{targets.title}}"}"#,
        )
        .unwrap();
        assert_eq!(campaign.campaign_ref, 42);
        assert_eq!(campaign.audience_type, AudienceSelectionMode::NotReceived);
        assert_eq!(campaign.created_from, Some(CampaignId::from("4f0")));
    }
}
