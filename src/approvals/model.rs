//! Approval data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phone::same_phone;

/// A person allowed to approve campaign content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "phoneNumber")]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    /// Scoped to the approval request this record is embedded in.
    #[serde(default, alias = "hasApproved")]
    pub has_approved: bool,
}

impl Approver {
    pub fn new(id: impl Into<String>, name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone_number: phone_number.into(),
            email: String::new(),
            has_approved: false,
        }
    }
}

/// One version of a campaign's content put up for approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    #[serde(default, alias = "_id")]
    pub id: String,
    /// External campaign reference this request belongs to.
    #[serde(default, alias = "campaignId", alias = "campaignID")]
    pub campaign_ref: i64,
    pub body: String,
    /// Assigned by the record store on registration; highest is most recent.
    #[serde(default)]
    pub version: i64,
    #[serde(default = "Utc::now", alias = "requestedAt")]
    pub requested_at: DateTime<Utc>,
    #[serde(default, alias = "approvedOn")]
    pub approved_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approvers: Vec<Approver>,
}

impl ApprovalRequest {
    pub fn new(id: impl Into<String>, campaign_ref: i64, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            campaign_ref,
            body: body.into(),
            version: 0,
            requested_at: Utc::now(),
            approved_on: None,
            approvers: Vec::new(),
        }
    }

    pub fn with_approver(mut self, approver: Approver) -> Self {
        self.approvers.push(approver);
        self
    }

    /// Record `approver`'s vote on this request.
    ///
    /// The matching embedded approver (by normalized phone) is flagged; an
    /// approver not yet on the request is appended already flagged.
    pub fn record_vote(&mut self, approver: &Approver, at: DateTime<Utc>) {
        self.approved_on = Some(at);

        if let Some(existing) = self
            .approvers
            .iter_mut()
            .find(|a| same_phone(&a.phone_number, &approver.phone_number))
        {
            existing.has_approved = true;
            return;
        }

        let mut added = approver.clone();
        added.has_approved = true;
        self.approvers.push(added);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_flags_existing_approver() {
        let mut request = ApprovalRequest::new("r1", 42, "body")
            .with_approver(Approver::new("a1", "Ann", "7067815146"))
            .with_approver(Approver::new("a2", "Bob", "7065550000"));

        let voter = Approver::new("a1", "Ann", "+1 (706) 781-5146");
        request.record_vote(&voter, Utc::now());

        assert!(request.approved_on.is_some());
        assert_eq!(request.approvers.len(), 2);
        assert!(request.approvers[0].has_approved);
        assert!(!request.approvers[1].has_approved);
    }

    #[test]
    fn vote_appends_unknown_approver() {
        let mut request = ApprovalRequest::new("r1", 42, "body");
        request.record_vote(&Approver::new("a9", "Zed", "7060000000"), Utc::now());

        assert_eq!(request.approvers.len(), 1);
        assert!(request.approvers[0].has_approved);
    }
}
