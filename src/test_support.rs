//! Hand-written stubs of the collaborator traits for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::approvals::{ApprovalRequest, Approver};
use crate::campaign::model::{
    Campaign, CampaignId, CampaignState, CampaignTarget, RepInfo, Representatives,
};
use crate::campaign::worker::CampaignDeps;
use crate::config::CampaignConfig;
use crate::error::{DatabaseError, ExternalError, SourceError, TransportError};
use crate::external::{CampaignSystemStatus, ExternalCampaignSystem};
use crate::inbound::InboundMessage;
use crate::merge::CongressTagMerger;
use crate::sms::{Message, MessageTransport};
use crate::store::{AudienceSource, LibSqlBackend, MessageTemplate, RecordStore};

pub const FROM_NUMBER: &str = "7065550000";

/// A recipient in district GA-10.
pub fn target(phone: &str) -> CampaignTarget {
    CampaignTarget::new(phone, "30601", "GA-10")
}

/// GA-10 → Rep. Hice.
pub fn reps() -> Representatives {
    let mut reps = Representatives::new();
    reps.insert(
        "GA-10".to_string(),
        RepInfo {
            title: "Rep.".into(),
            long_title: "Representative".into(),
            district: "GA-10".into(),
            first_name: "Jody".into(),
            last_name: "Hice".into(),
            official_name: "Jody B. Hice".into(),
            phone_number: "2022254101".into(),
        },
    );
    reps
}

pub async fn test_store() -> Arc<LibSqlBackend> {
    Arc::new(LibSqlBackend::new_memory().await.unwrap())
}

/// Campaign dependencies with no throttle.
pub fn deps(
    transport: Arc<dyn MessageTransport>,
    store: Arc<dyn RecordStore>,
    api: Arc<dyn ExternalCampaignSystem>,
) -> CampaignDeps {
    CampaignDeps {
        transport,
        merger: Arc::new(CongressTagMerger),
        store,
        api,
        config: CampaignConfig {
            throttle: Duration::ZERO,
            from_number: FROM_NUMBER.to_string(),
        },
    }
}

// ── Transports ──────────────────────────────────────────────────────

/// Records every message; fails for configured recipients.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Message>>,
    fail_to: HashSet<String>,
}

impl RecordingTransport {
    pub fn failing_for(phones: &[&str]) -> Self {
        Self {
            sent: Mutex::default(),
            fail_to: phones.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, message: &Message) -> Result<u16, TransportError> {
        if self.fail_to.contains(&message.to) {
            return Err(TransportError::RateLimited);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(201)
    }
}

/// Pauses inside the `n`th send call (1-based) until released.
pub struct GateTransport {
    pause_on: usize,
    calls: AtomicUsize,
    paused: Notify,
    released: Notify,
    sent: Mutex<Vec<Message>>,
}

impl GateTransport {
    pub fn pause_on(n: usize) -> Self {
        Self {
            pause_on: n,
            calls: AtomicUsize::new(0),
            paused: Notify::new(),
            released: Notify::new(),
            sent: Mutex::default(),
        }
    }

    /// Resolves once the gated send has started.
    pub async fn wait_paused(&self) {
        self.paused.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageTransport for GateTransport {
    async fn send(&self, message: &Message) -> Result<u16, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.pause_on {
            self.paused.notify_one();
            self.released.notified().await;
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(201)
    }
}

// ── Audience ────────────────────────────────────────────────────────

pub struct StubAudience {
    subscribers: Vec<CampaignTarget>,
    reps: Representatives,
    emails: HashMap<String, Vec<String>>,
    fail: bool,
    subscriber_fetches: AtomicUsize,
    representative_fetches: AtomicUsize,
}

impl Default for StubAudience {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            reps: reps(),
            emails: HashMap::new(),
            fail: false,
            subscriber_fetches: AtomicUsize::new(0),
            representative_fetches: AtomicUsize::new(0),
        }
    }
}

impl StubAudience {
    pub fn with_subscribers(subscribers: Vec<CampaignTarget>) -> Self {
        Self {
            subscribers,
            ..Self::default()
        }
    }

    /// Every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_emails(mut self, phone: &str, emails: &[&str]) -> Self {
        self.emails.insert(
            phone.to_string(),
            emails.iter().map(|e| e.to_string()).collect(),
        );
        self
    }

    pub fn subscriber_fetches(&self) -> usize {
        self.subscriber_fetches.load(Ordering::SeqCst)
    }

    pub fn representative_fetches(&self) -> usize {
        self.representative_fetches.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.fail {
            Err(SourceError::Unavailable("audience offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AudienceSource for StubAudience {
    async fn current_subscribers(&self) -> Result<Vec<CampaignTarget>, SourceError> {
        self.subscriber_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        // Widen the race window for concurrent starts.
        tokio::task::yield_now().await;
        Ok(self.subscribers.clone())
    }

    async fn representatives(&self) -> Result<Representatives, SourceError> {
        self.representative_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.reps.clone())
    }

    async fn district_for_postal_code(
        &self,
        postal_code: &str,
    ) -> Result<Option<String>, SourceError> {
        self.check()?;
        Ok((postal_code == "30601").then(|| "GA-10".to_string()))
    }

    async fn emails_for_phone(&self, phone: &str) -> Result<Vec<String>, SourceError> {
        self.check()?;
        Ok(self.emails.get(phone).cloned().unwrap_or_default())
    }
}

// ── Campaign system ─────────────────────────────────────────────────

#[derive(Default)]
pub struct StubCampaignSystem {
    roster: Vec<Approver>,
    roster_fails: bool,
    unreachable: bool,
    completed: Mutex<Vec<(CampaignSystemStatus, String)>>,
    approvals: Mutex<Vec<(String, String)>>,
    subscribed: Mutex<Vec<String>>,
    unsubscribed: Mutex<Vec<String>>,
}

impl StubCampaignSystem {
    pub fn with_roster(roster: Vec<Approver>) -> Self {
        Self {
            roster,
            ..Self::default()
        }
    }

    pub fn failing_roster() -> Self {
        Self {
            roster_fails: true,
            ..Self::default()
        }
    }

    /// Every call fails.
    pub fn unreachable() -> Self {
        Self {
            roster_fails: true,
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn completed(&self) -> Vec<(CampaignSystemStatus, String)> {
        self.completed.lock().unwrap().clone()
    }

    /// `(request id, approver id)` pairs.
    pub fn approvals(&self) -> Vec<(String, String)> {
        self.approvals.lock().unwrap().clone()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().clone()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().unwrap().clone()
    }

    fn check(&self, endpoint: &str) -> Result<(), ExternalError> {
        if self.unreachable {
            Err(ExternalError::RequestFailed {
                endpoint: endpoint.to_string(),
                reason: "connection refused".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ExternalCampaignSystem for StubCampaignSystem {
    async fn campaign_completed(
        &self,
        status: CampaignSystemStatus,
        campaign: &Campaign,
    ) -> Result<(), ExternalError> {
        self.check("/campaigns")?;
        self.completed
            .lock()
            .unwrap()
            .push((status, campaign.id.to_string()));
        Ok(())
    }

    async fn get_all_approvers(&self) -> Result<Vec<Approver>, ExternalError> {
        if self.roster_fails {
            return Err(ExternalError::Status {
                endpoint: "/approvers".into(),
                status: 503,
            });
        }
        Ok(self.roster.clone())
    }

    async fn approve_campaign(
        &self,
        request: &ApprovalRequest,
        approver: &Approver,
    ) -> Result<(), ExternalError> {
        self.check("/campaigns")?;
        self.approvals
            .lock()
            .unwrap()
            .push((request.id.clone(), approver.id.clone()));
        Ok(())
    }

    async fn subscribe(&self, emails: &[String]) -> Result<(), ExternalError> {
        self.check("/users/subscriptions")?;
        self.subscribed.lock().unwrap().extend_from_slice(emails);
        Ok(())
    }

    async fn unsubscribe(&self, emails: &[String]) -> Result<(), ExternalError> {
        self.check("/users/subscriptions")?;
        self.unsubscribed.lock().unwrap().extend_from_slice(emails);
        Ok(())
    }
}

// ── Record store ────────────────────────────────────────────────────

/// Record store whose every call fails.
pub struct FailingStore;

fn offline() -> DatabaseError {
    DatabaseError::Query("store offline".into())
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        Err(offline())
    }

    async fn save_campaign_state(&self, _state: &CampaignState) -> Result<(), DatabaseError> {
        Err(offline())
    }

    async fn get_campaign_state(
        &self,
        _campaign_id: &CampaignId,
    ) -> Result<Option<CampaignState>, DatabaseError> {
        Err(offline())
    }

    async fn register_approval(
        &self,
        _request: &ApprovalRequest,
    ) -> Result<ApprovalRequest, DatabaseError> {
        Err(offline())
    }

    async fn get_approval(&self, _id: &str) -> Result<Option<ApprovalRequest>, DatabaseError> {
        Err(offline())
    }

    async fn get_most_recent_approval(
        &self,
        _campaign_ref: i64,
    ) -> Result<Option<ApprovalRequest>, DatabaseError> {
        Err(offline())
    }

    async fn approve_campaign(
        &self,
        _request: &ApprovalRequest,
        _approver: &Approver,
    ) -> Result<(), DatabaseError> {
        Err(offline())
    }

    async fn stow_message(&self, _message: &InboundMessage) -> Result<(), DatabaseError> {
        Err(offline())
    }

    async fn stowed_messages(&self, _limit: usize) -> Result<Vec<InboundMessage>, DatabaseError> {
        Err(offline())
    }

    async fn get_message_template(
        &self,
        _key: &str,
    ) -> Result<Option<MessageTemplate>, DatabaseError> {
        Err(offline())
    }

    async fn get_active_message_templates(&self) -> Result<Vec<MessageTemplate>, DatabaseError> {
        Err(offline())
    }

    async fn put_message_template(&self, _template: &MessageTemplate) -> Result<(), DatabaseError> {
        Err(offline())
    }
}

/// Record store that keeps everything in `inner` but refuses to record votes.
pub struct VoteRefusingStore {
    pub inner: Arc<LibSqlBackend>,
}

#[async_trait]
impl RecordStore for VoteRefusingStore {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.inner.run_migrations().await
    }

    async fn save_campaign_state(&self, state: &CampaignState) -> Result<(), DatabaseError> {
        self.inner.save_campaign_state(state).await
    }

    async fn get_campaign_state(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignState>, DatabaseError> {
        self.inner.get_campaign_state(campaign_id).await
    }

    async fn register_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalRequest, DatabaseError> {
        self.inner.register_approval(request).await
    }

    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>, DatabaseError> {
        self.inner.get_approval(id).await
    }

    async fn get_most_recent_approval(
        &self,
        campaign_ref: i64,
    ) -> Result<Option<ApprovalRequest>, DatabaseError> {
        self.inner.get_most_recent_approval(campaign_ref).await
    }

    async fn approve_campaign(
        &self,
        _request: &ApprovalRequest,
        _approver: &Approver,
    ) -> Result<(), DatabaseError> {
        Err(offline())
    }

    async fn stow_message(&self, message: &InboundMessage) -> Result<(), DatabaseError> {
        self.inner.stow_message(message).await
    }

    async fn stowed_messages(&self, limit: usize) -> Result<Vec<InboundMessage>, DatabaseError> {
        self.inner.stowed_messages(limit).await
    }

    async fn get_message_template(
        &self,
        key: &str,
    ) -> Result<Option<MessageTemplate>, DatabaseError> {
        self.inner.get_message_template(key).await
    }

    async fn get_active_message_templates(&self) -> Result<Vec<MessageTemplate>, DatabaseError> {
        self.inner.get_active_message_templates().await
    }

    async fn put_message_template(&self, template: &MessageTemplate) -> Result<(), DatabaseError> {
        self.inner.put_message_template(template).await
    }
}
