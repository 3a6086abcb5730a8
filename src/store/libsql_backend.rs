//! libSQL backend: async `RecordStore` implementation.
//!
//! Supports local file and in-memory databases. Nested documents (the
//! campaign definition, the audience, embedded approvers) are stored as JSON
//! columns next to the scalar fields queries filter on.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::approvals::{ApprovalRequest, Approver};
use crate::campaign::model::{CampaignId, CampaignState, CampaignStats, Status};
use crate::error::DatabaseError;
use crate::inbound::InboundMessage;
use crate::store::migrations;
use crate::store::traits::{MessageTemplate, RecordStore};

/// libSQL record store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
/// Read-modify-write transactions on that connection are serialized by
/// `writes`, since a connection holds at most one open transaction.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    writes: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        let (db, conn) = open_local(path).await?;
        let backend = Self {
            db: Arc::new(db),
            conn,
            writes: Mutex::new(()),
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Record store opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let (db, conn) = open_memory().await?;
        let backend = Self {
            db: Arc::new(db),
            conn,
            writes: Mutex::new(()),
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_approval(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<ApprovalRequest>, DatabaseError> {
        fetch_approval(self.conn(), sql, params).await
    }

    async fn begin(&self, op: &str) -> Result<libsql::Transaction, DatabaseError> {
        self.conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: begin: {e}")))
    }
}

/// Commit on success, roll back on failure.
async fn finish<T>(
    tx: libsql::Transaction,
    result: Result<T, DatabaseError>,
    op: &str,
) -> Result<T, DatabaseError> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| DatabaseError::Query(format!("{op}: commit: {e}")))?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(op, error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}

async fn fetch_approval(
    conn: &Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Option<ApprovalRequest>, DatabaseError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| DatabaseError::Query(format!("query approval: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("read approval: {e}")))?
    {
        Some(row) => Ok(Some(row_to_approval(&row)?)),
        None => Ok(None),
    }
}

async fn next_approval_version(conn: &Connection, campaign_ref: i64) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT COALESCE(MAX(version), 0) FROM approval_requests WHERE campaign_ref = ?1",
            params![campaign_ref],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("register_approval: {e}")))?;
    let current: i64 = match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("register_approval: {e}")))?
    {
        Some(row) => row.get(0).map_err(read_err)?,
        None => 0,
    };
    Ok(current + 1)
}

async fn insert_approval(conn: &Connection, stored: &ApprovalRequest) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO approval_requests
            (id, campaign_ref, version, body, requested_at, approved_on, approvers)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)
         ON CONFLICT(id) DO UPDATE SET
            campaign_ref = excluded.campaign_ref,
            version = excluded.version,
            body = excluded.body,
            requested_at = excluded.requested_at,
            approved_on = NULL,
            approvers = excluded.approvers",
        params![
            stored.id.as_str(),
            stored.campaign_ref,
            stored.version,
            stored.body.as_str(),
            stored.requested_at.to_rfc3339(),
            to_json(&stored.approvers)?,
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("register_approval: {e}")))?;
    Ok(())
}

/// Re-read the stored request and flag `approver` on that copy, so votes
/// landing between the caller's read and this write are kept.
async fn apply_vote(
    conn: &Connection,
    campaign_ref: i64,
    version: i64,
    approver: &Approver,
) -> Result<(), DatabaseError> {
    let mut current = fetch_approval(
        conn,
        &format!(
            "SELECT {APPROVAL_COLUMNS} FROM approval_requests
             WHERE campaign_ref = ?1 AND version = ?2"
        ),
        params![campaign_ref, version],
    )
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "approval_request".to_string(),
        id: format!("{campaign_ref} v{version}"),
    })?;
    current.record_vote(approver, Utc::now());

    conn.execute(
        "UPDATE approval_requests SET approved_on = ?1, approvers = ?2
         WHERE campaign_ref = ?3 AND version = ?4",
        params![
            opt_datetime(current.approved_on),
            to_json(&current.approvers)?,
            campaign_ref,
            version,
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("approve_campaign: {e}")))?;
    Ok(())
}

// ── Connection helpers ──────────────────────────────────────────────

/// Open a file-backed database, creating its parent directory.
pub(crate) async fn open_local(path: &Path) -> Result<(LibSqlDatabase, Connection), DatabaseError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            DatabaseError::Pool(format!("Failed to create database directory: {e}"))
        })?;
    }

    let db = libsql::Builder::new_local(path)
        .build()
        .await
        .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

    let conn = db
        .connect()
        .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
    Ok((db, conn))
}

pub(crate) async fn open_memory() -> Result<(LibSqlDatabase, Connection), DatabaseError> {
    let db = libsql::Builder::new_local(":memory:")
        .build()
        .await
        .map_err(|e| DatabaseError::Pool(format!("Failed to create in-memory database: {e}")))?;

    let conn = db
        .connect()
        .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
    Ok((db, conn))
}

// ── Row mapping ─────────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn status_to_str(status: Status) -> &'static str {
    match status {
        Status::Initialized => "initialized",
        Status::Running => "running",
        Status::Stopped => "stopped",
        Status::Done => "done",
        Status::CompletedWithErrors => "completed_with_errors",
    }
}

fn str_to_status(s: &str) -> Status {
    match s {
        "running" => Status::Running,
        "stopped" => Status::Stopped,
        "done" => Status::Done,
        "completed_with_errors" => Status::CompletedWithErrors,
        _ => Status::Initialized,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(s).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn read_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(format!("read row: {e}"))
}

/// Column order matches STATE_COLUMNS.
fn row_to_state(row: &libsql::Row) -> Result<CampaignState, DatabaseError> {
    let id: String = row.get(0).map_err(read_err)?;
    let status: String = row.get(1).map_err(read_err)?;
    let pointer: i64 = row.get(2).map_err(read_err)?;
    let sent_to: i64 = row.get(3).map_err(read_err)?;
    let total: i64 = row.get(4).map_err(read_err)?;
    let errors: i64 = row.get(5).map_err(read_err)?;
    let campaign: String = row.get(6).map_err(read_err)?;
    let audience: String = row.get(7).map_err(read_err)?;

    Ok(CampaignState {
        id: Uuid::parse_str(&id).map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        campaign: from_json(&campaign)?,
        status: str_to_status(&status),
        audience: from_json(&audience)?,
        audience_pointer: pointer.max(0) as usize,
        stats: CampaignStats {
            sent_to: sent_to.max(0) as usize,
            total_recipients: total.max(0) as usize,
            errors: errors.max(0) as usize,
        },
    })
}

/// Column order matches APPROVAL_COLUMNS.
fn row_to_approval(row: &libsql::Row) -> Result<ApprovalRequest, DatabaseError> {
    let requested_at: String = row.get(4).map_err(read_err)?;
    let approved_on: Option<String> = row.get(5).ok();
    let approvers: String = row.get(6).map_err(read_err)?;

    Ok(ApprovalRequest {
        id: row.get(0).map_err(read_err)?,
        campaign_ref: row.get(1).map_err(read_err)?,
        version: row.get(2).map_err(read_err)?,
        body: row.get(3).map_err(read_err)?,
        requested_at: parse_datetime(&requested_at),
        approved_on: approved_on.as_deref().map(parse_datetime),
        approvers: from_json(&approvers)?,
    })
}

fn row_to_template(row: &libsql::Row) -> Result<MessageTemplate, DatabaseError> {
    Ok(MessageTemplate {
        key: row.get(0).map_err(read_err)?,
        body: row.get(1).map_err(read_err)?,
        active: row.get::<i64>(2).map_err(read_err)? != 0,
    })
}

fn opt_datetime(dt: Option<DateTime<Utc>>) -> libsql::Value {
    match dt {
        Some(dt) => libsql::Value::Text(dt.to_rfc3339()),
        None => libsql::Value::Null,
    }
}

// ── Trait implementation ────────────────────────────────────────────

const STATE_COLUMNS: &str =
    "id, status, audience_pointer, sent_to, total_recipients, errors, campaign, audience";

const APPROVAL_COLUMNS: &str =
    "id, campaign_ref, version, body, requested_at, approved_on, approvers";

#[async_trait]
impl RecordStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Campaign state ──────────────────────────────────────────────

    async fn save_campaign_state(&self, state: &CampaignState) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO campaign_states
                    (id, campaign_id, status, audience_pointer, sent_to, total_recipients,
                     errors, campaign, audience, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    audience_pointer = excluded.audience_pointer,
                    sent_to = excluded.sent_to,
                    total_recipients = excluded.total_recipients,
                    errors = excluded.errors,
                    campaign = excluded.campaign,
                    audience = excluded.audience,
                    updated_at = excluded.updated_at",
                params![
                    state.id.to_string(),
                    state.campaign.id.as_str(),
                    status_to_str(state.status),
                    state.audience_pointer as i64,
                    state.stats.sent_to as i64,
                    state.stats.total_recipients as i64,
                    state.stats.errors as i64,
                    to_json(&state.campaign)?,
                    to_json(&state.audience)?,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_campaign_state: {e}")))?;

        debug!(
            campaign_id = %state.campaign.id,
            status = %state.status,
            pointer = state.audience_pointer,
            "Campaign state saved"
        );
        Ok(())
    }

    async fn get_campaign_state(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignState>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {STATE_COLUMNS} FROM campaign_states
                     WHERE campaign_id = ?1 ORDER BY updated_at DESC LIMIT 1"
                ),
                params![campaign_id.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_campaign_state: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_campaign_state: {e}")))?
        {
            Some(row) => Ok(Some(row_to_state(&row)?)),
            None => Ok(None),
        }
    }

    // ── Approvals ───────────────────────────────────────────────────

    async fn register_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalRequest, DatabaseError> {
        let mut stored = request.clone();
        stored.requested_at = Utc::now();
        stored.approved_on = None;
        for approver in &mut stored.approvers {
            approver.has_approved = false;
        }

        let _writes = self.writes.lock().await;
        let tx = self.begin("register_approval").await?;
        let result = async {
            stored.version = next_approval_version(&tx, stored.campaign_ref).await?;
            insert_approval(&tx, &stored).await
        }
        .await;
        finish(tx, result, "register_approval").await?;

        info!(
            request_id = %stored.id,
            campaign_ref = stored.campaign_ref,
            version = stored.version,
            "Approval request registered"
        );
        Ok(stored)
    }

    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>, DatabaseError> {
        self.query_approval(
            &format!("SELECT {APPROVAL_COLUMNS} FROM approval_requests WHERE id = ?1"),
            params![id],
        )
        .await
    }

    async fn get_most_recent_approval(
        &self,
        campaign_ref: i64,
    ) -> Result<Option<ApprovalRequest>, DatabaseError> {
        self.query_approval(
            &format!(
                "SELECT {APPROVAL_COLUMNS} FROM approval_requests
                 WHERE campaign_ref = ?1 ORDER BY version DESC LIMIT 1"
            ),
            params![campaign_ref],
        )
        .await
    }

    async fn approve_campaign(
        &self,
        request: &ApprovalRequest,
        approver: &Approver,
    ) -> Result<(), DatabaseError> {
        let _writes = self.writes.lock().await;
        let tx = self.begin("approve_campaign").await?;
        let result = apply_vote(&tx, request.campaign_ref, request.version, approver).await;
        finish(tx, result, "approve_campaign").await
    }

    // ── Lost and found ──────────────────────────────────────────────

    async fn stow_message(&self, message: &InboundMessage) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO lost_and_found (message_sid, account_sid, from_number, to_number, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.message_sid.as_str(),
                    message.account_sid.as_str(),
                    message.from.as_str(),
                    message.to.as_str(),
                    message.body.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("stow_message: {e}")))?;
        Ok(())
    }

    async fn stowed_messages(&self, limit: usize) -> Result<Vec<InboundMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT message_sid, account_sid, from_number, to_number, body
                 FROM lost_and_found ORDER BY id ASC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("stowed_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("stowed_messages: {e}")))?
        {
            messages.push(InboundMessage {
                message_sid: row.get(0).map_err(read_err)?,
                account_sid: row.get(1).map_err(read_err)?,
                from: row.get(2).map_err(read_err)?,
                to: row.get(3).map_err(read_err)?,
                body: row.get(4).map_err(read_err)?,
            });
        }
        Ok(messages)
    }

    // ── Message templates ───────────────────────────────────────────

    async fn get_message_template(
        &self,
        key: &str,
    ) -> Result<Option<MessageTemplate>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, body, active FROM message_templates WHERE key = ?1",
                params![key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_message_template: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_message_template: {e}")))?
        {
            Some(row) => Ok(Some(row_to_template(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_active_message_templates(&self) -> Result<Vec<MessageTemplate>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, body, active FROM message_templates WHERE active = 1 ORDER BY key",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_active_message_templates: {e}")))?;

        let mut templates = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_active_message_templates: {e}")))?
        {
            templates.push(row_to_template(&row)?);
        }
        Ok(templates)
    }

    async fn put_message_template(&self, template: &MessageTemplate) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO message_templates (key, body, active) VALUES (?1, ?2, ?3)",
                params![
                    template.key.as_str(),
                    template.body.as_str(),
                    template.active as i64
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("put_message_template: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::model::{Campaign, CampaignTarget};

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn state(campaign_id: &str) -> CampaignState {
        CampaignState::new(
            Campaign::new(campaign_id, 7, "Call {{targets.title}}"),
            vec![
                CampaignTarget::new("7065550001", "30601", "GA-10"),
                CampaignTarget::new("7065550002", "30602", "GA-09"),
            ],
        )
    }

    #[tokio::test]
    async fn campaign_state_round_trips_by_campaign_id() {
        let db = test_db().await;
        let mut saved = state("c1");
        saved.status = Status::Stopped;
        saved.audience_pointer = 1;
        saved.stats.sent_to = 1;
        db.save_campaign_state(&saved).await.unwrap();

        let loaded = db
            .get_campaign_state(&CampaignId::from("c1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, saved);

        assert!(
            db.get_campaign_state(&CampaignId::from("nope"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn save_overwrites_same_state() {
        let db = test_db().await;
        let mut saved = state("c1");
        db.save_campaign_state(&saved).await.unwrap();

        saved.status = Status::Done;
        saved.audience_pointer = 2;
        saved.stats.sent_to = 2;
        db.save_campaign_state(&saved).await.unwrap();

        let loaded = db
            .get_campaign_state(&CampaignId::from("c1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, Status::Done);
        assert_eq!(loaded.audience_pointer, 2);
    }

    #[tokio::test]
    async fn most_recent_approval_is_highest_version() {
        let db = test_db().await;
        let first = db
            .register_approval(&ApprovalRequest::new("r1", 42, "first draft"))
            .await
            .unwrap();
        let second = db
            .register_approval(&ApprovalRequest::new("r2", 42, "second draft"))
            .await
            .unwrap();
        db.register_approval(&ApprovalRequest::new("r3", 43, "other campaign"))
            .await
            .unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);

        let recent = db.get_most_recent_approval(42).await.unwrap().unwrap();
        assert_eq!(recent.id, "r2");
        assert_eq!(recent.body, "second draft");
        assert!(db.get_most_recent_approval(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn register_clears_prior_votes() {
        let db = test_db().await;
        let mut approver = Approver::new("a1", "Ann", "7067815146");
        approver.has_approved = true;
        let mut request = ApprovalRequest::new("r1", 42, "body").with_approver(approver);
        request.approved_on = Some(Utc::now());

        let stored = db.register_approval(&request).await.unwrap();
        assert!(stored.approved_on.is_none());
        assert!(!stored.approvers[0].has_approved);

        let loaded = db.get_approval("r1").await.unwrap().unwrap();
        assert_eq!(loaded.approvers.len(), 1);
        assert!(!loaded.approvers[0].has_approved);
    }

    #[tokio::test]
    async fn approve_marks_matching_approver() {
        let db = test_db().await;
        let request = ApprovalRequest::new("r1", 42, "body")
            .with_approver(Approver::new("a1", "Ann", "7067815146"))
            .with_approver(Approver::new("a2", "Bob", "7065550000"));
        let stored = db.register_approval(&request).await.unwrap();

        db.approve_campaign(&stored, &Approver::new("a1", "Ann", "7067815146"))
            .await
            .unwrap();

        let loaded = db.get_approval("r1").await.unwrap().unwrap();
        assert!(loaded.approved_on.is_some());
        assert!(loaded.approvers[0].has_approved);
        assert!(!loaded.approvers[1].has_approved);
    }

    #[tokio::test]
    async fn approve_appends_unlisted_approver() {
        let db = test_db().await;
        let stored = db
            .register_approval(&ApprovalRequest::new("r1", 42, "body"))
            .await
            .unwrap();

        db.approve_campaign(&stored, &Approver::new("a9", "Zed", "7060000000"))
            .await
            .unwrap();

        let loaded = db.get_approval("r1").await.unwrap().unwrap();
        assert_eq!(loaded.approvers.len(), 1);
        assert_eq!(loaded.approvers[0].id, "a9");
        assert!(loaded.approvers[0].has_approved);
    }

    #[tokio::test]
    async fn approve_unregistered_request_is_not_found() {
        let db = test_db().await;
        let err = db
            .approve_campaign(
                &ApprovalRequest::new("ghost", 1, "body"),
                &Approver::new("a1", "Ann", "7067815146"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));

        // The failed vote rolled back; the connection takes new work.
        let stored = db
            .register_approval(&ApprovalRequest::new("r1", 1, "body"))
            .await
            .unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn votes_from_stale_reads_are_both_kept() {
        let db = test_db().await;
        let request = ApprovalRequest::new("r1", 42, "body")
            .with_approver(Approver::new("a1", "Ann", "7067815146"))
            .with_approver(Approver::new("a2", "Bob", "7065550000"));
        db.register_approval(&request).await.unwrap();

        let first = db.get_most_recent_approval(42).await.unwrap().unwrap();
        let second = db.get_most_recent_approval(42).await.unwrap().unwrap();
        db.approve_campaign(&first, &Approver::new("a1", "Ann", "7067815146"))
            .await
            .unwrap();
        db.approve_campaign(&second, &Approver::new("a2", "Bob", "7065550000"))
            .await
            .unwrap();

        let loaded = db.get_approval("r1").await.unwrap().unwrap();
        assert!(loaded.approvers[0].has_approved, "Ann's vote must survive");
        assert!(loaded.approvers[1].has_approved);
        assert!(loaded.approved_on.is_some());
    }

    #[tokio::test]
    async fn concurrent_votes_are_both_kept() {
        let db = Arc::new(test_db().await);
        let request = ApprovalRequest::new("r1", 42, "body")
            .with_approver(Approver::new("a1", "Ann", "7067815146"))
            .with_approver(Approver::new("a2", "Bob", "7065550000"));
        let stored = db.register_approval(&request).await.unwrap();

        let ann = Approver::new("a1", "Ann", "7067815146");
        let bob = Approver::new("a2", "Bob", "7065550000");
        let (a, b) = tokio::join!(
            db.approve_campaign(&stored, &ann),
            db.approve_campaign(&stored, &bob),
        );
        a.unwrap();
        b.unwrap();

        let loaded = db.get_approval("r1").await.unwrap().unwrap();
        assert!(loaded.approvers.iter().all(|a| a.has_approved));
    }

    #[tokio::test]
    async fn concurrent_registrations_get_distinct_versions() {
        let db = Arc::new(test_db().await);
        let first = ApprovalRequest::new("r1", 42, "first draft");
        let second = ApprovalRequest::new("r2", 42, "second draft");
        let (a, b) = tokio::join!(db.register_approval(&first), db.register_approval(&second));

        let mut versions = vec![a.unwrap().version, b.unwrap().version];
        versions.sort();
        assert_eq!(versions, vec![1, 2]);
    }

    #[tokio::test]
    async fn stowed_messages_kept_in_order() {
        let db = test_db().await;
        for body in ["what?", "hello"] {
            db.stow_message(&InboundMessage {
                message_sid: "SM1".into(),
                account_sid: "AC1".into(),
                from: "7067815146".into(),
                to: "7065550000".into(),
                body: body.into(),
            })
            .await
            .unwrap();
        }

        let stowed = db.stowed_messages(10).await.unwrap();
        assert_eq!(
            stowed.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(),
            vec!["what?", "hello"]
        );
    }

    #[tokio::test]
    async fn templates_by_key_and_active() {
        let db = test_db().await;
        db.put_message_template(&MessageTemplate {
            key: "retired".into(),
            body: "old".into(),
            active: false,
        })
        .await
        .unwrap();

        let intro = db.get_message_template("intro-sms").await.unwrap().unwrap();
        assert!(intro.active);
        assert!(db.get_message_template("missing").await.unwrap().is_none());

        let active = db.get_active_message_templates().await.unwrap();
        assert!(active.iter().all(|t| t.active));
        assert!(!active.iter().any(|t| t.key == "retired"));
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("texter.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.save_campaign_state(&state("c1")).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(
            db.get_campaign_state(&CampaignId::from("c1"))
                .await
                .unwrap()
                .is_some()
        );
    }
}
