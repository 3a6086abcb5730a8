//! Health, one-off sends, approval requests, and the inbound webhook.

use axum::{
    Json,
    extract::{Form, Path, State, rejection::FormRejection, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::approvals::ApprovalRequest;
use crate::error::DatabaseError;
use crate::inbound::InboundMessage;
use crate::phone::normalize_phone;
use crate::sms::Message;
use crate::store::{MessageTemplate, RecordStore};

pub const INTRO_TEMPLATE: &str = "intro-sms";
pub const APPROVAL_TEMPLATE: &str = "approval-sms";

/// Map a transport status onto the response status.
pub(super) fn delivered(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}

pub async fn status() -> impl IntoResponse {
    Json(serde_json::json!({ "gtg": true }))
}

/// Provider webhook. Acknowledged with 201 whatever the body; routing runs
/// in the background.
pub async fn incoming(
    State(state): State<AppState>,
    payload: Result<Form<InboundMessage>, FormRejection>,
) -> StatusCode {
    match payload {
        Ok(Form(message)) => {
            let message = message.normalized();
            debug!(from = %message.from, sid = %message.message_sid, "Inbound message received");
            let router = state.inbound.clone();
            tokio::spawn(async move { router.handle(message).await });
        }
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Unable to decode inbound message");
        }
    }
    StatusCode::CREATED
}

/// One recipient with a body to merge against their district's representative.
#[derive(Debug, Deserialize)]
pub struct Target {
    #[serde(alias = "phoneNumber", alias = "PhoneNumber")]
    pub phone_number: String,
    #[serde(default, alias = "usDistrict", alias = "USDistrict", alias = "us_district")]
    pub district: String,
    #[serde(alias = "Body")]
    pub body: String,
}

pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<Target>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(target) = payload?;

    let reps = state.source.representatives().await?;
    let rep = reps.get(&target.district);
    if rep.is_none() {
        info!(district = %target.district, "No representative for district");
    }

    let body = state.deps.merger.merge(&target.body, rep);
    let message = Message::new(&target.phone_number, &state.deps.config.from_number, body);
    let status = state.deps.transport.send(&message).await?;
    Ok(delivered(status))
}

#[derive(Debug, Deserialize)]
pub struct Recipient {
    #[serde(alias = "phoneNumber", alias = "PhoneNumber")]
    pub phone_number: String,
}

/// Send the welcome text to a new subscriber.
pub async fn send_intro(
    State(state): State<AppState>,
    payload: Result<Json<Recipient>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(recipient) = payload?;
    let template = template(state.deps.store.as_ref(), INTRO_TEMPLATE).await?;

    let message = Message::new(
        &recipient.phone_number,
        &state.deps.config.from_number,
        template.body,
    );
    let status = state.deps.transport.send(&message).await?;
    Ok(delivered(status))
}

/// Text every approver the approval body and register the request.
///
/// Fails with 400 when not a single approver could be reached.
pub async fn request_approval(
    State(state): State<AppState>,
    Path(campaign_ref): Path<String>,
    payload: Result<Json<ApprovalRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(mut request) = payload?;
    let campaign_ref: i64 = campaign_ref
        .trim()
        .parse()
        .map_err(|e| {
            ApiError::bad_request(format!("invalid campaign reference {campaign_ref:?}: {e}"))
        })?;

    let template = template(state.deps.store.as_ref(), APPROVAL_TEMPLATE).await?;
    let reference = campaign_ref.to_string();
    let body = fill_verbs(&template.body, &[request.body.as_str(), reference.as_str()]);

    let mut failures = Vec::new();
    for approver in &mut request.approvers {
        approver.phone_number = normalize_phone(&approver.phone_number);
        let message = Message::new(
            &approver.phone_number,
            &state.deps.config.from_number,
            body.as_str(),
        );
        if let Err(e) = state.deps.transport.send(&message).await {
            warn!(campaign_ref, approver_id = %approver.id, error = %e, "Approval text failed");
            failures.push(e);
        }
    }

    if failures.len() == request.approvers.len() {
        return Err(ApiError::collected(&failures));
    }

    request.campaign_ref = campaign_ref;
    if request.id.trim().is_empty() {
        request.id = Uuid::new_v4().to_string();
    }
    let registered = state.deps.store.register_approval(&request).await?;
    info!(
        campaign_ref,
        id = %registered.id,
        version = registered.version,
        approvers = registered.approvers.len(),
        "Approval requested"
    );
    Ok(StatusCode::ACCEPTED)
}

async fn template(store: &dyn RecordStore, key: &str) -> Result<MessageTemplate, DatabaseError> {
    store
        .get_message_template(key)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "message_template".to_string(),
            id: key.to_string(),
        })
}

/// Replace `%s` / `%v` verbs left to right with `values`. Extra verbs are
/// left untouched.
fn fill_verbs(template: &str, values: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut values = values.iter();
    let mut rest = template;

    while let Some(at) = rest.find('%') {
        let verb = rest[at..].chars().nth(1);
        match verb {
            Some('s') | Some('v') => match values.next() {
                Some(value) => {
                    out.push_str(&rest[..at]);
                    out.push_str(value);
                    rest = &rest[at + 2..];
                }
                None => break,
            },
            _ => {
                let step = at + 1;
                out.push_str(&rest[..step]);
                rest = &rest[step..];
            }
        }
    }
    out.push_str(rest);
    out
}
