//! Campaign control and test sends.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::messages::delivered;
use super::{ApiError, AppState};
use crate::campaign::{Campaign, CampaignId};
use crate::sms::Message;

/// Start or resume a campaign.
pub async fn start_campaign(
    State(state): State<AppState>,
    payload: Result<Json<Campaign>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(campaign) = payload?;
    if !campaign.id.is_valid() {
        return Err(ApiError::bad_request("campaign id must not be blank"));
    }
    state.manager.start(campaign).await?;
    Ok(StatusCode::OK)
}

pub async fn stop_campaign(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.manager.stop(&CampaignId::new(id)).await;
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct TestMessage {
    #[serde(alias = "phoneNumber", alias = "PhoneNumber")]
    pub phone_number: String,
    #[serde(
        default,
        alias = "postalCode",
        alias = "zip_code",
        alias = "zipCode",
        alias = "ZipCode"
    )]
    pub postal_code: String,
    #[serde(alias = "Body")]
    pub body: String,
}

/// Send one campaign body to a single phone, guessing the representative
/// from the postal code.
pub async fn test_campaign(
    State(state): State<AppState>,
    payload: Result<Json<TestMessage>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(test) = payload?;

    let rep = match state.source.district_for_postal_code(&test.postal_code).await {
        Ok(Some(district)) => {
            let mut reps = state.source.representatives().await?;
            reps.remove(&district)
        }
        Ok(None) => {
            info!(postal_code = %test.postal_code, "No district for postal code");
            None
        }
        Err(e) => {
            warn!(postal_code = %test.postal_code, error = %e, "District lookup failed");
            None
        }
    };

    let body = state.deps.merger.merge(&test.body, rep.as_ref());
    let message = Message::new(&test.phone_number, &state.deps.config.from_number, body);
    let status = state.deps.transport.send(&message).await?;
    Ok(delivered(status))
}
