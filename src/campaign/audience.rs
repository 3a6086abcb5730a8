//! Audience resolution for a new campaign run.

use tracing::info;

use super::model::{AudienceSelectionMode, Campaign, CampaignState, CampaignTarget};
use crate::error::{CampaignError, Error};
use crate::store::{AudienceSource, RecordStore};

/// Pick recipients out of a prior campaign's run.
///
/// `NotReceived` starts one past the source pointer, so the recipient the
/// source would have processed next is left out of both halves.
pub fn select_audience(source: &CampaignState, mode: AudienceSelectionMode) -> Vec<CampaignTarget> {
    let audience = &source.audience;
    let pointer = source.audience_pointer.min(audience.len());

    match mode {
        AudienceSelectionMode::Received => audience[..pointer].to_vec(),
        AudienceSelectionMode::NotReceived => audience
            .get(pointer + 1..)
            .map(<[CampaignTarget]>::to_vec)
            .unwrap_or_default(),
        AudienceSelectionMode::All => audience.clone(),
    }
}

/// Compute the ordered audience for `campaign`.
///
/// Without a (well-formed) source campaign this is the full current
/// subscriber list. With one, it is a slice of the source's saved audience;
/// a source that was never saved is an error.
pub async fn resolve_audience(
    campaign: &Campaign,
    store: &dyn RecordStore,
    source: &dyn AudienceSource,
) -> Result<Vec<CampaignTarget>, Error> {
    let Some(origin) = campaign.source() else {
        let subscribers = source.current_subscribers().await?;
        info!(campaign_id = %campaign.id, recipients = subscribers.len(), "Audience from current subscribers");
        return Ok(subscribers);
    };

    let prior = store
        .get_campaign_state(origin)
        .await?
        .ok_or_else(|| CampaignError::SourceNotFound { id: origin.clone() })?;

    let audience = select_audience(&prior, campaign.audience_type);
    info!(
        campaign_id = %campaign.id,
        source_id = %origin,
        mode = ?campaign.audience_type,
        recipients = audience.len(),
        "Audience derived from prior campaign"
    );
    Ok(audience)
}
