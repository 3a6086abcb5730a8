//! Approver lookup for an inbound approval vote.

use tracing::{debug, warn};

use super::{ApprovalRequest, Approver};
use crate::error::ApprovalError;
use crate::external::ExternalCampaignSystem;
use crate::phone::{normalize_phone, same_phone};

/// Find the approver who owns `phone`.
///
/// The live roster from the campaign system wins; when that call fails or
/// comes back empty the approvers embedded in `request` are searched instead.
pub async fn find_approver(
    api: &dyn ExternalCampaignSystem,
    phone: &str,
    request: &ApprovalRequest,
) -> Result<Approver, ApprovalError> {
    let roster = match api.get_all_approvers().await {
        Ok(live) if !live.is_empty() => live,
        Ok(_) => {
            debug!(request_id = %request.id, "Live approver roster empty, using request roster");
            request.approvers.clone()
        }
        Err(e) => {
            warn!(request_id = %request.id, error = %e, "Approver roster unavailable, using request roster");
            request.approvers.clone()
        }
    };

    roster
        .into_iter()
        .find(|a| same_phone(&a.phone_number, phone))
        .ok_or_else(|| ApprovalError::ApproverNotFound {
            phone: normalize_phone(phone),
        })
}
