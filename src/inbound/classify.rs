//! Keyword classification of inbound reply bodies.

use std::sync::LazyLock;

use regex::Regex;

static APPROVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9]+)\s*$").expect("valid approval regex"));

static SUBSCRIBE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(START|YES|UNSTOP)\s*$").expect("valid start regex"));

static UNSUBSCRIBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(STOP|STOPALL|UNSUBSCRIBE|CANCEL|END|QUIT)\s*$")
        .expect("valid stop regex")
});

/// What an inbound reply asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundIntent {
    /// A vote approving the campaign with this external reference.
    Approval { campaign_ref: i64 },
    Subscribe,
    Unsubscribe,
    /// Nothing recognized; the message goes to lost-and-found.
    Unclassified,
}

/// Classify a reply body. The whole body must match; first match wins.
pub fn classify(body: &str) -> InboundIntent {
    if let Some(caps) = APPROVAL.captures(body) {
        // A reference too large for i64 cannot name a campaign.
        return match caps[1].parse() {
            Ok(campaign_ref) => InboundIntent::Approval { campaign_ref },
            Err(_) => InboundIntent::Unclassified,
        };
    }
    if SUBSCRIBE.is_match(body) {
        return InboundIntent::Subscribe;
    }
    if UNSUBSCRIBE.is_match(body) {
        return InboundIntent::Unsubscribe;
    }
    InboundIntent::Unclassified
}
