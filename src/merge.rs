//! Template tag merging.
//!
//! Bodies carry `{{ tag }}` placeholders that are filled from the recipient's
//! representative. Merging never fails: anything that cannot be filled is
//! replaced by a sentinel so raw tag syntax never reaches a phone.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::campaign::model::RepInfo;

/// Replacement for a tag the merger does not know.
pub const UNKNOWN_TAG: &str = "unknown-tag";

/// Replacement for a known tag when no representative is available.
pub const UNKNOWN_REPRESENTATIVE: &str = "unknown-representative";

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[\w|\s.\-]*\}\}").expect("valid tag regex"));

/// Fills template tags in a message body.
pub trait TemplateMerger: Send + Sync {
    fn merge(&self, body: &str, rep: Option<&RepInfo>) -> String;
}

type Accessor = fn(&RepInfo) -> &str;

fn long_title(r: &RepInfo) -> &str {
    &r.long_title
}

fn official_name(r: &RepInfo) -> &str {
    &r.official_name
}

fn phone_number(r: &RepInfo) -> &str {
    &r.phone_number
}

fn last_name(r: &RepInfo) -> &str {
    &r.last_name
}

fn title(r: &RepInfo) -> &str {
    &r.title
}

/// Tag name (normalized) → representative field.
const CONGRESS_TAGS: &[(&str, Accessor)] = &[
    ("{{targets.title}}", long_title),
    ("{{targets.full_name}}", official_name),
    ("{{targets.phone}}", phone_number),
    ("{{targets.last_name}}", last_name),
    ("{{targets.short_title}}", title),
];

/// Merger for the congressional `targets.*` tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct CongressTagMerger;

impl CongressTagMerger {
    fn lookup(tag: &str) -> Option<Accessor> {
        let key = normalize_tag(tag);
        CONGRESS_TAGS
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, accessor)| *accessor)
    }
}

/// Strip whitespace and lowercase, so `{{ Targets.Title }}` matches.
fn normalize_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl TemplateMerger for CongressTagMerger {
    fn merge(&self, body: &str, rep: Option<&RepInfo>) -> String {
        TAG.replace_all(body, |caps: &Captures<'_>| {
            match (Self::lookup(&caps[0]), rep) {
                (None, _) => UNKNOWN_TAG.to_string(),
                (Some(_), None) => UNKNOWN_REPRESENTATIVE.to_string(),
                (Some(field), Some(rep)) => field(rep).to_string(),
            }
        })
        .into_owned()
    }
}
