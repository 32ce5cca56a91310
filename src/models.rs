//! Data models shared across the pipeline.
//!
//! This module defines the structures flowing between the three stages:
//! - [`HeadlineRecord`]: one cleaned (title, link) pair from the feed
//! - [`ModelAttempt`] / [`PromptVariant`]: one candidate call in the
//!   summarization fallback chain
//! - [`Snapshot`]: the latest-run output persisted for the read-only web view

use serde::{Deserialize, Serialize};

/// Separator between a headline and its trailing source attribution
/// (e.g. `"Quake shakes Hualien - Central News Agency"`).
pub const TITLE_ATTRIBUTION_SEPARATOR: &str = " - ";

/// Links longer than this are rejected by the push transport, so they are
/// replaced with [`FALLBACK_LINK`] at construction time.
pub const MAX_LINK_LEN: usize = 990;

/// Canonical destination used when a feed link exceeds [`MAX_LINK_LEN`].
pub const FALLBACK_LINK: &str = "https://news.google.com/";

/// One cleaned headline as consumed by every downstream stage.
///
/// Records are built once per feed item via [`HeadlineRecord::from_feed`] and
/// never mutated afterward. The constructor enforces both invariants: the
/// title carries no trailing source attribution, and the link fits the push
/// transport's length limit.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HeadlineRecord {
    /// Headline text with any `" - Source"` suffix stripped.
    pub title: String,
    /// Article URL, or [`FALLBACK_LINK`] if the feed link was oversized.
    pub link: String,
}

impl HeadlineRecord {
    /// Build a record from a raw feed item, applying both cleaning rules.
    pub fn from_feed(title: &str, link: &str) -> Self {
        let title = match title.split_once(TITLE_ATTRIBUTION_SEPARATOR) {
            Some((head, _attribution)) => head.to_string(),
            None => title.to_string(),
        };
        let link = if link.len() > MAX_LINK_LEN {
            FALLBACK_LINK.to_string()
        } else {
            link.to_string()
        };
        Self { title, link }
    }
}

/// Which prompt the attempt sends to the generation service.
///
/// `Sectioned` is the full instruction set (bracketed section headers, length
/// target); `Plain` is the degraded variant used by later fallback tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Sectioned,
    Plain,
}

/// One candidate call in the summarization fallback chain.
///
/// Attempts are tried strictly in list order; the first success terminates
/// the chain. Adding, removing, or reordering tiers is a data change to the
/// default chain in [`crate::api`], not a control-flow change.
#[derive(Debug, Clone, Copy)]
pub struct ModelAttempt {
    /// Generation service model identifier.
    pub model: &'static str,
    /// Prompt variant paired with this tier.
    pub prompt: PromptVariant,
    /// Disable the service's default content-moderation blocking for this
    /// attempt. Used to keep benign news content from being refused.
    pub relax_safety: bool,
}

/// The persisted latest-run output, overwritten on every successful run.
#[derive(Debug, Deserialize, Serialize)]
pub struct Snapshot {
    /// Local-time timestamp (`%Y-%m-%d %H:%M`, fixed UTC+8).
    pub updated_at: String,
    /// Narrated summary, or a human-readable sentinel if generation failed.
    pub summary: String,
    /// The headlines of this run, in feed order.
    pub news: Vec<HeadlineRecord>,
}
