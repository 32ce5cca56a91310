//! Utility functions for time bucketing and log formatting.
//!
//! The briefing is written for a recipient in a fixed UTC+8 locale, so every
//! user-visible timestamp and the greeting bucket are computed against that
//! offset rather than the host timezone. Scheduled runners (CI cron, etc.)
//! are usually UTC; relying on the system clock's zone would shift the
//! greeting by a full bucket.

use chrono::{DateTime, FixedOffset, Utc};

/// The recipient's civil-time offset (UTC+8). Fixed by contract, not read
/// from the environment.
pub fn local_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

/// Current wall-clock time in the recipient's locale.
pub fn local_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&local_offset())
}

/// Classify a local civil hour into the briefing greeting.
///
/// - `[5, 12)` → `"Good morning"`
/// - `[12, 18)` → `"Good afternoon"`
/// - otherwise → `"Good evening"`
///
/// Boundary hours 5, 12, and 18 fall into the later bucket.
pub fn greeting(hour: u32) -> &'static str {
    if (5..12).contains(&hour) {
        "Good morning"
    } else if (12..18).contains(&hour) {
        "Good afternoon"
    } else {
        "Good evening"
    }
}

/// Format a timestamp the way the flex header and snapshot display it.
pub fn format_timestamp(now: &DateTime<FixedOffset>) -> String {
    now.format("%Y-%m-%d %H:%M").to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at the last char boundary at or below `max` bytes,
/// with an ellipsis and byte count indicator appended. The boundary clamp
/// matters here: summaries and error bodies are routinely CJK, so `max` can
/// land mid-character.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}
