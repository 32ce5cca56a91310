//! LINE flex message composition and push delivery.
//!
//! Builds one "bubble" flex document per run: a timestamp header, a
//! highlighted AI-summary box (when a summary exists), a separator, and a
//! ranked row per headline whose title is a tappable link to the article.
//! Delivery goes to a single fixed recipient over the LINE push API with
//! bearer auth. Missing credentials disable delivery silently; a failed
//! push is logged and never retried.

use crate::models::HeadlineRecord;
use crate::utils::{format_timestamp, truncate_for_log};
use chrono::{DateTime, FixedOffset};
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};

const PUSH_ENDPOINT: &str = "https://api.line.me/v2/bot/message/push";

const PUSH_TIMEOUT: Duration = Duration::from_secs(15);

/// Why a push delivery failed. Logged by [`compose_and_send`]; never
/// propagated, delivery is fire-and-forget.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Build the flex message document for one run.
///
/// Pure function of its inputs; the summary box is omitted entirely when
/// `summary` is empty, otherwise the text (prose or sentinel, both are
/// renderable) is shown inline.
pub fn build_flex_message(headlines: &[HeadlineRecord], summary: &str, timestamp: &str) -> Value {
    let mut body = vec![json!({
        "type": "text",
        "text": format!("📅 {timestamp} News Flash"),
        "weight": "bold",
        "size": "md",
        "color": "#888888"
    })];

    if !summary.is_empty() {
        body.push(json!({
            "type": "box",
            "layout": "vertical",
            "backgroundColor": "#f0f8ff",
            "cornerRadius": "md",
            "paddingAll": "md",
            "margin": "md",
            "contents": [
                {
                    "type": "text",
                    "text": "🤖 AI Briefing",
                    "weight": "bold",
                    "size": "md",
                    "color": "#1DB446"
                },
                {
                    "type": "text",
                    "text": summary,
                    "wrap": true,
                    "size": "md",
                    "margin": "md",
                    "color": "#555555",
                    "lineSpacing": "6px"
                }
            ]
        }));
    }

    body.push(json!({ "type": "separator", "margin": "xl" }));
    body.push(json!({
        "type": "text",
        "text": "🔥 Top Headlines",
        "weight": "bold",
        "size": "xl",
        "margin": "xl"
    }));

    for (rank, headline) in headlines.iter().enumerate() {
        body.push(json!({
            "type": "box",
            "layout": "horizontal",
            "margin": "lg",
            "contents": [
                {
                    "type": "text",
                    "text": format!("{}.", rank + 1),
                    "flex": 0,
                    "color": "#aaaaaa",
                    "size": "lg"
                },
                {
                    "type": "text",
                    "text": headline.title,
                    "wrap": true,
                    "size": "lg",
                    "color": "#111111",
                    "flex": 1,
                    "margin": "md",
                    "action": { "type": "uri", "uri": headline.link }
                }
            ]
        }));
    }

    json!({
        "type": "flex",
        "altText": format!("🔔 {timestamp} news"),
        "contents": {
            "type": "bubble",
            "size": "giga",
            "body": { "type": "box", "layout": "vertical", "contents": body }
        }
    })
}

/// Compose the briefing and push it to the configured recipient.
///
/// Missing credentials skip delivery with an info log, not an error; a
/// failed delivery is logged and absorbed so snapshot persistence still
/// runs.
#[instrument(level = "info", skip_all, fields(headlines = headlines.len()))]
pub async fn compose_and_send(
    client: &reqwest::Client,
    token: Option<&str>,
    user_id: Option<&str>,
    headlines: &[HeadlineRecord],
    summary: &str,
    now: &DateTime<FixedOffset>,
) {
    let (Some(token), Some(user_id)) = (
        token.filter(|t| !t.is_empty()),
        user_id.filter(|u| !u.is_empty()),
    ) else {
        info!("Push credentials not configured; skipping delivery");
        return;
    };

    let message = build_flex_message(headlines, summary, &format_timestamp(now));
    match deliver(client, token, user_id, message).await {
        Ok(()) => info!("Briefing delivered"),
        Err(e) => error!(error = %e, "Delivery failed; continuing"),
    }
}

async fn deliver(
    client: &reqwest::Client,
    token: &str,
    user_id: &str,
    message: Value,
) -> Result<(), PushError> {
    let payload = json!({ "to": user_id, "messages": [message] });

    let response = client
        .post(PUSH_ENDPOINT)
        .bearer_auth(token)
        .json(&payload)
        .timeout(PUSH_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PushError::Status {
            status: status.as_u16(),
            body: truncate_for_log(&body, 300),
        });
    }
    Ok(())
}
