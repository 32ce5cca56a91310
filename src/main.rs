//! # Newsflash
//!
//! A scheduled notification pipeline: pull a news feed, ask a generative
//! model for a short narrated summary, push both the summary and the raw
//! headlines to one LINE recipient as a flex message, and persist the
//! result for a companion read-only web view.
//!
//! ## Architecture
//!
//! One sequential, single-shot pass per invocation:
//! 1. **Fetch**: read the first ten `(title, link)` pairs from the RSS feed
//! 2. **Summarize**: run the ordered model fallback chain until one attempt
//!    succeeds, or fall back to a human-readable sentinel
//! 3. **Deliver**: build the flex briefing and push it (best-effort)
//! 4. **Persist**: overwrite the latest-run snapshot JSON (best-effort)
//!
//! An empty feed short-circuits the whole run: nothing to report, so no
//! summarization, no delivery, and no snapshot.
//!
//! ## Usage
//!
//! ```sh
//! LINE_CHANNEL_ACCESS_TOKEN=... LINE_USER_ID=... GEMINI_API_KEY=... newsflash
//! ```

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod feed;
mod models;
mod outputs;
mod utils;

use cli::Cli;
use models::{HeadlineRecord, Snapshot};

/// Ceiling on any single remote call; individual stages set tighter
/// per-request timeouts.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("newsflash starting up");

    let args = Cli::parse();
    debug!(feed_url = %args.feed_url, snapshot_path = %args.snapshot_path, "Parsed configuration");

    let client = reqwest::Client::builder().timeout(CLIENT_TIMEOUT).build()?;

    // ---- Fetch headlines ----
    let headlines = feed::fetch_headlines(&client, args.feed_url.as_str()).await;
    run(&client, &args, headlines).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Execute the post-fetch stages: summarize, deliver, persist.
///
/// An empty headline set means "nothing to report": every later stage is
/// skipped, including the snapshot. Returns whether the stages ran.
async fn run(client: &reqwest::Client, args: &Cli, headlines: Vec<HeadlineRecord>) -> bool {
    if headlines.is_empty() {
        info!("No headlines fetched; nothing to report");
        return false;
    }

    // ---- Summarize ----
    let now = utils::local_now();
    let summary = api::summarize(client, args.gemini_api_key.as_deref(), &headlines, &now).await;
    info!(
        chars = summary.len(),
        preview = %utils::truncate_for_log(&summary, 120),
        "Summary ready"
    );

    // ---- Deliver ----
    outputs::flex::compose_and_send(
        client,
        args.line_channel_access_token.as_deref(),
        args.line_user_id.as_deref(),
        &headlines,
        &summary,
        &now,
    )
    .await;

    // ---- Persist snapshot ----
    let snapshot = Snapshot {
        updated_at: utils::format_timestamp(&now),
        summary,
        news: headlines,
    };
    outputs::snapshot::write_snapshot(&snapshot, &args.snapshot_path).await;

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn args(snapshot_path: &str) -> Cli {
        Cli {
            feed_url: Url::parse("https://feed.example/rss").unwrap(),
            snapshot_path: snapshot_path.to_string(),
            line_channel_access_token: None,
            line_user_id: None,
            gemini_api_key: None,
        }
    }

    fn temp_snapshot(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("newsflash_run_{name}_{}", std::process::id()))
            .join("latest.json")
            .to_string_lossy()
            .into_owned()
    }

    #[tokio::test]
    async fn test_empty_feed_skips_every_stage() {
        let path = temp_snapshot("empty");
        let client = reqwest::Client::new();

        let ran = run(&client, &args(&path), Vec::new()).await;

        assert!(!ran);
        assert!(!std::path::Path::new(&path).exists());
    }

    #[tokio::test]
    async fn test_run_without_credentials_still_persists_snapshot() {
        let path = temp_snapshot("no_creds");
        let client = reqwest::Client::new();
        let headlines = vec![HeadlineRecord::from_feed("A - Source", "http://x")];

        // No generation key and no push credentials: the summary is the
        // missing-credential sentinel, delivery is skipped, and the
        // snapshot still lands. No network is touched.
        let ran = run(&client, &args(&path), headlines).await;
        assert!(ran);

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let snapshot: Snapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(snapshot.summary, api::MISSING_KEY_SENTINEL);
        assert_eq!(snapshot.news[0].title, "A");
    }
}
