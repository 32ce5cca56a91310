//! Configuration surface for the pipeline.
//!
//! All three credentials arrive through environment variables so the binary
//! can run unattended from a scheduler with zero arguments; the flags exist
//! for local runs. The parsed struct is built once in `main` and passed by
//! reference into each stage, so no component reads the environment itself.

use clap::Parser;
use url::Url;

/// Runtime configuration for one pipeline run.
///
/// Absence of the push credentials silently disables delivery; absence of
/// the generation key makes the summarizer return its missing-credential
/// sentinel. Neither is an error.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// RSS feed to pull headlines from
    #[arg(
        long,
        env = "FEED_URL",
        default_value = "https://news.google.com/rss?hl=zh-TW&gl=TW&ceid=TW:zh-Hant"
    )]
    pub feed_url: Url,

    /// Path of the snapshot JSON consumed by the companion web view
    #[arg(long, env = "SNAPSHOT_PATH", default_value = "site/latest.json")]
    pub snapshot_path: String,

    /// LINE channel access token for push delivery
    #[arg(long, env = "LINE_CHANNEL_ACCESS_TOKEN", hide_env_values = true)]
    pub line_channel_access_token: Option<String>,

    /// LINE user id of the single briefing recipient
    #[arg(long, env = "LINE_USER_ID", hide_env_values = true)]
    pub line_user_id: Option<String>,

    /// Generation service API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_runs_with_no_arguments() {
        let cli = Cli::parse_from(["newsflash"]);
        assert_eq!(cli.feed_url.host_str(), Some("news.google.com"));
        assert_eq!(cli.snapshot_path, "site/latest.json");
    }

    #[test]
    fn test_cli_flag_overrides() {
        let cli = Cli::parse_from([
            "newsflash",
            "--feed-url",
            "https://feeds.example/rss",
            "--snapshot-path",
            "/tmp/latest.json",
            "--gemini-api-key",
            "k",
        ]);

        assert_eq!(cli.feed_url.as_str(), "https://feeds.example/rss");
        assert_eq!(cli.snapshot_path, "/tmp/latest.json");
        assert_eq!(cli.gemini_api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_cli_rejects_invalid_feed_url() {
        let result = Cli::try_parse_from(["newsflash", "--feed-url", "not a url"]);
        assert!(result.is_err());
    }
}
