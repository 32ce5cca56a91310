//! Headline source: RSS feed fetching and parsing.
//!
//! Pulls a syndication document over HTTP and extracts the first
//! [`MAX_ITEMS`] `(title, link)` pairs from `<channel><item>` entries.
//! The fetch is deliberately forgiving: any network or parse failure is
//! logged and surfaces as an empty headline set, which the pipeline treats
//! as "nothing to report" rather than an error.

use crate::models::HeadlineRecord;
use quick_xml::Reader;
use quick_xml::events::{BytesRef, Event};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

/// Only the first 10 feed items are consumed; the rest are ignored.
pub const MAX_ITEMS: usize = 10;

/// Bounded timeout on the feed request.
const FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure of the feed stage. Never propagated past [`fetch_headlines`];
/// typed so the log line can say what actually went wrong.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed XML malformed: {0}")]
    Xml(String),
}

/// Fetch and parse the feed, yielding an empty set on any failure.
#[instrument(level = "info", skip(client))]
pub async fn fetch_headlines(client: &reqwest::Client, feed_url: &str) -> Vec<HeadlineRecord> {
    match fetch(client, feed_url).await {
        Ok(headlines) => {
            info!(count = headlines.len(), "Fetched headlines");
            debug!(?headlines, "Headline set");
            headlines
        }
        Err(e) => {
            error!(error = %e, url = %feed_url, "Feed fetch failed; treating as empty");
            Vec::new()
        }
    }
}

async fn fetch(client: &reqwest::Client, feed_url: &str) -> Result<Vec<HeadlineRecord>, FeedError> {
    let body = client
        .get(feed_url)
        .timeout(FEED_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_feed(&body)
}

/// Which child of `<item>` the parser is currently inside.
enum ItemField {
    Title,
    Link,
}

/// Extract up to [`MAX_ITEMS`] headline records from an RSS document.
///
/// Only `<title>` and `<link>` inside `<item>` are read; channel-level
/// metadata and unknown elements are skipped. Titles arriving as CDATA or
/// with XML entities are decoded before cleaning. Items missing either
/// field are dropped.
pub fn parse_feed(xml: &str) -> Result<Vec<HeadlineRecord>, FeedError> {
    let mut reader = Reader::from_str(xml);
    let mut headlines = Vec::new();

    let mut in_item = false;
    let mut field: Option<ItemField> = None;
    let mut title = String::new();
    let mut link = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" => {
                    in_item = true;
                    title.clear();
                    link.clear();
                }
                b"title" if in_item => field = Some(ItemField::Title),
                b"link" if in_item => field = Some(ItemField::Link),
                _ => field = None,
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"item" => {
                    in_item = false;
                    if !title.trim().is_empty() && !link.trim().is_empty() {
                        headlines.push(HeadlineRecord::from_feed(title.trim(), link.trim()));
                        if headlines.len() == MAX_ITEMS {
                            break;
                        }
                    }
                }
                b"title" | b"link" => field = None,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if in_item {
                    let text = t.decode().map_err(|e| FeedError::Xml(e.to_string()))?;
                    match field {
                        Some(ItemField::Title) => title.push_str(&text),
                        Some(ItemField::Link) => link.push_str(&text),
                        None => {}
                    }
                }
            }
            // Entity references arrive as their own events, split out of the
            // surrounding text; dropping them would corrupt titles and links.
            Ok(Event::GeneralRef(r)) => {
                if in_item {
                    if let Some(ch) = resolve_ref(&r)? {
                        match field {
                            Some(ItemField::Title) => title.push(ch),
                            Some(ItemField::Link) => link.push(ch),
                            None => {}
                        }
                    }
                }
            }
            Ok(Event::CData(t)) => {
                if in_item {
                    let text = String::from_utf8_lossy(&t);
                    match field {
                        Some(ItemField::Title) => title.push_str(&text),
                        Some(ItemField::Link) => link.push_str(&text),
                        None => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedError::Xml(e.to_string())),
            Ok(_) => {}
        }
    }

    Ok(headlines)
}

/// Resolve a general entity reference to its character.
///
/// Numeric character references and the five predefined XML entities are
/// resolved; undeclared custom entities are dropped.
fn resolve_ref(r: &BytesRef) -> Result<Option<char>, FeedError> {
    if let Some(ch) = r
        .resolve_char_ref()
        .map_err(|e| FeedError::Xml(e.to_string()))?
    {
        return Ok(Some(ch));
    }

    let name = r.decode().map_err(|e| FeedError::Xml(e.to_string()))?;
    Ok(match name.as_ref() {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    })
}
