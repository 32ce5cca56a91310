//! Summarization engine: an ordered model fallback chain over the Gemini API.
//!
//! This module turns a headline set into narrated prose while tolerating an
//! unreliable generation service. It degrades along two independent axes:
//! model availability (progressively cheaper models) and content-policy
//! refusal (later tiers relax the service's moderation thresholds so benign
//! news is not blocked).
//!
//! # Architecture
//!
//! - [`GenerateAsync`]: seam between the chain and the generation service,
//!   implemented by [`GeminiClient`] and by test stubs
//! - [`run_chain`]: the uniform fallback loop over [`ModelAttempt`]s
//! - [`summarize`]: entry point; handles the missing-credential short circuit
//!
//! # Fallback contract
//!
//! Attempts are tried strictly in priority order. The first success wins and
//! is sanitized with [`strip_emphasis`]; every failure is logged with its
//! typed reason and the loop advances. Exhaustion yields a fixed sentinel
//! string, never an error: downstream composition always needs a renderable
//! text value. There is no same-attempt retry; the chain is the retry
//! mechanism.

use crate::models::{HeadlineRecord, ModelAttempt, PromptVariant};
use crate::utils::{greeting, truncate_for_log};
use chrono::{DateTime, FixedOffset, Timelike};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Returned when no generation API key is configured. A configuration
/// problem, not a runtime failure: the chain is never entered.
pub const MISSING_KEY_SENTINEL: &str =
    "AI summary unavailable (no generation API key configured)";

/// Returned when every attempt in the chain failed.
pub const EXHAUSTED_SENTINEL: &str =
    "AI summary temporarily unavailable (all models busy or refused)";

/// Markup emphasis marker the push transport renders literally, stripped
/// from every successful generation as a contract (the prompt also forbids
/// it, but models leak it anyway).
const EMPHASIS_MARKER: &str = "**";

/// Defensive cap on each generation call; the service does not bound its own.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(30);

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Harm categories unblocked when an attempt relaxes the safety policy.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

/// The default fallback chain, most capable tier first. Reordering or adding
/// tiers is a data change here; the loop in [`run_chain`] never changes.
pub static DEFAULT_ATTEMPTS: Lazy<Vec<ModelAttempt>> = Lazy::new(|| {
    vec![
        ModelAttempt {
            model: "gemini-2.0-flash",
            prompt: PromptVariant::Sectioned,
            relax_safety: false,
        },
        ModelAttempt {
            model: "gemini-2.0-flash",
            prompt: PromptVariant::Sectioned,
            relax_safety: true,
        },
        ModelAttempt {
            model: "gemini-2.0-flash-lite",
            prompt: PromptVariant::Plain,
            relax_safety: true,
        },
        ModelAttempt {
            model: "gemini-1.5-flash",
            prompt: PromptVariant::Plain,
            relax_safety: true,
        },
    ]
});

/// Why one generation attempt failed. Consumed by the fallback loop's log
/// line; individual failures never propagate to the caller.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("content blocked by safety policy ({reason})")]
    Blocked { reason: String },
    #[error("response contained no usable text")]
    Empty,
}

/// Seam between the fallback chain and the generation service.
pub trait GenerateAsync {
    /// Run one generation call for `attempt` with the already-built prompt.
    async fn generate(&self, attempt: &ModelAttempt, prompt: &str)
    -> Result<String, GenerateError>;
}

/// Gemini REST client implementing [`GenerateAsync`].
#[derive(Debug)]
pub struct GeminiClient<'a> {
    /// Shared HTTP client (connection reuse across attempts).
    pub http: &'a reqwest::Client,
    /// Generation service API key.
    pub api_key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateAsync for GeminiClient<'_> {
    #[instrument(level = "info", skip_all, fields(model = attempt.model))]
    async fn generate(
        &self,
        attempt: &ModelAttempt,
        prompt: &str,
    ) -> Result<String, GenerateError> {
        let url = format!("{GEMINI_ENDPOINT}/{}:generateContent", attempt.model);

        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if attempt.relax_safety {
            let settings: Vec<serde_json::Value> = SAFETY_CATEGORIES
                .iter()
                .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
                .collect();
            body["safetySettings"] = json!(settings);
        }

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key)])
            .json(&body)
            .timeout(GENERATE_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let parsed: GenerateResponse = response.json().await?;

        if let Some(feedback) = parsed.prompt_feedback {
            if let Some(reason) = feedback.block_reason {
                return Err(GenerateError::Blocked { reason });
            }
        }

        let candidate = parsed.candidates.into_iter().next().ok_or(GenerateError::Empty)?;
        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(GenerateError::Blocked {
                reason: "candidate finished with SAFETY".to_string(),
            });
        }

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerateError::Empty);
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Build the prompt for one attempt.
///
/// Both variants open with the time-of-day greeting and forbid `**`
/// emphasis; the sectioned variant additionally asks for bracketed section
/// headers, a blank line between sections, and the length target.
pub fn build_prompt(variant: PromptVariant, opener: &str, headlines: &[HeadlineRecord]) -> String {
    let titles: String = headlines
        .iter()
        .map(|h| format!("- {}\n", h.title))
        .collect();

    match variant {
        PromptVariant::Sectioned => format!(
            "Here are today's top news headlines:\n{titles}\n\
             Open with \"{opener}, here is your news briefing\", then write a \
             narrated summary of about 250 to 300 words. When the content \
             allows, group related stories under bracketed section headers \
             such as [Politics], and leave a blank line between sections. \
             Never use ** emphasis markers."
        ),
        PromptVariant::Plain => format!(
            "Summarize today's top news headlines in one short plain-prose \
             paragraph, opening with \"{opener}\". Never use ** emphasis \
             markers.\n{titles}"
        ),
    }
}

/// Remove every occurrence of the forbidden emphasis marker.
///
/// Applied to every successful generation result, no matter which attempt
/// produced it. Sentinels are fixed strings and bypass this.
pub fn strip_emphasis(text: &str) -> String {
    text.replace(EMPHASIS_MARKER, "")
}

/// The uniform fallback loop.
///
/// Tries each attempt in order against `backend`; the first success is
/// sanitized and returned, and later attempts are never invoked. Exhaustion
/// returns [`EXHAUSTED_SENTINEL`].
pub async fn run_chain<G: GenerateAsync>(
    backend: &G,
    attempts: &[ModelAttempt],
    headlines: &[HeadlineRecord],
    now: &DateTime<FixedOffset>,
) -> String {
    let opener = greeting(now.hour());

    for (tier, attempt) in attempts.iter().enumerate() {
        let prompt = build_prompt(attempt.prompt, opener, headlines);
        info!(
            tier,
            model = attempt.model,
            variant = ?attempt.prompt,
            relax_safety = attempt.relax_safety,
            "Trying summarization attempt"
        );

        match backend.generate(attempt, &prompt).await {
            Ok(text) => {
                info!(tier, model = attempt.model, chars = text.len(), "Summarization succeeded");
                return strip_emphasis(&text);
            }
            Err(e) => {
                warn!(tier, model = attempt.model, error = %e, "Attempt failed; falling back");
            }
        }
    }

    error!(attempts = attempts.len(), "Summarization chain exhausted");
    EXHAUSTED_SENTINEL.to_string()
}

/// Summarize a headline set, or explain why that was impossible.
///
/// Always returns a renderable string: prose on success, otherwise one of
/// the two sentinels. A missing API key short-circuits before any network
/// call is made.
#[instrument(level = "info", skip_all, fields(headlines = headlines.len()))]
pub async fn summarize(
    http: &reqwest::Client,
    api_key: Option<&str>,
    headlines: &[HeadlineRecord],
    now: &DateTime<FixedOffset>,
) -> String {
    let Some(api_key) = api_key.filter(|key| !key.is_empty()) else {
        warn!("Generation API key missing; summarization disabled");
        return MISSING_KEY_SENTINEL.to_string();
    };

    let client = GeminiClient { http, api_key };
    run_chain(&client, &DEFAULT_ATTEMPTS, headlines, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Backend stub that replays scripted outcomes and records which
    /// attempts were invoked.
    struct ScriptedBackend {
        outcomes: RefCell<VecDeque<Result<String, GenerateError>>>,
        calls: RefCell<Vec<(&'static str, bool)>>,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<Result<String, GenerateError>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.into()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl GenerateAsync for ScriptedBackend {
        async fn generate(
            &self,
            attempt: &ModelAttempt,
            _prompt: &str,
        ) -> Result<String, GenerateError> {
            self.calls
                .borrow_mut()
                .push((attempt.model, attempt.relax_safety));
            self.outcomes
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(GenerateError::Empty))
        }
    }

    fn headlines() -> Vec<HeadlineRecord> {
        vec![
            HeadlineRecord::from_feed("A - Source", "http://x"),
            HeadlineRecord::from_feed("B - Source", "http://y"),
            HeadlineRecord::from_feed("C", "http://z"),
        ]
    }

    fn noon() -> DateTime<FixedOffset> {
        crate::utils::local_offset()
            .with_ymd_and_hms(2025, 5, 6, 12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_attempt_success_short_circuits() {
        let backend = ScriptedBackend::new(vec![Ok("**Hi** there".to_string())]);
        let result = run_chain(&backend, &DEFAULT_ATTEMPTS, &headlines(), &noon()).await;

        assert_eq!(result, "Hi there");
        assert_eq!(backend.calls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_chain_advances_to_first_success() {
        let backend = ScriptedBackend::new(vec![
            Err(GenerateError::Empty),
            Err(GenerateError::Blocked {
                reason: "SAFETY".to_string(),
            }),
            Ok("Third tier wins".to_string()),
        ]);
        let result = run_chain(&backend, &DEFAULT_ATTEMPTS, &headlines(), &noon()).await;

        assert_eq!(result, "Third tier wins");
        // Attempts after the winning tier are never invoked.
        assert_eq!(backend.calls.borrow().len(), 3);
        assert_eq!(backend.calls.borrow()[2], ("gemini-2.0-flash-lite", true));
    }

    #[tokio::test]
    async fn test_exhaustion_returns_sentinel() {
        let backend = ScriptedBackend::new(vec![]);
        let result = run_chain(&backend, &DEFAULT_ATTEMPTS, &headlines(), &noon()).await;

        assert_eq!(result, EXHAUSTED_SENTINEL);
        assert_eq!(backend.calls.borrow().len(), DEFAULT_ATTEMPTS.len());
    }

    #[tokio::test]
    async fn test_chain_is_deterministic_for_identical_responses() {
        let first = ScriptedBackend::new(vec![Ok("Same **text**".to_string())]);
        let second = ScriptedBackend::new(vec![Ok("Same **text**".to_string())]);

        let a = run_chain(&first, &DEFAULT_ATTEMPTS, &headlines(), &noon()).await;
        let b = run_chain(&second, &DEFAULT_ATTEMPTS, &headlines(), &noon()).await;
        assert_eq!(a, b);
        assert_eq!(a, "Same text");
    }

    #[tokio::test]
    async fn test_missing_key_returns_sentinel_without_calls() {
        let http = reqwest::Client::new();
        assert_eq!(
            summarize(&http, None, &headlines(), &noon()).await,
            MISSING_KEY_SENTINEL
        );
        assert_eq!(
            summarize(&http, Some(""), &headlines(), &noon()).await,
            MISSING_KEY_SENTINEL
        );
    }

    #[test]
    fn test_strip_emphasis_removes_every_marker() {
        assert_eq!(strip_emphasis("**Hi** there"), "Hi there");
        assert_eq!(strip_emphasis("a ** b ** c **"), "a  b  c ");
        assert_eq!(strip_emphasis("untouched"), "untouched");
    }

    #[test]
    fn test_build_prompt_lists_titles_in_order() {
        let prompt = build_prompt(PromptVariant::Sectioned, "Good morning", &headlines());
        let a = prompt.find("- A\n").expect("first title");
        let b = prompt.find("- B\n").expect("second title");
        let c = prompt.find("- C\n").expect("third title");
        assert!(a < b && b < c);
        assert!(prompt.contains("Good morning"));
        assert!(prompt.contains("bracketed section headers"));
    }

    #[test]
    fn test_plain_prompt_is_the_degraded_variant() {
        let sectioned = build_prompt(PromptVariant::Sectioned, "Good evening", &headlines());
        let plain = build_prompt(PromptVariant::Plain, "Good evening", &headlines());
        assert_ne!(sectioned, plain);
        assert!(plain.contains("Good evening"));
        assert!(!plain.contains("bracketed"));
    }

    #[test]
    fn test_build_prompt_is_pure() {
        let a = build_prompt(PromptVariant::Sectioned, "Good morning", &headlines());
        let b = build_prompt(PromptVariant::Sectioned, "Good morning", &headlines());
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_chain_degrades_in_order() {
        // Strict preferred model first, relaxed and cheaper tiers after.
        assert!(!DEFAULT_ATTEMPTS[0].relax_safety);
        assert!(DEFAULT_ATTEMPTS[1..].iter().all(|a| a.relax_safety));
        assert_eq!(DEFAULT_ATTEMPTS[0].prompt, PromptVariant::Sectioned);
        assert_eq!(
            DEFAULT_ATTEMPTS.last().unwrap().prompt,
            PromptVariant::Plain
        );
    }
}
