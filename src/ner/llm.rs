//! LLM-backed entity tagging with exponential backoff retry logic.
//!
//! Each headline is sent to an OpenAI-compatible model through `awful_aj`
//! using the `entity_tagger` template, which must instruct the model to
//! answer with JSON of the form:
//!
//! ```json
//! {"entities": [{"text": "Russia", "label": "GPE"}, {"text": "Chinese", "label": "NORP"}]}
//! ```
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async model interaction
//! - [`AskFnWrapper`]: Wraps the `awful_aj` library's `ask` function
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//! - [`LlmRecognizer`]: Parses replies into entity spans, re-asking once on truncation
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//!
//! Retries apply to model calls only; the scraper never retries.

use super::EntityRecognizer;
use crate::models::EntitySpan;
use crate::utils::{looks_truncated, truncate_for_log};
use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use once_cell::sync::Lazy;
use rand::{Rng, rng};
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Template name looked up in the `awful_aj` template directory.
pub const TEMPLATE_NAME: &str = "entity_tagger";

/// Outermost JSON object in a reply, tolerating Markdown code fences.
static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("static JSON object pattern"));

/// Trait for async model interaction.
pub trait AskAsync {
    /// The type of response returned by the model.
    type Response;

    /// Send text to the model and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.backoff(attempt) + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    pub config: &'a AwfulJadeConfig,
    pub template: &'a ChatTemplate,
}

impl AskAsync for AskFnWrapper<'_> {
    type Response = String;

    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        if let Err(e) = &res {
            warn!(elapsed_ms = t0.elapsed().as_millis(), error = %e, "Model call failed");
        }
        res
    }
}

#[derive(Debug, Deserialize)]
struct TaggerReply {
    #[serde(default)]
    entities: Vec<EntitySpan>,
}

/// Parse a tagger reply, ignoring any prose or code fences around the JSON.
fn parse_reply(reply: &str) -> Result<Vec<EntitySpan>, serde_json::Error> {
    let body = JSON_OBJECT
        .find(reply)
        .map(|m| m.as_str())
        .unwrap_or(reply);
    serde_json::from_str::<TaggerReply>(body).map(|r| r.entities)
}

/// Entity recognizer backed by a chat model.
#[derive(Debug)]
pub struct LlmRecognizer {
    config: AwfulJadeConfig,
    template: ChatTemplate,
}

impl LlmRecognizer {
    /// Load the model configuration and the `entity_tagger` template.
    ///
    /// `config_path` defaults to `config.yaml` in the `awful_aj` config directory.
    #[instrument(level = "info", fields(config_path = ?config_path))]
    pub async fn load(config_path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => config_dir()?.join("config.yaml"),
        };
        let config_str = config_path
            .to_str()
            .ok_or_else(|| format!("Not a valid config filename: {}", config_path.display()))?;
        let config = config::load_config(config_str)
            .map_err(|e| format!("Failed to load model config {config_str}: {e}"))?;
        info!(config_path = config_str, "Loaded model configuration");

        let template = template::load_template(TEMPLATE_NAME).await?;
        info!(template = TEMPLATE_NAME, "Loaded template");

        Ok(Self { config, template })
    }

    async fn ask_with_backoff(&self, text: &str) -> Result<String, Box<dyn Error>> {
        let client = AskFnWrapper {
            config: &self.config,
            template: &self.template,
        };
        RetryAsk::new(client, 5, StdDuration::from_secs(1)).ask(text).await
    }
}

impl EntityRecognizer for LlmRecognizer {
    #[instrument(level = "debug", skip(self))]
    async fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, Box<dyn Error>> {
        let reply = self.ask_with_backoff(text).await?;
        let mut parsed = parse_reply(&reply);

        if let Err(ref e) = parsed {
            if looks_truncated(e) {
                warn!(error = %e, "EOF while parsing tagger reply; re-asking once");
                let retry = self.ask_with_backoff(text).await?;
                parsed = parse_reply(&retry);
            }
        }

        match parsed {
            Ok(spans) => {
                debug!(count = spans.len(), "Model tagged headline");
                Ok(spans)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    reply_preview = %truncate_for_log(&reply, 300),
                    "Model returned non-conforming JSON"
                );
                Err(e.into())
            }
        }
    }
}
