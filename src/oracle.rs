//! Semantic oracle: an external LLM asked "same event?" and "which company?".
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait for a text-in, text-out LLM backend
//! - [`AskFnWrapper`]: Wraps the `awful_aj` library's `ask` function
//! - [`TimeoutAsk`]: Decorator that bounds a single round-trip
//! - [`EventOracle`]: The two questions the clustering stages ask
//! - [`LlmOracle`]: [`EventOracle`] over any pair of [`AskAsync`] backends
//! - [`DisabledOracle`]: Always answers "no" / "no entity"
//!
//! # Failure Semantics
//!
//! The oracle fails closed. Transport errors, timeouts, empty or unparseable
//! responses all become `false` (pairwise) or an empty assignment list
//! (batch), and are logged rather than returned. There is no retry: one
//! failed call is the final answer for that pair or batch in this run.

use crate::prompts;
use crate::utils::truncate_for_log;
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends or decorators (like a
/// timeout) and lets tests substitute scripted backends.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that bounds every call of an inner [`AskAsync`] by a deadline.
///
/// An elapsed deadline is reported as an error; the in-flight request is dropped.
pub struct TimeoutAsk<T> {
    inner: T,
    limit: StdDuration,
}

impl<T> TimeoutAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, limit: StdDuration) -> Self {
        Self { inner, limit }
    }
}

impl<T> fmt::Debug for TimeoutAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutAsk")
            .field("limit", &self.limit)
            .finish()
    }
}

impl<T> AskAsync for TimeoutAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        match timeout(self.limit, self.inner.ask(text)).await {
            Ok(res) => res,
            Err(_) => {
                warn!(limit = ?self.limit, "ask() timed out");
                Err(format!("oracle call exceeded {:?}", self.limit).into())
            }
        }
    }
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
///
/// One wrapper per chat template: the same-event question and the batch
/// organization tagger use different system prompts.
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// Reference to the LLM configuration (API keys, endpoints, model settings).
    pub config: &'a AwfulJadeConfig,
    /// Reference to the chat template defining the conversation structure.
    pub template: &'a ChatTemplate,
}

impl<'a> AskAsync for AskFnWrapper<'a> {
    type Response = String;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        let dt = t0.elapsed();

        match &res {
            Ok(_) => debug!(elapsed_ms = dt.as_millis() as u128, "API call succeeded"),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u128, error = %e, "API call failed"),
        }
        res
    }
}

/// One article's verdict from a batch tagging call.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityAssignment {
    /// Zero-based position of the title within its batch.
    pub id: usize,
    /// Organization as returned, before normalization. May be the "None" sentinel.
    pub company: String,
    /// Translated headline, when the oracle supplied one.
    pub title: Option<String>,
}

/// The semantic judgments the clustering stages delegate.
///
/// Implementations never fail: anything that goes wrong is a "no".
pub trait EventOracle {
    /// Do these two headlines describe the same concrete event?
    async fn same_event(&self, title_a: &str, title_b: &str) -> bool;

    /// Tag each title in one batch with an organization and a translation.
    ///
    /// Titles missing from the result have no assignment.
    async fn assign_entities(&self, titles: &[String]) -> Vec<EntityAssignment>;
}

/// [`EventOracle`] that answers every question conservatively.
///
/// Used when no LLM configuration is available or the oracle is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOracle;

impl EventOracle for DisabledOracle {
    async fn same_event(&self, _title_a: &str, _title_b: &str) -> bool {
        false
    }

    async fn assign_entities(&self, _titles: &[String]) -> Vec<EntityAssignment> {
        Vec::new()
    }
}

/// [`EventOracle`] backed by LLM calls.
#[derive(Debug)]
pub struct LlmOracle<T> {
    pairwise: T,
    entity: T,
}

impl<T> LlmOracle<T>
where
    T: AskAsync<Response = String>,
{
    pub fn new(pairwise: T, entity: T) -> Self {
        Self { pairwise, entity }
    }
}

impl<T> EventOracle for LlmOracle<T>
where
    T: AskAsync<Response = String>,
{
    #[instrument(level = "debug", skip_all)]
    async fn same_event(&self, title_a: &str, title_b: &str) -> bool {
        let prompt = prompts::same_event(title_a, title_b);
        match self.pairwise.ask(&prompt).await {
            Ok(response) => {
                let verdict = parse_yes(&response);
                debug!(
                    %title_a,
                    %title_b,
                    verdict,
                    response = %truncate_for_log(&response, 80),
                    "Oracle same-event verdict"
                );
                verdict
            }
            Err(e) => {
                warn!(error = %e, %title_a, %title_b, "Oracle unavailable; treating pair as different events");
                false
            }
        }
    }

    #[instrument(level = "debug", skip_all, fields(batch_len = titles.len()))]
    async fn assign_entities(&self, titles: &[String]) -> Vec<EntityAssignment> {
        if titles.is_empty() {
            return Vec::new();
        }
        let prompt = prompts::entity_batch(titles);
        match self.entity.ask(&prompt).await {
            Ok(response) => parse_entity_response(&response, titles.len()),
            Err(e) => {
                warn!(error = %e, batch_len = titles.len(), "Oracle unavailable; batch stays untagged");
                Vec::new()
            }
        }
    }
}

/// A YES anywhere in the response, in any case, is a yes.
pub fn parse_yes(response: &str) -> bool {
    response.to_uppercase().contains("YES")
}

/// Find the first balanced JSON array embedded in `text`.
///
/// Brackets inside JSON strings are ignored. Bracketed prose that does not
/// parse as JSON (e.g. `[note]`) is skipped and the scan continues.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = text[start..].find('[') {
        let open = start + offset;
        if let Some(close) = matching_bracket(bytes, open) {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&text[open..=close]) {
                return Some(items);
            }
        }
        start = open + 1;
    }
    None
}

/// Index of the `]` closing the `[` at `open`, honoring JSON string escapes.
fn matching_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Turn a batch response into assignments, skipping malformed items.
///
/// Items need an `id` within `0..batch_len` (number or numeric string) and a
/// string `company`; `title` is optional. Later duplicates of an id are ignored.
pub fn parse_entity_response(response: &str, batch_len: usize) -> Vec<EntityAssignment> {
    let Some(items) = extract_json_array(response) else {
        warn!(
            response_preview = %truncate_for_log(response, 300),
            "Oracle returned no JSON array; batch stays untagged"
        );
        return Vec::new();
    };

    let mut seen = vec![false; batch_len];
    let mut out = Vec::with_capacity(items.len());
    for item in &items {
        let id = match &item["id"] {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.trim().parse::<usize>().ok(),
            _ => None,
        };
        let company = item["company"].as_str();
        match (id, company) {
            (Some(id), Some(company)) if id < batch_len => {
                if seen[id] {
                    debug!(id, "Duplicate id in oracle response; keeping first");
                    continue;
                }
                seen[id] = true;
                let title = item["title"]
                    .as_str()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty());
                out.push(EntityAssignment {
                    id,
                    company: company.to_string(),
                    title,
                });
            }
            _ => {
                warn!(item = %truncate_for_log(&item.to_string(), 200), "Skipping malformed oracle item");
            }
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod stubs {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that replays scripted responses; `Err` entries become call failures.
    #[derive(Debug, Default)]
    pub struct ScriptedAsk {
        responses: Mutex<VecDeque<Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedAsk {
        pub fn new(responses: Vec<Result<&str, &str>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(String::from).map_err(String::from))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl AskAsync for ScriptedAsk {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            self.prompts.lock().unwrap().push(text.to_string());
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(r)) => Ok(r),
                Some(Err(e)) => Err(e.into()),
                None => Err("no scripted response left".into()),
            }
        }
    }

    /// Backend that never answers within any reasonable deadline.
    #[derive(Debug, Default)]
    pub struct HangingAsk;

    impl AskAsync for HangingAsk {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, Box<dyn Error>> {
            tokio::time::sleep(StdDuration::from_secs(3600)).await;
            Ok("YES".to_string())
        }
    }

    /// Oracle with a fixed pairwise answer that counts how often it was asked.
    #[derive(Debug, Default)]
    pub struct CountingOracle {
        pub answer: bool,
        pub calls: AtomicUsize,
    }

    impl CountingOracle {
        pub fn answering(answer: bool) -> Self {
            Self {
                answer,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EventOracle for CountingOracle {
        async fn same_event(&self, _title_a: &str, _title_b: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }

        async fn assign_entities(&self, _titles: &[String]) -> Vec<EntityAssignment> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
    }
}
