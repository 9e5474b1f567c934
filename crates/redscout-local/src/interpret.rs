//! Turns a raw service response into validated, deduplicated Reddit items.
//!
//! Strategies run in a fixed order, each only when the previous produced
//! nothing:
//!
//! 1. `error` field: report it and stop.
//! 2. locate free text (`choices`, then `output`) and parse embedded `{"items": [...]}` JSON.
//! 3. fall back to thread URLs found in raw `web_search` hits.
//!
//! Whatever the winning strategy produced goes through one cleaning pass.

use crate::extract::{candidates_from_web_search, items_from_text, locate_output_text};
use crate::response::{error_message, ResponseView};
use once_cell::sync::Lazy;
use redscout_core::{Diagnostic, DiagnosticSink, Error, RedditItem, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex"));

pub const DEFAULT_RELEVANCE: f64 = 0.5;

const ERROR_DUMP_MAX_CHARS: usize = 1000;

/// What to do with a candidate whose `relevance` is not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelevancePolicy {
    /// Substitute `DEFAULT_RELEVANCE` and emit a warning diagnostic.
    #[default]
    Default,
    /// Fail the whole batch with `Error::InvalidRelevance`.
    Reject,
}

impl RelevancePolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Some(RelevancePolicy::Default),
            "reject" => Some(RelevancePolicy::Reject),
            _ => None,
        }
    }
}

pub struct Interpreter<'s> {
    sink: &'s dyn DiagnosticSink,
    relevance_policy: RelevancePolicy,
}

impl<'s> Interpreter<'s> {
    pub fn new(sink: &'s dyn DiagnosticSink) -> Self {
        Self {
            sink,
            relevance_policy: RelevancePolicy::default(),
        }
    }

    pub fn with_relevance_policy(mut self, policy: RelevancePolicy) -> Self {
        self.relevance_policy = policy;
        self
    }

    /// Only fails under `RelevancePolicy::Reject`.
    pub fn interpret(&self, response: &Value) -> Result<Vec<RedditItem>> {
        let Some(view) = ResponseView::new(response) else {
            self.sink.emit(Diagnostic::NoOutput { keys: Vec::new() });
            return Ok(Vec::new());
        };

        if let Some(error) = view.error() {
            self.report_upstream_error(response, error);
            return Ok(Vec::new());
        }

        let output_text = locate_output_text(&view);
        let mut candidates = output_text
            .as_deref()
            .map(items_from_text)
            .unwrap_or_default();

        if candidates.is_empty() {
            candidates = candidates_from_web_search(view.web_search());
        }

        if candidates.is_empty() && output_text.is_none() {
            self.sink.emit(Diagnostic::NoOutput { keys: view.keys() });
            return Ok(Vec::new());
        }

        self.clean(&candidates)
    }

    fn report_upstream_error(&self, response: &Value, error: &Value) {
        self.sink.emit(Diagnostic::UpstreamError {
            message: error_message(error),
        });
        if self.sink.verbose() {
            let body = serde_json::to_string_pretty(response).unwrap_or_default();
            self.sink.emit(Diagnostic::ErrorResponseDump {
                body: body.chars().take(ERROR_DUMP_MAX_CHARS).collect(),
            });
        }
    }

    fn clean(&self, candidates: &[Value]) -> Result<Vec<RedditItem>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for (idx, candidate) in candidates.iter().enumerate() {
            let Some(fields) = candidate.as_object() else {
                continue;
            };
            let Some(url) = fields.get("url").and_then(Value::as_str) else {
                continue;
            };
            if url.is_empty() || !url.contains("reddit.com") {
                continue;
            }
            let url = url.trim_end_matches('/');
            if !seen.insert(url.to_string()) {
                continue;
            }

            // Numbered by raw position, so skipped candidates leave gaps.
            let id = format!("R{}", idx + 1);
            let relevance = self.relevance(&id, fields.get("relevance"))?;

            out.push(RedditItem {
                title: text_field(fields, "title"),
                url: url.to_string(),
                subreddit: normalize_subreddit(&text_field(fields, "subreddit")),
                date: valid_date(fields.get("date")),
                why_relevant: text_field(fields, "why_relevant"),
                relevance,
                id,
            });
        }

        Ok(out)
    }

    fn relevance(&self, id: &str, raw: Option<&Value>) -> Result<f64> {
        match coerce_relevance(raw) {
            Some(r) => Ok(r),
            None => {
                let raw = raw.map(Value::to_string).unwrap_or_default();
                match self.relevance_policy {
                    RelevancePolicy::Default => {
                        self.sink.emit(Diagnostic::InvalidRelevance {
                            id: id.to_string(),
                            raw,
                        });
                        Ok(DEFAULT_RELEVANCE)
                    }
                    RelevancePolicy::Reject => Err(Error::InvalidRelevance {
                        id: id.to_string(),
                        raw,
                    }),
                }
            }
        }
    }
}

/// Interpret with the default relevance policy. Never fails.
pub fn parse(response: &Value, sink: &dyn DiagnosticSink) -> Vec<RedditItem> {
    Interpreter::new(sink)
        .interpret(response)
        .unwrap_or_default()
}

/// Clamped relevance, or `None` when the value is not numeric.
///
/// Missing and null values read as `DEFAULT_RELEVANCE`; numeric strings are accepted.
pub fn coerce_relevance(raw: Option<&Value>) -> Option<f64> {
    let r = match raw {
        None | Some(Value::Null) => return Some(DEFAULT_RELEVANCE),
        Some(Value::Number(n)) => n.as_f64()?,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok()?,
        Some(_) => return None,
    };
    r.is_finite().then(|| r.clamp(0.0, 1.0))
}

/// `Some` only for strings shaped exactly like `YYYY-MM-DD`.
pub fn valid_date(raw: Option<&Value>) -> Option<String> {
    match raw {
        Some(Value::String(s)) if DATE_RE.is_match(s) => Some(s.clone()),
        _ => None,
    }
}

pub fn normalize_subreddit(raw: &str) -> String {
    let s = raw.trim();
    s.strip_prefix("r/").unwrap_or(s).to_string()
}

fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    }
}
