use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("non-numeric relevance on item {id}: {raw}")]
    InvalidRelevance { id: String, raw: String },
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("serialize failed: {0}")]
    Serialize(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Named preset controlling how many threads are requested and how long the call may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthTier {
    Quick,
    #[default]
    Default,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthProfile {
    pub min_items: u32,
    pub max_items: u32,
    pub timeout: Duration,
}

const DEPTH_TABLE: [(DepthTier, DepthProfile); 3] = [
    (
        DepthTier::Quick,
        DepthProfile {
            min_items: 15,
            max_items: 25,
            timeout: Duration::from_secs(90),
        },
    ),
    (
        DepthTier::Default,
        DepthProfile {
            min_items: 30,
            max_items: 50,
            timeout: Duration::from_secs(120),
        },
    ),
    (
        DepthTier::Deep,
        DepthProfile {
            min_items: 70,
            max_items: 100,
            timeout: Duration::from_secs(180),
        },
    ),
];

impl DepthTier {
    pub const ALL: [DepthTier; 3] = [DepthTier::Quick, DepthTier::Default, DepthTier::Deep];

    pub fn as_str(self) -> &'static str {
        match self {
            DepthTier::Quick => "quick",
            DepthTier::Default => "default",
            DepthTier::Deep => "deep",
        }
    }

    /// Resolve a tier name. Unknown names resolve to `Default` instead of failing.
    pub fn from_name_lenient(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "quick" => DepthTier::Quick,
            "deep" => DepthTier::Deep,
            _ => DepthTier::Default,
        }
    }

    pub fn profile(self) -> DepthProfile {
        DEPTH_TABLE
            .iter()
            .find(|(tier, _)| *tier == self)
            .map(|(_, p)| *p)
            .unwrap_or(DEPTH_TABLE[1].1)
    }
}

impl fmt::Display for DepthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub topic: String,
    pub depth: DepthTier,
    /// Advisory window start (YYYY-MM-DD). Not enforced locally.
    pub from_date: String,
    /// Advisory window end (YYYY-MM-DD). Not enforced locally.
    pub to_date: String,
}

impl SearchRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            depth: DepthTier::Default,
            from_date: String::new(),
            to_date: String::new(),
        }
    }

    pub fn with_depth(mut self, depth: DepthTier) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_window(mut self, from_date: impl Into<String>, to_date: impl Into<String>) -> Self {
        self.from_date = from_date.into();
        self.to_date = to_date.into();
        self
    }
}

/// A validated Reddit thread recovered from a service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditItem {
    /// `R<n>`, where `n` is the 1-based position among the raw candidates.
    pub id: String,
    pub title: String,
    pub url: String,
    pub subreddit: String,
    pub date: Option<String>,
    pub why_relevant: String,
    pub relevance: f64,
}

/// Executes one JSON POST and hands back the parsed body.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        payload: &serde_json::Value,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<serde_json::Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Debug,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The service answered with an `error` field.
    UpstreamError { message: String },
    /// Truncated pretty-printed body of an error response (verbose sinks only).
    ErrorResponseDump { body: String },
    /// Nothing usable in the response; `keys` are its top-level field names.
    NoOutput { keys: Vec<String> },
    /// A candidate carried a relevance that is not a number.
    InvalidRelevance { id: String, raw: String },
}

impl Diagnostic {
    pub fn level(&self) -> DiagnosticLevel {
        match self {
            Diagnostic::UpstreamError { .. } => DiagnosticLevel::Error,
            Diagnostic::ErrorResponseDump { .. } => DiagnosticLevel::Debug,
            Diagnostic::NoOutput { .. } => DiagnosticLevel::Debug,
            Diagnostic::InvalidRelevance { .. } => DiagnosticLevel::Warn,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UpstreamError { message } => write!(f, "ZAI API error: {message}"),
            Diagnostic::ErrorResponseDump { body } => write!(f, "full error response: {body}"),
            Diagnostic::NoOutput { keys } => write!(
                f,
                "no output text or web_search found in ZAI response; keys present: [{}]",
                keys.join(", ")
            ),
            Diagnostic::InvalidRelevance { id, raw } => {
                write!(f, "non-numeric relevance on {id} ({raw}); using 0.5")
            }
        }
    }
}

/// Receives interpreter diagnostics instead of a process-wide log stream.
pub trait DiagnosticSink: Send + Sync {
    /// Verbose sinks also receive expensive diagnostics such as response dumps.
    fn verbose(&self) -> bool {
        false
    }

    fn emit(&self, diagnostic: Diagnostic);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _diagnostic: Diagnostic) {}
}
