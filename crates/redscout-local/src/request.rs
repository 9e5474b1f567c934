//! Builds the chat-completions request that asks the model to search Reddit.

use redscout_core::{DepthProfile, Error, Result, SearchRequest, Transport};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Z.AI (BigModel) chat completions endpoint.
pub const ZAI_CHAT_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";

const REDDIT_SEARCH_PROMPT: &str = r#"Find Reddit discussion threads about: {topic}

STEP 1: EXTRACT THE CORE SUBJECT
Get the MAIN NOUN/PRODUCT/TOPIC:
- "best nano banana prompting practices" → "nano banana"
- "killer features of clawdbot" → "clawdbot"
- "top Claude Code skills" → "Claude Code"
DO NOT include "best", "top", "tips", "practices", "features" in your search.

STEP 2: SEARCH BROADLY
Search for the core subject on Reddit:
1. "[core subject] site:reddit.com"
2. "reddit [core subject]"
3. "[core subject] reddit"

Return as many relevant threads as you find. We filter by date server-side.

STEP 3: INCLUDE ALL MATCHES
- Include ALL threads about the core subject
- Set date to "YYYY-MM-DD" if you can determine it, otherwise null
- We verify dates and filter old content server-side
- DO NOT pre-filter aggressively - include anything relevant

REQUIRED: URLs must contain "/r/" AND "/comments/"
REJECT: developers.reddit.com, business.reddit.com

Find {min_items}-{max_items} threads. Return MORE rather than fewer.

Return JSON:
{
  "items": [
    {
      "title": "Thread title",
      "url": "https://www.reddit.com/r/sub/comments/xyz/title/",
      "subreddit": "subreddit_name",
      "date": "YYYY-MM-DD or null",
      "why_relevant": "Why relevant",
      "relevance": 0.85
    }
  ]
}"#;

/// Qualifier words dropped by `core_subject`. Matching is per word, so the
/// two-word entries never match.
const NOISE_WORDS: &[&str] = &[
    "best",
    "top",
    "how to",
    "tips for",
    "practices",
    "features",
    "killer",
    "guide",
    "tutorial",
    "recommendations",
    "advice",
    "prompting",
    "using",
    "for",
    "with",
    "the",
    "of",
    "in",
    "on",
];

const CORE_SUBJECT_MAX_WORDS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<WebSearchTool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSearchTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub web_search: WebSearchDirective,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSearchDirective {
    pub enable: bool,
    pub search_query: String,
    /// Ask the service to return raw hits alongside the answer.
    pub search_result: bool,
}

/// Everything `search_reddit` needs besides the transport.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub api_key: String,
    pub model: String,
    pub request: SearchRequest,
    /// Full endpoint URL; `ZAI_CHAT_URL` when unset.
    pub base_url: Option<String>,
}

impl SearchParams {
    pub fn endpoint(&self) -> &str {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ZAI_CHAT_URL)
    }
}

pub fn render_prompt(topic: &str, profile: &DepthProfile) -> String {
    REDDIT_SEARCH_PROMPT
        .replace("{topic}", topic)
        .replace("{min_items}", &profile.min_items.to_string())
        .replace("{max_items}", &profile.max_items.to_string())
}

pub fn build_request(model: &str, request: &SearchRequest) -> ChatCompletionsRequest {
    let profile = request.depth.profile();
    ChatCompletionsRequest {
        model: model.to_string(),
        messages: vec![Message {
            role: "user".to_string(),
            content: render_prompt(&request.topic, &profile),
        }],
        tools: vec![WebSearchTool {
            kind: "web_search".to_string(),
            web_search: WebSearchDirective {
                enable: true,
                search_query: format!("{} site:reddit.com", request.topic),
                search_result: true,
            },
        }],
    }
}

pub fn auth_headers(api_key: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("Authorization".to_string(), format!("Bearer {api_key}"));
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers
}

/// Reduce a verbose topic to at most three words of actual subject.
///
/// Falls back to the original topic when every word is a qualifier.
pub fn core_subject(topic: &str) -> String {
    let lowered = topic.to_lowercase();
    let kept: Vec<&str> = lowered
        .split_whitespace()
        .filter(|w| !NOISE_WORDS.contains(w))
        .take(CORE_SUBJECT_MAX_WORDS)
        .collect();
    if kept.is_empty() {
        topic.to_string()
    } else {
        kept.join(" ")
    }
}

/// Send one Reddit search to the service and return its raw response.
///
/// A `mock_response` is returned as-is without touching the transport.
pub async fn search_reddit(
    transport: &dyn Transport,
    params: &SearchParams,
    mock_response: Option<Value>,
) -> Result<Value> {
    if let Some(mock) = mock_response {
        return Ok(mock);
    }

    let profile = params.request.depth.profile();
    let payload = serde_json::to_value(build_request(&params.model, &params.request))
        .map_err(|e| Error::Serialize(e.to_string()))?;
    let headers = auth_headers(&params.api_key);

    tracing::debug!(
        model = %params.model,
        depth = %params.request.depth,
        timeout_s = profile.timeout.as_secs(),
        "submitting reddit search"
    );
    transport
        .post(params.endpoint(), &payload, &headers, profile.timeout)
        .await
}
