//! Extraction strategies: each one turns part of a response into raw candidates.
//!
//! Candidates stay loosely typed (`serde_json::Value`) until the interpreter
//! cleans them, so every strategy feeds the same validation pass.

use crate::response::{OutputField, ResponseView};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

static EMBEDDED_ITEMS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)\{.*"items".*\}"#).expect("embedded items regex"));

static REDDIT_THREAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://(?:www\.)?reddit\.com/r/\w+/comments/\w+[^\s"'<>]*"#)
        .expect("reddit thread regex")
});

static SUBREDDIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/r/(\w+)/").expect("subreddit regex"));

/// Relevance assigned to threads recovered from raw search hits.
pub const WEB_SEARCH_RELEVANCE: f64 = 0.7;

const WHY_RELEVANT_MAX_CHARS: usize = 200;

/// Find the model's free-text answer: `choices` first, then `output`.
pub fn locate_output_text(view: &ResponseView<'_>) -> Option<String> {
    text_from_choices(view.choices()).or_else(|| view.output().and_then(text_from_output))
}

fn text_from_choices(choices: &[Value]) -> Option<String> {
    for choice in choices {
        let Some(message) = choice.get("message") else {
            continue;
        };
        if let Some(content) = message.get("content").and_then(Value::as_str) {
            if !content.is_empty() {
                return Some(content.to_string());
            }
        }
        let search_call = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .and_then(|calls| {
                calls.iter().find(|call| {
                    call.get("type").and_then(Value::as_str) == Some("web_search")
                        && call.get("function").is_some()
                })
            });
        if let Some(call) = search_call {
            let args = arguments_text(call.get("function").and_then(|f| f.get("arguments")));
            if !args.is_empty() {
                return Some(args);
            }
        }
    }
    None
}

fn arguments_text(arguments: Option<&Value>) -> String {
    match arguments {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn text_from_output(output: OutputField<'_>) -> Option<String> {
    match output {
        OutputField::Text(s) => (!s.is_empty()).then(|| s.to_string()),
        OutputField::Blocks(entries) => entries
            .iter()
            .filter_map(entry_text)
            .find(|t| !t.is_empty())
            .map(str::to_string),
    }
}

fn entry_text(entry: &Value) -> Option<&str> {
    match entry {
        Value::String(s) => Some(s.as_str()),
        Value::Object(fields) if fields.get("type").and_then(Value::as_str) == Some("message") => {
            fields
                .get("content")?
                .as_array()?
                .iter()
                .find(|block| block.get("type").and_then(Value::as_str) == Some("output_text"))?
                .get("text")?
                .as_str()
        }
        Value::Object(fields) => fields.get("text").and_then(Value::as_str),
        _ => None,
    }
}

/// Parse the first `{ ... "items" ... }` span in `text`.
///
/// The span runs from the leftmost `{` to the last `}`, so prose around a
/// single JSON document is tolerated. Malformed JSON is `None`.
pub fn extract_embedded_json(text: &str) -> Option<Value> {
    let span = EMBEDDED_ITEMS_RE.find(text)?;
    serde_json::from_str(span.as_str()).ok()
}

/// The `items` array embedded in free text, or nothing.
pub fn items_from_text(text: &str) -> Vec<Value> {
    match extract_embedded_json(text) {
        Some(Value::Object(mut doc)) => match doc.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Synthesize candidates from raw search hits.
///
/// Every thread URL found in `link` or `content` yields one candidate, and a
/// `link` that is itself a thread yields another. Duplicates are left for the
/// interpreter's dedupe pass.
pub fn candidates_from_web_search(hits: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for hit in hits {
        let Some(hit) = hit.as_object() else {
            continue;
        };
        let link = str_field(hit, "link");
        let content = str_field(hit, "content");

        let haystack = format!("{link} {content}");
        for m in REDDIT_THREAD_RE.find_iter(&haystack) {
            out.push(hit_candidate(hit, m.as_str(), content));
        }

        if link.contains("reddit.com/r/") && link.contains("/comments/") {
            out.push(hit_candidate(hit, link, content));
        }
    }
    out
}

fn hit_candidate(hit: &Map<String, Value>, url: &str, content: &str) -> Value {
    let subreddit = SUBREDDIT_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("");
    json!({
        "title": hit.get("title").cloned().unwrap_or_else(|| json!("")),
        "url": url.trim_end_matches('/'),
        "subreddit": subreddit,
        "date": hit.get("publish_date").cloned().unwrap_or(Value::Null),
        "why_relevant": content.chars().take(WHY_RELEVANT_MAX_CHARS).collect::<String>(),
        "relevance": WEB_SEARCH_RELEVANCE,
    })
}

fn str_field<'a>(fields: &'a Map<String, Value>, key: &str) -> &'a str {
    fields.get(key).and_then(Value::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(body: Value) -> Option<String> {
        locate_output_text(&ResponseView::new(&body).unwrap())
    }

    #[test]
    fn message_content_wins_over_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": "from content",
                    "tool_calls": [{ "type": "web_search", "function": { "arguments": "from args" } }]
                }
            }]
        });
        assert_eq!(text_of(body).as_deref(), Some("from content"));
    }

    #[test]
    fn first_web_search_tool_call_supplies_arguments() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": "",
                    "tool_calls": [
                        { "type": "function", "function": { "arguments": "wrong kind" } },
                        { "type": "web_search", "function": { "arguments": "first" } },
                        { "type": "web_search", "function": { "arguments": "second" } }
                    ]
                }
            }]
        });
        assert_eq!(text_of(body).as_deref(), Some("first"));
    }

    #[test]
    fn structured_tool_arguments_are_serialized() {
        let body = json!({
            "choices": [{
                "message": {
                    "tool_calls": [{ "type": "web_search", "function": { "arguments": { "items": [] } } }]
                }
            }]
        });
        assert_eq!(text_of(body).as_deref(), Some(r#"{"items":[]}"#));
    }

    #[test]
    fn later_choice_is_used_when_earlier_is_empty() {
        let body = json!({
            "choices": [
                { "message": { "content": "" } },
                { "finish_reason": "stop" },
                { "message": { "content": "second" } }
            ]
        });
        assert_eq!(text_of(body).as_deref(), Some("second"));
    }

    #[test]
    fn output_string_is_used_when_choices_are_empty() {
        let body = json!({ "choices": [{ "message": { "content": "" } }], "output": "plain" });
        assert_eq!(text_of(body).as_deref(), Some("plain"));
    }

    #[test]
    fn output_blocks_are_scanned_in_order() {
        let body = json!({
            "output": [
                { "type": "web_search_call", "status": "completed" },
                {
                    "type": "message",
                    "content": [
                        { "type": "reasoning", "text": "skip me" },
                        { "type": "output_text", "text": "answer" }
                    ]
                }
            ]
        });
        assert_eq!(text_of(body).as_deref(), Some("answer"));

        let body = json!({ "output": [{ "text": "" }, "bare string"] });
        assert_eq!(text_of(body).as_deref(), Some("bare string"));

        let body = json!({ "output": [{ "type": "summary", "text": "texty" }] });
        assert_eq!(text_of(body).as_deref(), Some("texty"));
    }

    #[test]
    fn no_text_anywhere() {
        assert_eq!(text_of(json!({})), None);
        assert_eq!(text_of(json!({ "output": [] })), None);
        assert_eq!(text_of(json!({ "web_search": [] })), None);
    }

    #[test]
    fn embedded_json_is_found_inside_prose() {
        let text = r#"Here you go: {"items": [{"url": "https://reddit.com/r/a/comments/1/x"}]} Hope it helps!"#;
        let items = items_from_text(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["url"], "https://reddit.com/r/a/comments/1/x");
    }

    #[test]
    fn embedded_json_spans_code_fences_and_newlines() {
        let text = "```json\n{\n  \"items\": [\n    {\"title\": \"a\"},\n    {\"title\": \"b\"}\n  ]\n}\n```";
        assert_eq!(items_from_text(text).len(), 2);
    }

    #[test]
    fn malformed_embedded_json_is_none() {
        assert!(extract_embedded_json(r#"{"items": [ {"title": "x", } "#).is_none());
        assert!(extract_embedded_json(r#"{"items": [1, 2] } trailing } brace"#).is_none());
        assert!(extract_embedded_json("no json at all").is_none());
        assert!(items_from_text(r#"{"things": []}"#).is_empty());
    }

    #[test]
    fn non_array_items_yield_nothing() {
        assert!(items_from_text(r#"{"items": {"url": "https://reddit.com/r/a/comments/1"}}"#).is_empty());
        assert!(items_from_text(r#"{"items": null}"#).is_empty());
    }

    #[test]
    fn thread_link_yields_regex_and_link_candidates() {
        let hits = vec![json!({
            "link": "https://www.reddit.com/r/foo/comments/xyz/bar/",
            "title": "Bar",
            "content": "short",
            "publish_date": "2024-02-03"
        })];
        let out = candidates_from_web_search(&hits);
        assert_eq!(out.len(), 2);
        for c in &out {
            assert_eq!(c["url"], "https://www.reddit.com/r/foo/comments/xyz/bar");
            assert_eq!(c["subreddit"], "foo");
            assert_eq!(c["relevance"], 0.7);
            assert_eq!(c["date"], "2024-02-03");
            assert_eq!(c["title"], "Bar");
        }
    }

    #[test]
    fn thread_urls_in_content_are_found() {
        let hits = vec![json!({
            "link": "https://example.com/roundup",
            "content": "see https://reddit.com/r/rust/comments/abc/async_pain and \"https://www.reddit.com/r/golang/comments/def/\" too"
        })];
        let out = candidates_from_web_search(&hits);
        let urls: Vec<&str> = out.iter().filter_map(|c| c["url"].as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://reddit.com/r/rust/comments/abc/async_pain",
                "https://www.reddit.com/r/golang/comments/def"
            ]
        );
        assert_eq!(out[0]["subreddit"], "rust");
        assert_eq!(out[1]["subreddit"], "golang");
        assert!(out[0]["date"].is_null());
    }

    #[test]
    fn why_relevant_is_capped_at_200_chars() {
        let content = format!("https://reddit.com/r/a/comments/b/c {}", "é".repeat(300));
        let out = candidates_from_web_search(&[json!({ "content": content })]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["why_relevant"].as_str().unwrap().chars().count(), 200);
    }

    #[test]
    fn non_object_hits_and_non_thread_links_are_skipped() {
        let hits = vec![
            json!("https://reddit.com/r/a/comments/b"),
            json!({ "link": "https://www.reddit.com/r/rust/", "content": "subreddit home" }),
            json!({ "link": null, "content": null }),
        ];
        assert!(candidates_from_web_search(&hits).is_empty());
    }
}
