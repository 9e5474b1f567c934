use crate::request::{SearchParams, ZAI_CHAT_URL};
use crate::response::is_truthy;
use redscout_core::{Error, Result, SearchRequest, Transport};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub const DEFAULT_MODEL: &str = "glm-4.7";

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn zai_api_key_from_env() -> Option<String> {
    env("REDSCOUT_ZAI_API_KEY").or_else(|| env("ZAI_API_KEY"))
}

fn zai_model_from_env() -> Option<String> {
    env("REDSCOUT_ZAI_MODEL")
}

fn zai_endpoint_from_env() -> Option<String> {
    env("REDSCOUT_ZAI_ENDPOINT")
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ZaiTransport {
    client: reqwest::Client,
}

impl ZaiTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ZaiTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait::async_trait]
impl Transport for ZaiTransport {
    async fn post(
        &self,
        url: &str,
        payload: &Value,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Value> {
        let t0 = Instant::now();
        let mut rb = self.client.post(url).timeout(timeout);
        for (k, v) in headers {
            rb = rb.header(k.as_str(), v.as_str());
        }

        let resp = rb
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = resp.status();

        let body: Value = match resp.json().await {
            Ok(v) => v,
            Err(_) if !status.is_success() => {
                return Err(Error::Transport(format!(
                    "zai chat.completions HTTP {status}"
                )));
            }
            Err(e) => return Err(Error::Transport(e.to_string())),
        };

        // Error bodies carrying a truthy `error` go back to the interpreter, which reports them.
        if !status.is_success() && !body.get("error").is_some_and(is_truthy) {
            return Err(Error::Transport(format!(
                "zai chat.completions HTTP {status}"
            )));
        }

        tracing::debug!(
            status = status.as_u16(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "zai chat.completions"
        );
        Ok(body)
    }
}

/// Credentials and endpoint for the Z.AI service, resolved from the environment.
#[derive(Debug, Clone)]
pub struct ZaiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: Option<String>,
}

impl ZaiConfig {
    pub fn from_env(
        model_override: Option<String>,
        endpoint_override: Option<String>,
    ) -> Result<Self> {
        let api_key = zai_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing REDSCOUT_ZAI_API_KEY (or ZAI_API_KEY)".to_string())
        })?;
        let model = model_override
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(zai_model_from_env)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let endpoint = endpoint_override
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(zai_endpoint_from_env);
        if let Some(ep) = endpoint.as_deref() {
            validate_endpoint(ep)?;
        }
        Ok(Self {
            api_key,
            model,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(ZAI_CHAT_URL)
    }

    pub fn search_params(&self, request: SearchRequest) -> SearchParams {
        SearchParams {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            request,
            base_url: self.endpoint.clone(),
        }
    }
}

pub fn validate_endpoint(endpoint: &str) -> Result<()> {
    let u = url::Url::parse(endpoint).map_err(|e| Error::InvalidUrl(format!("{endpoint}: {e}")))?;
    match u.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidUrl(format!(
            "{endpoint}: unsupported scheme {other}"
        ))),
    }
}
