//! AI Gateway: forwards one user message to an OpenRouter-compatible
//! `/chat/completions` endpoint and normalizes every failure into [`Error`].
//!
//! One attempt per call, bounded by `ai.timeout_ms`. No retry. The credential is
//! scrubbed from every diagnostic string this module produces.

use crate::config::AiConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const MAX_DETAIL_CHARS: usize = 500;
const REDACTED: &str = "[REDACTED]";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// Every level optional: a missing field is a protocol error, not a decode error.
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessageResponse>,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Pulls the completion text out of a 2xx body.
fn extract_completion(body: &str) -> std::result::Result<String, String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| format!("undecodable response body: {}", e))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| "no completion text at choices[0].message.content".to_string())
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_DETAIL_CHARS).collect();
    cut.push('…');
    cut
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Chat proxy to the upstream provider.
pub struct AiGateway {
    client: reqwest::Client,
    config: AiConfig,
}

impl AiGateway {
    pub fn new(config: AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("http client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.credential().is_some()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Replaces every occurrence of the credential, then caps the length.
    fn scrub(&self, text: &str) -> String {
        match self.config.credential() {
            Some(key) => truncate(&text.replace(key, REDACTED)),
            None => truncate(text),
        }
    }

    /// Sends `message` upstream verbatim and returns the completion text.
    pub async fn chat(&self, message: &str) -> Result<String> {
        if message.trim().is_empty() {
            return Err(Error::invalid_input("Message is required"));
        }
        let Some(key) = self.config.credential() else {
            tracing::warn!("[AI] Chat rejected: no upstream credential configured");
            return Err(Error::Configuration(
                "no upstream credential configured".to_string(),
            ));
        };

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: message,
            }],
            max_tokens: self.config.max_tokens,
        };

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_failure(e))?;

        let status = res.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(res.headers());
            let text = res.text().await.unwrap_or_default();
            let err = self.status_failure(status.as_u16(), retry_after, &text);
            tracing::warn!(status = status.as_u16(), kind = err.kind(), "[AI] Upstream error: {}", err);
            return Err(err);
        }

        let text = res.text().await.map_err(|e| self.transport_failure(e))?;
        match extract_completion(&text) {
            Ok(reply) => {
                tracing::info!(model = %self.config.model, chars = reply.chars().count(), "[AI] Completion received");
                Ok(reply)
            }
            Err(detail) => {
                let err = Error::UpstreamProtocol(self.scrub(&detail));
                tracing::warn!(kind = err.kind(), "[AI] {}", err);
                Err(err)
            }
        }
    }

    fn transport_failure(&self, e: reqwest::Error) -> Error {
        let err = if e.is_timeout() {
            Error::Timeout {
                budget: self.config.timeout(),
            }
        } else {
            // Connect errors and anything else before a status line: unreachable.
            Error::UpstreamUnavailable {
                status: None,
                detail: self.scrub(&e.to_string()),
            }
        };
        tracing::warn!(kind = err.kind(), "[AI] Transport failure: {}", err);
        err
    }

    fn status_failure(&self, status: u16, retry_after: Option<u64>, body: &str) -> Error {
        match status {
            // Upstream detail is withheld entirely; it may echo the credential.
            401 | 403 => Error::Configuration(format!(
                "upstream rejected the configured credential (status {})",
                status
            )),
            429 => Error::RateLimited {
                retry_after,
                detail: format!("status 429: {}", self.scrub(body)),
            },
            _ => Error::UpstreamUnavailable {
                status: Some(status),
                detail: format!("status {}: {}", status, self.scrub(body)),
            },
        }
    }
}
