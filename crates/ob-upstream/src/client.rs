//! Single-shot and streaming HTTP caller for the OpenRouter-style Chat
//! Completions backend.
//!
//! Handles auth-header construction, JSON-body building, and
//! status-code-to-domain-error mapping, plus retry, field degradation, and
//! transparent empty-completion retry.

use std::time::Duration;

use serde_json::Value;

use ob_domain::config::{TranslationConfig, UpstreamConfig};
use ob_domain::error::{Error, Result};

use crate::backoff::{is_retriable_status, RetryPolicy};
use crate::sse::{sse_response_stream, BoxStream, SseFrame};

pub struct UpstreamClient {
    base_url: String,
    bearer_token: String,
    attribution_headers: Vec<(String, String)>,
    client: reqwest::Client,
    retry_policy: RetryPolicy,
    degrade_fields: Vec<String>,
    request_timeout: Duration,
}

/// Result of a single-shot (non-streaming) upstream call.
pub struct UpstreamResponse {
    pub body: Value,
    pub upstream_request_id: Option<String>,
}

impl UpstreamClient {
    pub fn new(upstream: &UpstreamConfig, translation: &TranslationConfig, bearer_token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(upstream.request_timeout_s))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: upstream.base_url.trim_end_matches('/').to_string(),
            bearer_token,
            attribution_headers: upstream
                .attribution_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            client,
            retry_policy: RetryPolicy::from_config(translation),
            degrade_fields: translation.degrade_fields.clone(),
            request_timeout: Duration::from_secs_f64(upstream.request_timeout_s),
        })
    }

    fn post(&self) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.bearer_token)
            .header("Content-Type", "application/json");
        for (k, v) in &self.attribution_headers {
            builder = builder.header(k, v);
        }
        builder
    }

    /// Single-shot call with retry, timeout, field-degradation, and
    /// empty-completion-retry policy applied.
    pub async fn call(&self, mut payload: Value) -> Result<UpstreamResponse> {
        let deadline = tokio::time::Instant::now() + self.request_timeout.max(self.retry_policy.max_total);
        let mut attempt = 0u32;
        // Never reassigned: the field-degradation branch below returns
        // directly instead of looping back, since a degrade-retry failure
        // must surface without further retries (spec: "any subsequent
        // failure surfaces directly").
        let degraded = false;

        loop {
            let send_result = tokio::time::timeout_at(deadline, self.post().json(&payload).send()).await;

            let resp = match send_result {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => {
                    if self.retry_policy.should_give_up(attempt) {
                        return Err(from_reqwest(e));
                    }
                    tokio::time::sleep(self.retry_policy.delay_for_attempt(attempt)).await;
                    attempt += 1;
                    continue;
                }
                Err(_) => return Err(Error::Timeout("upstream call deadline exceeded".into())),
            };

            let status = resp.status();
            let upstream_request_id = resp
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            if status.is_success() {
                let body: Value = resp.json().await.map_err(from_reqwest)?;

                if !degraded && is_empty_completion(&body, &payload) {
                    // Empty-completion retry: exactly once.
                    let retry_resp = self.post().json(&payload).send().await.map_err(from_reqwest)?;
                    let retry_status = retry_resp.status();
                    if !retry_status.is_success() {
                        return Err(Error::BadGateway("empty completion on retry".into()));
                    }
                    let retry_body: Value = retry_resp.json().await.map_err(from_reqwest)?;
                    if is_empty_completion(&retry_body, &payload) {
                        return Err(Error::BadGateway("upstream returned an empty completion twice".into()));
                    }
                    return Ok(UpstreamResponse {
                        body: retry_body,
                        upstream_request_id,
                    });
                }

                return Ok(UpstreamResponse {
                    body,
                    upstream_request_id,
                });
            }

            let status_code = status.as_u16();
            let text = resp.text().await.unwrap_or_default();

            // Field degradation: a 4xx referencing a known-fragile field is
            // retried exactly once with that field stripped; any failure on
            // that retry surfaces directly, bypassing the normal retry loop.
            if !degraded && (400..500).contains(&status_code) {
                if let Some(field) = self.degrade_fields.iter().find(|f| text.contains(f.as_str())) {
                    tracing::warn!(field = %field, "upstream rejected field, degrading and retrying once");
                    if let Value::Object(map) = &mut payload {
                        map.remove(field.as_str());
                    }

                    let retry_resp = self.post().json(&payload).send().await.map_err(from_reqwest)?;
                    let retry_status = retry_resp.status();
                    if !retry_status.is_success() {
                        let retry_text = retry_resp.text().await.unwrap_or_default();
                        return Err(Error::Upstream(format!(
                            "HTTP {} - {retry_text}",
                            retry_status.as_u16()
                        )));
                    }
                    let retry_upstream_request_id = retry_resp
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    let retry_body: Value = retry_resp.json().await.map_err(from_reqwest)?;

                    if is_empty_completion(&retry_body, &payload) {
                        return Err(Error::BadGateway(
                            "upstream returned an empty completion after field degradation".into(),
                        ));
                    }

                    return Ok(UpstreamResponse {
                        body: retry_body,
                        upstream_request_id: retry_upstream_request_id,
                    });
                }
            }

            if is_retriable_status(status_code) && !self.retry_policy.should_give_up(attempt) {
                tokio::time::sleep(self.retry_policy.delay_for_attempt(attempt)).await;
                attempt += 1;
                continue;
            }

            return Err(Error::Upstream(format!("HTTP {status_code} - {text}")));
        }
    }

    /// Streaming call. Retries apply only before headers are received;
    /// once the stream starts yielding frames, upstream errors surface as a
    /// stream item, never a silent retry.
    pub async fn call_stream(&self, payload: Value) -> Result<BoxStream<'static, Result<SseFrame>>> {
        let mut attempt = 0u32;
        loop {
            let send_result = self.post().json(&payload).send().await;
            let resp = match send_result {
                Ok(r) => r,
                Err(e) => {
                    if self.retry_policy.should_give_up(attempt) {
                        return Err(from_reqwest(e));
                    }
                    tokio::time::sleep(self.retry_policy.delay_for_attempt(attempt)).await;
                    attempt += 1;
                    continue;
                }
            };

            let status = resp.status();
            if !status.is_success() {
                let status_code = status.as_u16();
                let text = resp.text().await.unwrap_or_default();
                if is_retriable_status(status_code) && !self.retry_policy.should_give_up(attempt) {
                    tokio::time::sleep(self.retry_policy.delay_for_attempt(attempt)).await;
                    attempt += 1;
                    continue;
                }
                return Err(Error::Upstream(format!("HTTP {status_code} - {text}")));
            }

            let upstream_request_id = resp
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            tracing::debug!(upstream_request_id = ?upstream_request_id, "streaming call to upstream opened");

            return Ok(sse_response_stream(resp));
        }
    }
}

/// A 200 response with empty `choices`, or a message with no content and no
/// tool calls, is treated as an empty completion — but only when the request
/// actually bounded the output (`max_tokens > 0`); an unbounded request that
/// legitimately produces nothing is not retried.
fn is_empty_completion(body: &Value, payload: &Value) -> bool {
    let max_tokens_positive = payload.get("max_tokens").and_then(Value::as_u64).unwrap_or(0) > 0;
    if !max_tokens_positive {
        return false;
    }

    let choices = match body.get("choices").and_then(Value::as_array) {
        Some(c) => c,
        None => return true,
    };
    if choices.is_empty() {
        return true;
    }
    let message = match choices[0].get("message") {
        Some(m) => m,
        None => return true,
    };
    let no_content = message
        .get("content")
        .map(|c| c.is_null() || c.as_str() == Some(""))
        .unwrap_or(true);
    let no_tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|a| a.is_empty())
        .unwrap_or(true);
    no_content && no_tool_calls
}

pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_choices_is_empty_completion() {
        let payload = json!({"max_tokens": 256});
        assert!(is_empty_completion(&json!({"choices": []}), &payload));
    }

    #[test]
    fn contentless_no_tool_calls_is_empty_completion() {
        let payload = json!({"max_tokens": 256});
        let body = json!({"choices": [{"message": {"content": null}}]});
        assert!(is_empty_completion(&body, &payload));
    }

    #[test]
    fn content_present_is_not_empty_completion() {
        let payload = json!({"max_tokens": 256});
        let body = json!({"choices": [{"message": {"content": "hi"}}]});
        assert!(!is_empty_completion(&body, &payload));
    }

    #[test]
    fn tool_calls_present_is_not_empty_completion() {
        let payload = json!({"max_tokens": 256});
        let body = json!({"choices": [{"message": {"content": null, "tool_calls": [{"id": "c1"}]}}]});
        assert!(!is_empty_completion(&body, &payload));
    }

    #[test]
    fn unbounded_request_is_never_treated_as_empty_completion() {
        let payload = json!({});
        let body = json!({"choices": []});
        assert!(!is_empty_completion(&body, &payload));
    }

    #[test]
    fn zero_max_tokens_is_never_treated_as_empty_completion() {
        let payload = json!({"max_tokens": 0});
        let body = json!({"choices": [{"message": {"content": null}}]});
        assert!(!is_empty_completion(&body, &payload));
    }
}
