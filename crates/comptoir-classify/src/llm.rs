// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the folder-classification LLM.
//!
//! Speaks the plain chat-completions JSON shape with bearer
//! authentication, so any compatible provider endpoint works. One short
//! non-streaming completion per call; transient provider errors (429,
//! 500, 503, 529) are retried once after a pause.

use std::time::Duration;

use comptoir_core::{ComptoirError, metrics};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Pause before the single transient retry.
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// A chat-completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// One turn in a chat-completions exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    type_: Option<String>,
}

/// Client for one LLM endpoint.
///
/// Holds the authenticated connection pool and the configured model name.
/// Cheap to clone; all clones share the pool.
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    model: String,
    max_retries: u32,
    timeout: Duration,
    base_url: String,
}

impl LlmClient {
    /// Build a client for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// The key goes into a default `Authorization: Bearer` header marked
    /// sensitive so it never surfaces in logs.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ComptoirError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| ComptoirError::Config(format!("unusable LLM API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ComptoirError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model: model.to_string(),
            max_retries: 1,
            timeout,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Send one completion and return the assistant turn's text.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, ComptoirError> {
        let started = std::time::Instant::now();
        match self.complete_inner(request).await {
            Ok(text) => {
                metrics::record_llm_request(started.elapsed().as_secs_f64());
                Ok(text)
            }
            Err(e) => {
                metrics::record_llm_failure();
                Err(e)
            }
        }
    }

    async fn complete_inner(&self, request: &ChatRequest) -> Result<String, ComptoirError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion after transient provider error");
                tokio::time::sleep(RETRY_PAUSE).await;
            }

            let response = match self.client.post(&url).json(request).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    return Err(ComptoirError::Timeout {
                        duration: self.timeout,
                    });
                }
                Err(e) => {
                    return Err(ComptoirError::Transient {
                        message: format!("LLM request failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                }
            };

            let status = response.status();
            debug!(status = %status, attempt, "completion response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| ComptoirError::Provider {
                    message: format!("failed to read completion body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                let parsed: ChatResponse =
                    serde_json::from_str(&body).map_err(|e| ComptoirError::Provider {
                        message: format!("unparseable completion: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                let Some(choice) = parsed.choices.into_iter().next() else {
                    return Err(ComptoirError::Provider {
                        message: "completion carried no choices".to_string(),
                        source: None,
                    });
                };
                return Ok(choice.message.content);
            }

            if is_transient_status(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "transient provider error, will retry");
                last_error = Some(ComptoirError::Transient {
                    message: format!("provider returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            // Non-transient failure or retries exhausted.
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => match api_err.error.type_ {
                    Some(kind) => format!("provider error ({kind}): {}", api_err.error.message),
                    None => format!("provider error: {}", api_err.error.message),
                },
                Err(_) => format!("provider returned {status}: {body}"),
            };
            return Err(if is_transient_status(status) {
                ComptoirError::Transient {
                    message,
                    source: None,
                }
            } else {
                ComptoirError::Provider {
                    message,
                    source: None,
                }
            });
        }

        Err(last_error.unwrap_or_else(|| ComptoirError::Provider {
            message: "completion failed after retries".to_string(),
            source: None,
        }))
    }
}

/// HTTP status codes worth one retry.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> LlmClient {
        LlmClient::new(
            "test-key",
            "https://unused.example.invalid/v1",
            "small",
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url(base_url.to_string())
    }

    fn test_request(client: &LlmClient) -> ChatRequest {
        ChatRequest {
            model: client.model().to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "Bonjour".to_string(),
            }],
            max_tokens: 16,
        }
    }

    fn completion_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "cmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn complete_returns_assistant_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("f-devis")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let answer = client.complete(&test_request(&client)).await.unwrap();
        assert_eq!(answer, "f-devis");
    }

    #[tokio::test]
    async fn sends_bearer_and_json_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("NONE")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.complete(&test_request(&client)).await;
        assert!(result.is_ok(), "headers should match: {result:?}");
    }

    #[tokio::test]
    async fn retries_once_on_429() {
        let server = MockServer::start().await;
        let error_body = serde_json::json!({
            "error": {"type": "rate_limit_error", "message": "Rate limited"}
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(&error_body))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("after retry")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let answer = client.complete(&test_request(&client)).await.unwrap();
        assert_eq!(answer, "after retry");
    }

    #[tokio::test]
    async fn fails_fast_on_400() {
        let server = MockServer::start().await;
        let error_body = serde_json::json!({
            "error": {"type": "invalid_request_error", "message": "Unknown model"}
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(&error_body))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .complete(&test_request(&client))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("invalid_request_error"), "got: {err}");
    }

    #[tokio::test]
    async fn exhausts_retries_on_503() {
        let server = MockServer::start().await;
        let error_body = serde_json::json!({
            "error": {"type": "overloaded_error", "message": "Service overloaded"}
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(&error_body))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete(&test_request(&client)).await.unwrap_err();
        assert!(err.is_retryable(), "final 503 should stay retryable");
        assert!(err.to_string().contains("overloaded_error"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_choices_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "cmpl-2", "choices": []})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .complete(&test_request(&client))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("no choices"), "got: {err}");
    }
}
