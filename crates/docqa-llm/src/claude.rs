use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{GenerationParams, LlmProvider, Message, Role};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client. Chat only: Claude has no embedding endpoint.
pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl fmt::Debug for ClaudeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaudeProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl Clone for ClaudeProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
        }
    }
}

impl ClaudeProvider {
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_owned(),
            model,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }
}

impl LlmProvider for ClaudeProvider {
    async fn chat(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<String, LlmError> {
        let (system, chat_messages) = split_messages(messages);
        let body = RequestBody {
            model: &self.model,
            max_tokens: params.max_tokens,
            system: system.as_deref(),
            messages: &chat_messages,
            temperature: params.temperature,
            top_p: params.top_p,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("Claude API error {status}: {text}");
            return Err(LlmError::Api {
                provider: "claude".into(),
                status: status.as_u16(),
            });
        }

        let resp: ApiResponse = serde_json::from_str(&text)?;
        let answer: String = resp
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();

        if answer.is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: "claude".into(),
            });
        }
        Ok(answer)
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Err(LlmError::EmbedUnsupported {
            provider: "claude".into(),
        })
    }

    fn supports_embeddings(&self) -> bool {
        false
    }

    fn embedding_model(&self) -> Option<&str> {
        None
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "claude"
    }
}

/// System messages go into the top-level `system` field; the rest stay in order.
fn split_messages(messages: &[Message]) -> (Option<String>, Vec<ApiMessage<'_>>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let chat = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| ApiMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect();
    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, chat)
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ApiMessage<'a>],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(base_url: &str) -> ClaudeProvider {
        ClaudeProvider::new(
            reqwest::Client::new(),
            "key".into(),
            "claude-sonnet-4-5".into(),
        )
        .with_base_url(base_url)
    }

    #[test]
    fn split_messages_extracts_system() {
        let msgs = [Message::system("be brief"), Message::user("hi")];
        let (system, chat) = split_messages(&msgs);
        assert_eq!(system.as_deref(), Some("be brief"));
        assert_eq!(chat.len(), 1);
        assert_eq!(chat[0].role, "user");
    }

    #[test]
    fn split_messages_without_system() {
        let msgs = [Message::user("hi")];
        let (system, chat) = split_messages(&msgs);
        assert!(system.is_none());
        assert_eq!(chat.len(), 1);
    }

    #[test]
    fn debug_redacts_api_key() {
        let debug = format!("{:?}", provider(DEFAULT_BASE_URL));
        assert!(!debug.contains("\"key\""));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn chat_joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(serde_json::json!({"max_tokens": 512})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    {"type": "text", "text": "Hello, "},
                    {"type": "text", "text": "world"}
                ]
            })))
            .mount(&server)
            .await;

        let answer = provider(&server.uri())
            .chat(&[Message::user("hi")], &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(answer, "Hello, world");
    }

    #[tokio::test]
    async fn chat_error_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let result = provider(&server.uri())
            .chat(&[Message::user("hi")], &GenerationParams::default())
            .await;
        assert!(matches!(result, Err(LlmError::Api { status: 401, .. })));
    }

    #[tokio::test]
    async fn embed_is_unsupported() {
        let p = provider(DEFAULT_BASE_URL);
        assert!(!p.supports_embeddings());
        assert!(matches!(
            p.embed("x").await,
            Err(LlmError::EmbedUnsupported { .. })
        ));
    }
}
