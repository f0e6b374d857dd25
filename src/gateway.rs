// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Client for the hosted LLM gateway (OpenAI-compatible chat completions)

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::analysis::{parse_reply, Analysis, AnalysisRequest, AnalysisType, MoodSource};
use crate::config::{GatewayConfig, PromptConfig};
use crate::{MindflowError, Result};

/// AI gateway client
pub struct GatewayClient {
    client: Client,
    url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    prompts: PromptConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Map a non-success gateway status to the error surfaced to users
pub fn status_error(status: StatusCode) -> MindflowError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => MindflowError::RateLimited,
        StatusCode::PAYMENT_REQUIRED => MindflowError::CreditsExhausted,
        _ => MindflowError::Analysis(format!("gateway returned status {}", status)),
    }
}

impl GatewayClient {
    /// Create a client; fails when no API key is configured
    pub fn new(config: &GatewayConfig, prompts: &PromptConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| MindflowError::GatewayUnavailable("no API key configured".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            prompts: prompts.clone(),
        })
    }

    /// Check the gateway answers at all
    pub async fn health_check(&self) -> Result<()> {
        let base = self.url.trim_end_matches("/chat/completions");
        let url = format!("{}/models", base);

        let response = self.client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                MindflowError::GatewayUnavailable(format!("Cannot connect to gateway at {}: {}", base, e))
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(MindflowError::GatewayUnavailable(
                "gateway rejected the API key".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn messages(&self, request: &AnalysisRequest) -> Result<Vec<ChatMessage>> {
        let messages = match request.kind {
            AnalysisType::Facial => {
                let image = request.image_base64.as_deref().ok_or_else(|| {
                    MindflowError::invalid("imageBase64", "imageBase64 is required for facial analysis")
                })?;
                vec![
                    ChatMessage { role: "system", content: MessageContent::Text(self.prompts.facial.clone()) },
                    ChatMessage {
                        role: "user",
                        content: MessageContent::Parts(vec![
                            ContentPart::Text {
                                text: "Please analyze this person's facial expression and determine their emotional state."
                                    .to_string(),
                            },
                            ContentPart::ImageUrl {
                                image_url: ImageUrl { url: format!("data:image/jpeg;base64,{}", image) },
                            },
                        ]),
                    },
                ]
            }
            AnalysisType::Journal | AnalysisType::Chat => {
                let input = request.user_input.clone().ok_or_else(|| {
                    MindflowError::invalid("userInput", format!("userInput is required for {} analysis", request.kind))
                })?;
                let system = if request.kind == AnalysisType::Journal {
                    &self.prompts.journal
                } else {
                    &self.prompts.chat
                };
                vec![
                    ChatMessage { role: "system", content: MessageContent::Text(system.clone()) },
                    ChatMessage { role: "user", content: MessageContent::Text(input) },
                ]
            }
        };
        Ok(messages)
    }

    /// Send one completion request and return the reply text
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };

        debug!("Sending request to gateway: model={}", self.model);

        let response = self.client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::PAYMENT_REQUIRED {
                let body = response.text().await.unwrap_or_default();
                error!("AI gateway error: {} {}", status, body);
            }
            return Err(status_error(status));
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| MindflowError::Analysis("gateway reply had no content".to_string()))
    }
}

#[async_trait]
impl MoodSource for GatewayClient {
    fn name(&self) -> &'static str {
        "gateway"
    }

    fn can_handle(&self, _kind: AnalysisType) -> bool {
        true
    }

    fn priority(&self) -> u8 {
        100 // Preferred whenever configured
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis> {
        let messages = self.messages(request)?;
        let content = self.complete(messages).await?;
        Ok(parse_reply(request.kind, &content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::Mood;
    use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct Fake {
        status: StatusCode,
        content: &'static str,
        seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn completions(
        State(fake): State<Fake>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        fake.seen.lock().unwrap().push((auth, body));
        let reply = json!({"choices": [{"message": {"role": "assistant", "content": fake.content}}]});
        (fake.status, Json(reply))
    }

    async fn spawn_gateway(fake: Fake) -> String {
        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn client_for(url: String) -> GatewayClient {
        let config = GatewayConfig {
            url,
            api_key: Some("test-key".to_string()),
            timeout_secs: 5,
            ..GatewayConfig::default()
        };
        GatewayClient::new(&config, &PromptConfig::default()).unwrap()
    }

    fn fake(status: StatusCode, content: &'static str) -> Fake {
        Fake { status, content, seen: Arc::new(Mutex::new(Vec::new())) }
    }

    #[test]
    fn test_requires_api_key() {
        let result = GatewayClient::new(&GatewayConfig::default(), &PromptConfig::default());
        assert!(matches!(result, Err(MindflowError::GatewayUnavailable(_))));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(StatusCode::TOO_MANY_REQUESTS), MindflowError::RateLimited));
        assert!(matches!(status_error(StatusCode::PAYMENT_REQUIRED), MindflowError::CreditsExhausted));
        assert!(matches!(status_error(StatusCode::BAD_GATEWAY), MindflowError::Analysis(_)));
    }

    #[tokio::test]
    async fn test_facial_request_and_reply() {
        let fake = fake(
            StatusCode::OK,
            "```json\n{\"mood\": \"calm\", \"confidence\": 72, \"insight\": \"Relaxed\", \"suggestion\": \"Stretch\"}\n```",
        );
        let seen = fake.seen.clone();
        let client = client_for(spawn_gateway(fake).await);

        let analysis = client.analyze(&AnalysisRequest::facial("aGVsbG8=")).await.unwrap();
        assert_eq!(analysis.mood(), Some(Mood::Calm));

        let seen = seen.lock().unwrap();
        let (auth, body) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer test-key"));
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,aGVsbG8="
        );
    }

    #[tokio::test]
    async fn test_chat_reply_passes_text() {
        let client = client_for(spawn_gateway(fake(StatusCode::OK, "Breathe in slowly 🌿")).await);
        let analysis = client
            .analyze(&AnalysisRequest::text(AnalysisType::Chat, "I feel stressed"))
            .await
            .unwrap();
        assert_eq!(analysis, Analysis::Reply { response: "Breathe in slowly 🌿".to_string() });
    }

    #[tokio::test]
    async fn test_rate_limit_and_quota_surface() {
        let client = client_for(spawn_gateway(fake(StatusCode::TOO_MANY_REQUESTS, "")).await);
        let err = client
            .analyze(&AnalysisRequest::text(AnalysisType::Journal, "today was long"))
            .await
            .unwrap_err();
        assert!(matches!(err, MindflowError::RateLimited));

        let client = client_for(spawn_gateway(fake(StatusCode::PAYMENT_REQUIRED, "")).await);
        let err = client
            .analyze(&AnalysisRequest::text(AnalysisType::Journal, "today was long"))
            .await
            .unwrap_err();
        assert!(matches!(err, MindflowError::CreditsExhausted));
    }

    #[tokio::test]
    async fn test_server_error_is_generic_failure() {
        let client = client_for(spawn_gateway(fake(StatusCode::INTERNAL_SERVER_ERROR, "")).await);
        let err = client
            .analyze(&AnalysisRequest::text(AnalysisType::Chat, "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, MindflowError::Analysis(_)));
        assert!(!err.is_quota());
    }
}
