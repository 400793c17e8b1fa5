use async_trait::async_trait;
use parley_settings::AiCredentials;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Marker the model is instructed to prefix when the visitor should be
/// handed to a human
const TRANSFER_MARKER: &str = "[[TRANSFER]]";

#[derive(Error, Debug)]
pub enum AiEngineError {
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI response malformed: {0}")]
    Malformed(String),
}

/// Context handed to the engine for one visitor turn.
///
/// `tenant_id` and `brand_id` scope whatever knowledge the engine draws
/// on; engines must never mix answers across tenants.
#[derive(Debug, Clone)]
pub struct AiRequest {
    pub message: String,
    pub tenant_id: i32,
    pub brand_id: Option<i32>,
    pub visitor_name: String,
    pub current_page: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AiReply {
    pub response: String,
    pub confidence: f64,
    pub tokens_used: Option<i64>,
    /// The engine decided the visitor should talk to a human
    pub is_transfer_request: bool,
}

/// Generates one assistant reply per visitor message.
///
/// Implementations must not enforce their own deadline; the gate wraps
/// every call in a timeout.
#[async_trait]
pub trait AiEngine: Send + Sync {
    async fn generate(
        &self,
        credentials: &AiCredentials,
        request: &AiRequest,
    ) -> Result<AiReply, AiEngineError>;
}

/// Engine speaking the OpenAI-compatible chat-completions protocol
pub struct OpenAiChatEngine {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: Option<i64>,
}

impl Default for OpenAiChatEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiChatEngine {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn system_prompt(request: &AiRequest) -> String {
        let mut prompt = format!(
            "You are a helpful customer support assistant chatting with {}. \
             Answer briefly and concretely. If the visitor asks for a human \
             agent, or you cannot help, start your reply with {} followed by \
             a short sentence telling them they are being connected.",
            request.visitor_name, TRANSFER_MARKER
        );
        match request.brand_id {
            Some(brand_id) => prompt.push_str(&format!(
                " You answer only about brand {} of tenant {}.",
                brand_id, request.tenant_id
            )),
            None => prompt.push_str(&format!(
                " You answer only about tenant {}.",
                request.tenant_id
            )),
        }
        if let Some(page) = &request.current_page {
            prompt.push_str(&format!(" The visitor is currently on {}.", page));
        }
        prompt
    }

    /// End-user identifier sent upstream so completions are attributable
    /// to one tenant
    fn scope_tag(request: &AiRequest) -> String {
        match request.brand_id {
            Some(brand_id) => format!("tenant-{}-brand-{}", request.tenant_id, brand_id),
            None => format!("tenant-{}", request.tenant_id),
        }
    }
}

#[async_trait]
impl AiEngine for OpenAiChatEngine {
    async fn generate(
        &self,
        credentials: &AiCredentials,
        request: &AiRequest,
    ) -> Result<AiReply, AiEngineError> {
        let url = format!(
            "{}/chat/completions",
            credentials.base_url.trim_end_matches('/')
        );

        let body = json!({
            "model": credentials.model,
            "messages": [
                { "role": "system", "content": Self::system_prompt(request) },
                { "role": "user", "content": request.message },
            ],
            "max_tokens": 400,
            "user": Self::scope_tag(request),
        });

        debug!(model = %credentials.model, "calling chat completion endpoint");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credentials.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatCompletionResponse>()
            .await?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| AiEngineError::Malformed("no choices in response".to_string()))?
            .trim();

        let (text, is_transfer) = match content.strip_prefix(TRANSFER_MARKER) {
            Some(rest) => (rest.trim().to_string(), true),
            None => (content.to_string(), false),
        };

        Ok(AiReply {
            response: if text.is_empty() {
                "Let me connect you with one of our agents.".to_string()
            } else {
                text
            },
            confidence: 0.9,
            tokens_used: response.usage.and_then(|u| u.total_tokens),
            is_transfer_request: is_transfer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(brand_id: Option<i32>) -> AiRequest {
        AiRequest {
            message: "hi".to_string(),
            tenant_id: 7,
            brand_id,
            visitor_name: "Ada".to_string(),
            current_page: Some("/pricing".to_string()),
        }
    }

    #[test]
    fn test_system_prompt_mentions_visitor_and_page() {
        let prompt = OpenAiChatEngine::system_prompt(&request(None));
        assert!(prompt.contains("Ada"));
        assert!(prompt.contains("/pricing"));
        assert!(prompt.contains(TRANSFER_MARKER));
    }

    #[test]
    fn test_prompt_and_scope_tag_carry_tenant_and_brand() {
        let prompt = OpenAiChatEngine::system_prompt(&request(Some(3)));
        assert!(prompt.contains("brand 3"));
        assert!(prompt.contains("tenant 7"));
        assert_eq!(OpenAiChatEngine::scope_tag(&request(Some(3))), "tenant-7-brand-3");
        assert_eq!(OpenAiChatEngine::scope_tag(&request(None)), "tenant-7");
    }
}
