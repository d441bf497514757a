use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::HuntError;

/// Swappable decision backend for the review/scoring stages. The pipeline
/// only ever sends a prompt and parses the completion, so the deterministic
/// stages stay testable against a canned implementation.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

// --- Groq provider (OpenAI-compatible chat API) ---

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug)]
pub struct GroqProvider {
    api_key: String,
    model_id: String,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn from_env() -> Result<Self, HuntError> {
        let api_key = env::var("GROQ_API_KEY").map_err(|_| {
            HuntError::Config(
                "GROQ_API_KEY environment variable not set. \
                 Set it with: export GROQ_API_KEY=your-key-here"
                    .to_string(),
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| HuntError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key,
            model_id: DEFAULT_MODEL.to_string(),
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for GroqProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = ChatRequest {
            model: self.model_id.clone(),
            max_tokens,
            temperature: 0.1,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(GROQ_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Groq API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Groq API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse Groq API response")?;

        api_response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("No choices in Groq API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Completion parsing helpers ---

/// Slice out the first `{` ... last `}` block from a completion that may
/// carry prose or markdown fences around the JSON.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Same, for a bare JSON array.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_fenced_completion() {
        let text = "Here you go:\n```json\n{\"scores\": [80, 75]}\n```";
        assert_eq!(extract_json_object(text), Some("{\"scores\": [80, 75]}"));
    }

    #[test]
    fn extracts_array_from_prose() {
        let text = "keywords: [\"react\", \"node\"] hope that helps";
        assert_eq!(extract_json_array(text), Some("[\"react\", \"node\"]"));
    }

    #[test]
    fn extraction_handles_missing_json() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_array("}{ backwards"), None);
    }

    #[test]
    fn groq_provider_requires_api_key() {
        let original = env::var("GROQ_API_KEY").ok();
        unsafe {
            env::remove_var("GROQ_API_KEY");
        }

        let result = GroqProvider::from_env();

        if let Some(val) = original {
            unsafe {
                env::set_var("GROQ_API_KEY", val);
            }
        }

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("GROQ_API_KEY"));
    }
}
