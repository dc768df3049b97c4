use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ChatEndpointConfig;
use crate::error::{Result, TabiError};
use super::{ChatClient, ChatMessage};

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub content: Option<String>,
}

impl ChatResponse {
    /// Content of the first choice
    pub fn into_content(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TabiError::Rewrite("Response contained no reply".to_string()))
    }
}

/// Bearer-authenticated client for `POST {endpoint}/chat/completions`
pub struct ChatCompletionsClient {
    client: Client,
    config: ChatEndpointConfig,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(config: ChatEndpointConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config, api_key })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatClient for ChatCompletionsClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
        };

        let url = self.url();
        debug!("Sending chat request with {} messages to: {}", messages.len(), url);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TabiError::Rewrite(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TabiError::Rewrite(format!(
                "Chat API error {}: {}", status, error_text
            )));
        }

        let body = response.text().await
            .map_err(|e| TabiError::Rewrite(format!("Failed to read response: {}", e)))?;
        debug!("Raw chat response: {}", body);

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| TabiError::Rewrite(format!("Failed to parse response: {}", e)))?;

        parsed.into_content()
    }
}
