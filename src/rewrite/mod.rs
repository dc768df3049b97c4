// Language-model text services
//
// - Client: OpenAI-compatible chat completions over HTTP
// - Rewriter: turns terse segments into narration, one conversation per run
// - Translator: stateless one-shot translation

pub mod common;
pub mod client;
pub mod rewriter;
pub mod translator;

use async_trait::async_trait;

pub use common::*;
pub use rewriter::TextRewriter;
pub use translator::Translator;

use crate::config::ChatEndpointConfig;
use crate::error::Result;

/// A chat-completions capable service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send the full message history and return the single generated reply
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Factory for creating chat clients
pub struct ChatClientFactory;

impl ChatClientFactory {
    /// Create the HTTP client for an endpoint, reading its credential from the environment
    pub fn create_client(config: &ChatEndpointConfig) -> Result<Box<dyn ChatClient>> {
        let api_key = config.api_key()?;
        Ok(Box::new(client::ChatCompletionsClient::new(config.clone(), api_key)?))
    }
}
