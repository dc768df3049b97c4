use tracing::{info, warn};

use crate::config::TranslateConfig;
use super::{ChatClient, ChatMessage, RewriteOutcome, common::clean_reply};

/// Stateless single-call translator
pub struct Translator {
    client: Box<dyn ChatClient>,
    system_prompt: String,
    target_language: String,
}

impl Translator {
    pub fn new(client: Box<dyn ChatClient>, config: &TranslateConfig) -> Self {
        Self {
            client,
            system_prompt: config.system_instruction(),
            target_language: config.target_language.clone(),
        }
    }

    /// Translate `text`, falling back to the input on any failure
    pub async fn translate(&self, text: &str) -> RewriteOutcome {
        info!("Translating to {}: {}", self.target_language, text);

        let messages = [ChatMessage::system(self.system_prompt.clone()), ChatMessage::user(text)];

        match self.client.complete(&messages).await {
            Ok(reply) => match clean_reply(&reply) {
                Some(translation) => RewriteOutcome::Rewritten(translation),
                None => {
                    warn!("Translation came back empty, using original text");
                    RewriteOutcome::Fallback { text: text.to_string(), cause: "empty reply".to_string() }
                }
            },
            Err(e) => {
                warn!("Translation failed, using original text: {}", e);
                RewriteOutcome::Fallback { text: text.to_string(), cause: e.to_string() }
            }
        }
    }
}
