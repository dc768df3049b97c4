use tracing::{info, warn};

use crate::config::RewriteConfig;
use crate::segment::Segment;
use super::{ChatClient, ConversationContext, RewriteOutcome, common::clean_reply};

/// Rewrites narration segments inside one running conversation
pub struct TextRewriter {
    client: Box<dyn ChatClient>,
    system_prompt: String,
}

impl TextRewriter {
    pub fn new(client: Box<dyn ChatClient>, config: &RewriteConfig) -> Self {
        Self {
            client,
            system_prompt: config.system_instruction(),
        }
    }

    /// Fresh conversation seeded with the system instruction
    pub fn start_conversation(&self) -> ConversationContext {
        ConversationContext::new(self.system_prompt.clone())
    }

    /// Rewrite one segment against the accumulated conversation.
    ///
    /// The context always comes back two messages longer: the original text as
    /// the user turn and whatever text was kept (rewrite or original) as the
    /// assistant turn.
    pub async fn rewrite_segment(
        &self,
        mut context: ConversationContext,
        segment: &Segment,
    ) -> (ConversationContext, RewriteOutcome) {
        context.push_user(segment.text.clone());

        let outcome = match self.client.complete(context.messages()).await {
            Ok(reply) => match clean_reply(&reply) {
                Some(text) => RewriteOutcome::Rewritten(text),
                None => RewriteOutcome::Fallback {
                    text: segment.text.clone(),
                    cause: "empty reply".to_string(),
                },
            },
            Err(e) => RewriteOutcome::Fallback {
                text: segment.text.clone(),
                cause: e.to_string(),
            },
        };

        match &outcome {
            RewriteOutcome::Rewritten(text) => {
                info!("┌─ Segment {} rewritten ────────", segment.index);
                info!("│ Source: {}", segment.text);
                info!("│ Result: {}", text);
                info!("└─────────────────────────────────────");
            }
            RewriteOutcome::Fallback { cause, .. } => {
                warn!("┌─ Segment {} rewrite failed, keeping original ────────", segment.index);
                warn!("│ Source: {}", segment.text);
                warn!("│ Cause: {}", cause);
                warn!("└─────────────────────────────────────");
            }
        }

        context.push_assistant(outcome.text());
        (context, outcome)
    }

    /// Rewrite every segment in order within a single conversation
    pub async fn rewrite_all(&self, segments: &[Segment]) -> Vec<RewriteOutcome> {
        let mut context = self.start_conversation();
        let mut outcomes = Vec::with_capacity(segments.len());

        for segment in segments {
            let (next, outcome) = self.rewrite_segment(context, segment).await;
            context = next;
            outcomes.push(outcome);
        }

        outcomes
    }
}
