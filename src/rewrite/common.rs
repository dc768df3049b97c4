use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Ordered message history of one generation run.
///
/// Seeded with a single system message; every processed segment adds exactly
/// one user and one assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    messages: Vec<ChatMessage>,
}

impl ConversationContext {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Result of rewriting one piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// The service produced a replacement
    Rewritten(String),
    /// The service failed; `text` is the untouched input
    Fallback { text: String, cause: String },
}

impl RewriteOutcome {
    /// The text to use downstream, whichever way the call went
    pub fn text(&self) -> &str {
        match self {
            Self::Rewritten(text) => text,
            Self::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Rewritten(text) => text,
            Self::Fallback { text, .. } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Strip the wrapping models like to add around a reply.
///
/// Returns `None` when nothing usable remains.
pub fn clean_reply(raw: &str) -> Option<String> {
    let mut text = raw.trim();

    // ```lang ... ``` fences
    if text.starts_with("```") && text.ends_with("```") && text.len() >= 6 {
        let inner = &text[3..text.len() - 3];
        // Drop an info string on the opening fence
        text = match inner.split_once('\n') {
            Some((first, rest)) if first.trim().chars().all(|c| c.is_ascii_alphanumeric()) => rest,
            _ => inner,
        };
        text = text.trim();
    }

    for (open, close) in [("\"", "\""), ("“", "”"), ("「", "」"), ("'", "'")] {
        if text.len() >= open.len() + close.len() && text.starts_with(open) && text.ends_with(close) {
            text = text[open.len()..text.len() - close.len()].trim();
            break;
        }
    }

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_context_starts_with_system_message() {
        let mut context = ConversationContext::new("be nice");
        context.push_user("a");
        context.push_assistant("b");
        assert_eq!(context.len(), 3);
        assert_eq!(context.messages()[0], ChatMessage::system("be nice"));
        assert_eq!(context.messages()[2].role, Role::Assistant);
    }

    #[test]
    fn test_outcome_text() {
        let fallback = RewriteOutcome::Fallback { text: "原句".into(), cause: "timeout".into() };
        assert_eq!(fallback.text(), "原句");
        assert!(fallback.is_fallback());
        assert_eq!(RewriteOutcome::Rewritten("新句".into()).into_text(), "新句");
    }

    #[test]
    fn test_clean_reply() {
        assert_eq!(clean_reply("  海边的日落真美  ").as_deref(), Some("海边的日落真美"));
        assert_eq!(clean_reply("\"Hello there\"").as_deref(), Some("Hello there"));
        assert_eq!(clean_reply("“看，夕阳！”").as_deref(), Some("看，夕阳！"));
        assert_eq!(clean_reply("```text\n大家好\n```").as_deref(), Some("大家好"));
        assert_eq!(clean_reply("```大家好```").as_deref(), Some("大家好"));
        assert_eq!(clean_reply("```第一句\n第二句```").as_deref(), Some("第一句\n第二句"));
        assert_eq!(clean_reply("   "), None);
        assert_eq!(clean_reply("\"\""), None);
    }
}
