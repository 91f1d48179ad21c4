#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Conversation transcript sent with every request. Model replies are stored
/// exactly as received, before any display rewriting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: &str) {
        self.messages.push(ChatMessage::user(text));
    }

    pub fn push_model(&mut self, text: &str) {
        self.messages.push(ChatMessage::model(text));
    }

    /// Drops the trailing user message of a turn that got no reply.
    pub fn pop_last_user(&mut self) -> Option<ChatMessage> {
        match self.messages.last() {
            Some(message) if message.role == Role::User => self.messages.pop(),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn recent(&self, limit: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| message.role == Role::Model)
            .count()
    }
}
