pub const GREETING: &str = "Hello! I am your Battery AI. Ask me about SOH or battery health.";
pub const CHAT_ERROR_TEXT: &str = "Error connecting to AI.";
pub const PENDING_TEXT: &str = "Thinking...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        ChatTurn { role: ChatRole::User, text: text.into() }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        ChatTurn { role: ChatRole::Ai, text: text.into() }
    }
}

/// Append-only chat history. Starts with the assistant greeting.
#[derive(Debug, Clone)]
pub struct ChatTranscript {
    turns: Vec<ChatTurn>,
    pending: bool,
}

impl Default for ChatTranscript {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatTranscript {
    pub fn new() -> Self {
        ChatTranscript {
            turns: vec![ChatTurn::ai(GREETING)],
            pending: false,
        }
    }

    pub fn append(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }
}
