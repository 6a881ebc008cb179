//! # Session history
//!
//! Bounded per-session conversation history.
//!
//! A session holds at most [`MAX_HISTORY_MESSAGES`] messages (20 messages,
//! ten question/answer turns). History is append-only: each completed turn —
//! including a turn answered by the fallback text — appends exactly one
//! human/assistant pair, so the bound always truncates on a pair boundary.
//! Oldest messages are dropped first.

/// Maximum number of messages retained per session (10 turns).
pub const MAX_HISTORY_MESSAGES: usize = 20;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Human,
    Assistant,
}

impl Speaker {
    /// Role tag used for persistence ("human" / "assistant").
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Human => "human",
            Speaker::Assistant => "assistant",
        }
    }

    /// Capitalized label used in prompt assembly ("Human" / "Assistant").
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Human => "Human",
            Speaker::Assistant => "Assistant",
        }
    }

    /// Inverse of [`Speaker::as_str`]. Unknown tags yield `None`.
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "human" => Some(Speaker::Human),
            "assistant" => Some(Speaker::Assistant),
            _ => None,
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
}

impl ChatMessage {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            content: content.into(),
        }
    }
}

/// A completed question/answer exchange, ready to append to history.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnPair {
    pub question: String,
    pub answer: String,
}

impl TurnPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// The human/assistant message pair this turn contributes to history.
    pub fn into_messages(self) -> [ChatMessage; 2] {
        [
            ChatMessage::human(self.question),
            ChatMessage::assistant(self.answer),
        ]
    }
}

/// Ordered, bounded message history for a single session.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    messages: Vec<ChatMessage>,
    max_messages: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new(MAX_HISTORY_MESSAGES)
    }
}

impl SessionHistory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages,
        }
    }

    /// Append a completed turn (two messages) and enforce the bound.
    pub fn append(&mut self, turn: TurnPair) {
        self.messages.extend(turn.into_messages());
        self.truncate();
    }

    /// Replace the in-memory history, e.g. when restoring a persisted
    /// session. The bound is enforced on the restored messages.
    pub fn restore(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.truncate();
    }

    /// Drop oldest messages until at most `max_messages` remain.
    pub fn truncate(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Clear the history to empty.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// All retained messages, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appending_a_turn_adds_a_human_assistant_pair() {
        let mut history = SessionHistory::default();
        history.append(TurnPair::new("What is X?", "X is a thing."));

        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0], ChatMessage::human("What is X?"));
        assert_eq!(
            history.messages()[1],
            ChatMessage::assistant("X is a thing.")
        );
    }

    #[test]
    fn history_is_bounded_to_the_most_recent_twenty_messages() {
        let mut history = SessionHistory::default();
        for i in 0..11 {
            history.append(TurnPair::new(format!("q{i}"), format!("a{i}")));
        }

        assert_eq!(history.len(), MAX_HISTORY_MESSAGES);
        // The first turn fell off the front; the second turn leads.
        assert_eq!(history.messages()[0], ChatMessage::human("q1"));
        assert_eq!(history.messages()[19], ChatMessage::assistant("a10"));
    }

    #[test]
    fn truncation_stays_pair_aligned() {
        let mut history = SessionHistory::default();
        for i in 0..15 {
            history.append(TurnPair::new(format!("q{i}"), format!("a{i}")));
        }
        assert_eq!(history.len() % 2, 0);
        assert_eq!(history.messages()[0].speaker, Speaker::Human);
    }

    #[test]
    fn restore_applies_the_bound() {
        let mut history = SessionHistory::default();
        let messages: Vec<ChatMessage> = (0..30)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::human(format!("q{}", i / 2))
                } else {
                    ChatMessage::assistant(format!("a{}", i / 2))
                }
            })
            .collect();
        history.restore(messages);
        assert_eq!(history.len(), MAX_HISTORY_MESSAGES);
        assert_eq!(history.messages()[0], ChatMessage::human("q5"));
    }

    #[test]
    fn reset_empties_the_history() {
        let mut history = SessionHistory::default();
        history.append(TurnPair::new("q", "a"));
        history.reset();
        assert!(history.is_empty());
    }

    #[test]
    fn speaker_round_trips_through_its_tag() {
        assert_eq!(Speaker::parse(Speaker::Human.as_str()), Some(Speaker::Human));
        assert_eq!(
            Speaker::parse(Speaker::Assistant.as_str()),
            Some(Speaker::Assistant)
        );
        assert_eq!(Speaker::parse("system"), None);
    }
}
