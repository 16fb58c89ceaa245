//! Conversation state types
//!
//! The conversation lives in memory for one session of the terminal UI and is
//! append-only: turns are never edited, removed, or reordered.

use std::fmt;
use uuid::Uuid;

/// Opaque identifier for a turn, used as a rendering key only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(Uuid);

impl TurnId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Agent",
        }
    }
}

/// One message in the conversation
#[derive(Debug, Clone)]
pub struct Turn {
    id: TurnId,
    role: Role,
    content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role,
            content: content.into(),
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered, append-only sequence of turns
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    // Bumped on every append so the view can tell the sequence changed
    revision: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.revision += 1;
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_is_empty() {
        let conversation = Conversation::new();
        assert!(conversation.is_empty());
        assert_eq!(conversation.len(), 0);
        assert_eq!(conversation.revision(), 0);
            }

    #[test]
    fn test_push_preserves_insertion_order() {
        let mut conversation = Conversation::new();
        conversation.push(Turn::user("2+2"));
        conversation.push(Turn::assistant("4"));
        conversation.push(Turn::user("thanks"));

        let contents: Vec<&str> = conversation.turns().iter().map(Turn::content).collect();
        assert_eq!(contents, vec!["2+2", "4", "thanks"]);
        assert_eq!(conversation.turns().last().map(Turn::role), Some(Role::User));
    }

    #[test]
    fn test_revision_tracks_appends() {
        let mut conversation = Conversation::new();
        conversation.push(Turn::user("a"));
        assert_eq!(conversation.revision(), 1);
        conversation.push(Turn::assistant("b"));
        assert_eq!(conversation.revision(), 2);
    }

    #[test]
    fn test_turn_ids_are_unique() {
        let first = Turn::user("same");
        let second = Turn::user("same");
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_user_content_is_verbatim() {
        let turn = Turn::user("  padded  ");
        assert_eq!(turn.content(), "  padded  ");
        assert_eq!(turn.role(), Role::User);
    }
}
