use serde::{Deserialize, Serialize};

/// Only the most recent turns are consulted when resolving references
pub const MAX_HISTORY_TURNS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message of caller-supplied conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Returns the trailing window of history the engine is allowed to look at
pub fn recent_turns(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    &history[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_turns_keeps_last_ten() {
        let history: Vec<ChatTurn> = (0..14).map(|i| ChatTurn::user(format!("q{}", i))).collect();
        let recent = recent_turns(&history);
        assert_eq!(recent.len(), MAX_HISTORY_TURNS);
        assert_eq!(recent[0].content, "q4");
    }

    #[test]
    fn test_role_deserializes_lowercase() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role":"assistant","content":"Inception (2010)"}"#).unwrap();
        assert_eq!(turn.role, Role::Assistant);
    }
}
