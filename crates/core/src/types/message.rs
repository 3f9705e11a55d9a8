//! Customer chat messages handled in the back-office.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::MessageId;
use super::status::MessageSender;

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    /// Groups messages of one customer thread.
    pub conversation_id: String,
    pub sender: MessageSender,
    /// Display name of the author.
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A message about to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender: MessageSender,
    pub author: String,
    pub body: String,
}

impl NewMessage {
    /// Maximum message body length in characters.
    pub const MAX_BODY: usize = 4000;

    /// Whether the message has a usable body.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let body = self.body.trim();
        !body.is_empty()
            && body.chars().count() <= Self::MAX_BODY
            && !self.conversation_id.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid() {
        let mut msg = NewMessage {
            conversation_id: "visitor-1".into(),
            sender: MessageSender::Admin,
            author: "Manager".into(),
            body: "Hello! The car is available.".into(),
        };
        assert!(msg.is_valid());
        msg.body = "   ".into();
        assert!(!msg.is_valid());
    }
}
