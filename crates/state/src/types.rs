use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::drag::DragVisuals;
use super::ids::{CardId, ConversationId, MessageId};

/// Title used for conversations that have not been named yet.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Immutable chat message, stamped by the conversation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

/// Caller-supplied part of a message before the engine assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub role: Role,
}

impl NewMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub(crate) fn stamp(self) -> Message {
        Message {
            id: MessageId::new_v7(),
            content: self.content,
            role: self.role,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, title: impl Into<String>, messages: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            messages,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_CONVERSATION_TITLE
    }

    pub fn first_user_message(&self) -> Option<&Message> {
        first_user_message(&self.messages)
    }
}

/// A thread that has a user message but no assistant reply yet.
///
/// It lives outside the committed collection until the first reply promotes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConversation {
    pub id: ConversationId,
    pub messages: Vec<Message>,
}

/// Curated copy of an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCard {
    pub id: CardId,
    pub content: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl ContentCard {
    /// Content length in characters, as shown on the card footer.
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

/// Where `add_message` routed a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMessageOutcome {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
}

/// A retitle waiting for its delay to elapse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledRetitle {
    pub conversation_id: ConversationId,
    pub source_text: String,
}

/// Read-only view of everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub conversations: Vec<Conversation>,
    pub current_conversation_id: Option<ConversationId>,
    pub displayed_messages: Vec<Message>,
    pub current_title: String,
    pub has_active_conversation: bool,
    pub pending_conversation_id: Option<ConversationId>,
    pub cards: Vec<ContentCard>,
    pub drag: DragVisuals,
}

impl Snapshot {
    /// The card region shows its "drag replies here" hint only when empty and not armed.
    pub fn shows_empty_card_hint(&self) -> bool {
        self.cards.is_empty() && !self.drag.drop_zone_armed
    }

    pub fn conversation(&self, conversation_id: ConversationId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.id == conversation_id)
    }
}

pub(crate) fn first_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().find(|message| message.role == Role::User)
}
