#![deny(unsafe_code)]

pub mod cards;
pub mod conversation;
pub mod drag;
pub mod error;
pub mod ids;
pub mod title;
pub mod types;
pub mod workspace;

pub use cards::CardCollection;
pub use conversation::ConversationEngine;
pub use drag::{
    Bounds, CARD_REORDER_TYPE, DragController, DragData, DragEvent, DragMode, DragPayload,
    DragPhase, DragVisuals, DropAction, DropEffect, Point, TEXT_PLAIN_TYPE,
};
pub use error::{StateError, StateResult};
pub use ids::{CardId, ConversationId, MessageId};
pub use title::{TitleRules, card_title, synthesize_title};
pub use types::{
    AddMessageOutcome, ContentCard, Conversation, DEFAULT_CONVERSATION_TITLE, Message,
    NewMessage, PendingConversation, Role, ScheduledRetitle, Snapshot,
};
pub use workspace::{Workspace, WorkspaceConfig};
