use curator_state::{
    AddMessageOutcome, CardId, ContentCard, ConversationId, DragEvent, DropAction, MessageId,
    Role, ScheduledRetitle,
};
use tokio::sync::oneshot;

/// Requests processed by the controller worker, in arrival order.
#[derive(Debug)]
pub enum Command {
    AddMessage {
        content: String,
        role: Role,
        target: Option<ConversationId>,
        reply: oneshot::Sender<AddMessageOutcome>,
    },
    CreateConversation {
        reply: oneshot::Sender<ConversationId>,
    },
    DeleteConversation {
        conversation_id: ConversationId,
        reply: oneshot::Sender<bool>,
    },
    SelectConversation {
        conversation_id: ConversationId,
        reply: oneshot::Sender<bool>,
    },
    UpdateConversationTitle {
        conversation_id: ConversationId,
        text: String,
        reply: oneshot::Sender<()>,
    },
    CreateCard {
        message_id: MessageId,
        reply: oneshot::Sender<Option<CardId>>,
    },
    DeleteCard {
        card_id: CardId,
        reply: oneshot::Sender<bool>,
    },
    ReorderCards {
        cards: Vec<ContentCard>,
        reply: oneshot::Sender<()>,
    },
    Drag {
        event: DragEvent,
        reply: oneshot::Sender<DropAction>,
    },
    /// Posted by a timer task once the retitle delay has elapsed.
    FireRetitle { retitle: ScheduledRetitle },
}

impl Command {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::AddMessage { .. } => "add-message",
            Self::CreateConversation { .. } => "create-conversation",
            Self::DeleteConversation { .. } => "delete-conversation",
            Self::SelectConversation { .. } => "select-conversation",
            Self::UpdateConversationTitle { .. } => "update-conversation-title",
            Self::CreateCard { .. } => "create-card",
            Self::DeleteCard { .. } => "delete-card",
            Self::ReorderCards { .. } => "reorder-cards",
            Self::Drag { .. } => "drag-event",
            Self::FireRetitle { .. } => "fire-retitle",
        }
    }
}
