use chrono::Utc;

use super::ids::ConversationId;
use super::title::TitleRules;
use super::types::{
    AddMessageOutcome, Conversation, DEFAULT_CONVERSATION_TITLE, Message, NewMessage,
    PendingConversation, Role, ScheduledRetitle, first_user_message,
};

/// Owns committed conversations, the current selection and the pending thread.
///
/// Committed conversations are kept in display order with the newest first.
#[derive(Debug, Clone, Default)]
pub struct ConversationEngine {
    conversations: Vec<Conversation>,
    current_conversation_id: Option<ConversationId>,
    pending: Option<PendingConversation>,
    scheduled_retitles: Vec<ScheduledRetitle>,
    title_rules: TitleRules,
}

impl ConversationEngine {
    pub fn new(title_rules: TitleRules) -> Self {
        Self {
            title_rules,
            ..Self::default()
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, conversation_id: ConversationId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.id == conversation_id)
    }

    pub fn current_conversation_id(&self) -> Option<ConversationId> {
        self.current_conversation_id
    }

    pub fn pending(&self) -> Option<&PendingConversation> {
        self.pending.as_ref()
    }

    pub fn title_rules(&self) -> &TitleRules {
        &self.title_rules
    }

    /// Messages of the current thread: pending first, then committed, else nothing.
    pub fn displayed_messages(&self) -> &[Message] {
        let Some(current_id) = self.current_conversation_id else {
            return &[];
        };

        if let Some(pending) = self
            .pending
            .as_ref()
            .filter(|pending| pending.id == current_id)
        {
            return &pending.messages;
        }

        self.conversation(current_id)
            .map(|conversation| conversation.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn current_title(&self) -> &str {
        self.current_conversation_id
            .and_then(|current_id| self.conversation(current_id))
            .map(|conversation| conversation.title.as_str())
            .unwrap_or(DEFAULT_CONVERSATION_TITLE)
    }

    pub fn has_active_conversation(&self) -> bool {
        self.current_conversation_id.is_some()
    }

    /// Stamps and routes one message.
    ///
    /// With nothing selected a new thread starts: user messages open a pending
    /// conversation, assistant messages commit one directly. A reply to the pending
    /// thread promotes it; anything else is appended to a committed conversation.
    pub fn add_message(
        &mut self,
        input: NewMessage,
        target: Option<ConversationId>,
    ) -> AddMessageOutcome {
        let message = input.stamp();
        let message_id = message.id;

        let Some(conversation_id) = target.or(self.current_conversation_id) else {
            let conversation_id = self.start_thread(message);
            return AddMessageOutcome {
                message_id,
                conversation_id,
            };
        };

        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.id == conversation_id)
        {
            self.extend_pending(message);
        } else {
            self.append_committed(conversation_id, message);
        }

        AddMessageOutcome {
            message_id,
            conversation_id,
        }
    }

    /// Queues a retitle; it applies later and only over a still-default title.
    ///
    /// At most one retitle per conversation is queued. The earliest queued entry is
    /// the one that would win the still-default check, so later requests are dropped.
    pub fn update_conversation_title(
        &mut self,
        conversation_id: ConversationId,
        user_message_text: impl Into<String>,
    ) {
        if self
            .scheduled_retitles
            .iter()
            .any(|queued| queued.conversation_id == conversation_id)
        {
            tracing::debug!("retitle for {conversation_id} already queued");
            return;
        }

        self.scheduled_retitles.push(ScheduledRetitle {
            conversation_id,
            source_text: user_message_text.into(),
        });
    }

    /// Hands queued retitles to the host so it can fire them after its delay.
    pub fn take_scheduled_retitles(&mut self) -> Vec<ScheduledRetitle> {
        std::mem::take(&mut self.scheduled_retitles)
    }

    pub fn has_scheduled_retitles(&self) -> bool {
        !self.scheduled_retitles.is_empty()
    }

    /// Applies a fired retitle. Returns whether the title changed.
    pub fn apply_scheduled_retitle(&mut self, retitle: &ScheduledRetitle) -> bool {
        let title = self.title_rules.synthesize(&retitle.source_text);
        let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|conversation| conversation.id == retitle.conversation_id)
        else {
            tracing::debug!(
                "retitle target {} no longer exists; skipping",
                retitle.conversation_id
            );
            return false;
        };

        if !conversation.has_default_title() {
            tracing::debug!(
                "conversation {} was already titled '{}'; skipping retitle",
                conversation.id,
                conversation.title
            );
            return false;
        }

        tracing::debug!("retitled conversation {} to '{}'", conversation.id, title);
        conversation.title = title;
        true
    }

    /// Fires every queued retitle immediately. Returns how many changed a title.
    pub fn flush_scheduled_retitles(&mut self) -> usize {
        self.take_scheduled_retitles()
            .iter()
            .filter(|retitle| self.apply_scheduled_retitle(retitle))
            .count()
    }

    pub fn create_new_conversation(&mut self, initial_messages: Vec<Message>) -> ConversationId {
        let conversation = Conversation::new(
            ConversationId::new_v7(),
            DEFAULT_CONVERSATION_TITLE,
            initial_messages,
        );
        let conversation_id = conversation.id;

        self.conversations.insert(0, conversation);
        self.current_conversation_id = Some(conversation_id);
        self.discard_pending();

        tracing::info!("created conversation {conversation_id}");
        conversation_id
    }

    /// Removes a conversation; returns whether it existed.
    ///
    /// The pending thread is always dropped. If the removed conversation, or the
    /// dropped pending thread, was current, selection moves to the first remaining
    /// conversation.
    pub fn delete_conversation(&mut self, conversation_id: ConversationId) -> bool {
        let before = self.conversations.len();
        self.conversations
            .retain(|conversation| conversation.id != conversation_id);
        let removed = self.conversations.len() != before;

        let pending_was_current = self
            .pending
            .as_ref()
            .is_some_and(|pending| Some(pending.id) == self.current_conversation_id);
        self.discard_pending();

        if self.current_conversation_id == Some(conversation_id) || pending_was_current {
            self.current_conversation_id = self
                .conversations
                .first()
                .map(|conversation| conversation.id);
        }

        if removed {
            tracing::info!("deleted conversation {conversation_id}");
        } else {
            tracing::debug!("delete requested for unknown conversation {conversation_id}");
        }
        removed
    }

    /// Switches the current conversation, abandoning any pending thread.
    pub fn select_conversation(&mut self, conversation_id: ConversationId) -> bool {
        if self.conversation(conversation_id).is_none() {
            tracing::debug!("select requested for unknown conversation {conversation_id}");
            return false;
        }

        self.current_conversation_id = Some(conversation_id);
        self.discard_pending();
        true
    }

    fn start_thread(&mut self, message: Message) -> ConversationId {
        let conversation_id = ConversationId::new_v7();
        self.current_conversation_id = Some(conversation_id);

        match message.role {
            Role::User => {
                tracing::debug!("opened pending conversation {conversation_id}");
                self.pending = Some(PendingConversation {
                    id: conversation_id,
                    messages: vec![message],
                });
            }
            Role::Assistant => {
                tracing::info!("committed conversation {conversation_id} from assistant message");
                self.conversations.insert(
                    0,
                    Conversation::new(conversation_id, DEFAULT_CONVERSATION_TITLE, vec![message]),
                );
            }
        }

        conversation_id
    }

    fn extend_pending(&mut self, message: Message) {
        let Some(mut pending) = self.pending.take() else {
            return;
        };
        let role = message.role;
        pending.messages.push(message);

        if role == Role::User {
            self.pending = Some(pending);
            return;
        }

        let title = first_user_message(&pending.messages)
            .map(|first| self.title_rules.synthesize(&first.content))
            .unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string());

        tracing::info!("promoted pending conversation {} as '{}'", pending.id, title);
        self.conversations
            .insert(0, Conversation::new(pending.id, title, pending.messages));
    }

    fn append_committed(&mut self, conversation_id: ConversationId, message: Message) {
        let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|conversation| conversation.id == conversation_id)
        else {
            tracing::debug!("dropping message for unknown conversation {conversation_id}");
            return;
        };

        let role = message.role;
        conversation.messages.push(message);
        conversation.updated_at = Utc::now();

        if role != Role::Assistant || !conversation.has_default_title() {
            return;
        }

        // Read the title source from the conversation after this append.
        let title_source = conversation
            .first_user_message()
            .map(|first| first.content.clone());
        if let Some(text) = title_source {
            self.update_conversation_title(conversation_id, text);
        }
    }

    fn discard_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!("discarded pending conversation {}", pending.id);
        }
    }
}
