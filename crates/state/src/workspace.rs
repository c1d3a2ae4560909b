use super::cards::CardCollection;
use super::conversation::ConversationEngine;
use super::drag::{DragController, DragEvent, DropAction};
use super::ids::{CardId, ConversationId, MessageId};
use super::title::{DEFAULT_CARD_TITLE_MAX_CHARS, TitleRules};
use super::types::{AddMessageOutcome, ContentCard, NewMessage, Role, ScheduledRetitle, Snapshot};

/// Tunables the host passes in when building a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub title_rules: TitleRules,
    pub card_title_max_chars: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            title_rules: TitleRules::default(),
            card_title_max_chars: DEFAULT_CARD_TITLE_MAX_CHARS,
        }
    }
}

/// Single owner of conversation, card and drag state.
///
/// Every mutation from the presentation layer goes through these methods; render
/// state is read back with [`Workspace::snapshot`].
///
/// Retitles are only queued here. The host drains them with
/// [`Workspace::take_scheduled_retitles`] (and fires each after its delay) or
/// [`Workspace::flush_scheduled_retitles`]; the queue holds at most one entry per
/// conversation.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    conversations: ConversationEngine,
    cards: CardCollection,
    drag: DragController,
}

impl Workspace {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self {
            cards: CardCollection::new(
                config.card_title_max_chars,
                config.title_rules.ellipsis.clone(),
            ),
            conversations: ConversationEngine::new(config.title_rules),
            drag: DragController::new(),
        }
    }

    pub fn conversations(&self) -> &ConversationEngine {
        &self.conversations
    }

    pub fn cards(&self) -> &CardCollection {
        &self.cards
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn add_message(
        &mut self,
        content: impl Into<String>,
        role: Role,
        target: Option<ConversationId>,
    ) -> AddMessageOutcome {
        self.conversations
            .add_message(NewMessage::new(role, content), target)
    }

    pub fn create_new_conversation(&mut self) -> ConversationId {
        self.conversations.create_new_conversation(Vec::new())
    }

    pub fn delete_conversation(&mut self, conversation_id: ConversationId) -> bool {
        self.conversations.delete_conversation(conversation_id)
    }

    pub fn select_conversation(&mut self, conversation_id: ConversationId) -> bool {
        self.conversations.select_conversation(conversation_id)
    }

    pub fn update_conversation_title(
        &mut self,
        conversation_id: ConversationId,
        user_message_text: impl Into<String>,
    ) {
        self.conversations
            .update_conversation_title(conversation_id, user_message_text);
    }

    pub fn take_scheduled_retitles(&mut self) -> Vec<ScheduledRetitle> {
        self.conversations.take_scheduled_retitles()
    }

    pub fn apply_scheduled_retitle(&mut self, retitle: &ScheduledRetitle) -> bool {
        self.conversations.apply_scheduled_retitle(retitle)
    }

    pub fn flush_scheduled_retitles(&mut self) -> usize {
        self.conversations.flush_scheduled_retitles()
    }

    /// Turns a message from the displayed thread into a card.
    pub fn create_card(&mut self, message_id: MessageId) -> Option<CardId> {
        let Some(message) = self
            .conversations
            .displayed_messages()
            .iter()
            .find(|message| message.id == message_id)
        else {
            tracing::debug!("message {message_id} is not in the displayed thread; no card");
            return None;
        };

        self.cards.create_from_message(message)
    }

    pub fn delete_card(&mut self, card_id: CardId) -> bool {
        self.cards.delete(card_id)
    }

    pub fn reorder_cards(&mut self, cards: Vec<ContentCard>) {
        self.cards.reorder(cards);
    }

    /// Feeds one gesture event through the drag protocol and applies its drop.
    pub fn handle_drag(&mut self, event: DragEvent) -> DropAction {
        let action = self.drag.handle(event);
        match action {
            DropAction::None => {}
            DropAction::CreateCard { message_id } => {
                self.create_card(message_id);
            }
            DropAction::Reorder { dragged, target } => {
                match self.cards.splice_move(dragged, target) {
                    Some(reordered) => self.cards.reorder(reordered),
                    None => tracing::debug!("reorder of {dragged} onto {target} ignored"),
                }
            }
        }
        action
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            conversations: self.conversations.conversations().to_vec(),
            current_conversation_id: self.conversations.current_conversation_id(),
            displayed_messages: self.conversations.displayed_messages().to_vec(),
            current_title: self.conversations.current_title().to_string(),
            has_active_conversation: self.conversations.has_active_conversation(),
            pending_conversation_id: self.conversations.pending().map(|pending| pending.id),
            cards: self.cards.cards().to_vec(),
            drag: self.drag.visuals(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::drag::{Bounds, DragData, Point};

    const QUANTUM_PROMPT: &str = "Summarize quantum computing advances this week please";

    fn workspace_with_reply(reply: &str) -> (Workspace, MessageId) {
        let mut workspace = Workspace::default();
        let question = workspace.add_message("question", Role::User, None);
        let answer = workspace.add_message(reply, Role::Assistant, Some(question.conversation_id));
        (workspace, answer.message_id)
    }

    fn seeded_cards(count: usize) -> (Workspace, Vec<CardId>) {
        let mut workspace = Workspace::default();
        let question = workspace.add_message("question", Role::User, None);
        for index in 0..count {
            let reply = workspace.add_message(
                format!("reply {index}"),
                Role::Assistant,
                Some(question.conversation_id),
            );
            workspace.create_card(reply.message_id);
        }
        let ids = workspace.cards().cards().iter().map(|card| card.id).collect();
        (workspace, ids)
    }

    #[test]
    fn pending_thread_promotes_on_first_reply() {
        let mut workspace = Workspace::default();
        let question = workspace.add_message(QUANTUM_PROMPT, Role::User, None);

        let snapshot = workspace.snapshot();
        assert!(snapshot.conversations.is_empty());
        assert_eq!(snapshot.current_conversation_id, Some(question.conversation_id));
        assert_eq!(snapshot.pending_conversation_id, Some(question.conversation_id));
        assert_eq!(snapshot.displayed_messages.len(), 1);
        assert!(snapshot.has_active_conversation);

        workspace.add_message(
            "Quantum computing saw...",
            Role::Assistant,
            Some(question.conversation_id),
        );

        let snapshot = workspace.snapshot();
        assert_eq!(snapshot.conversations.len(), 1);
        assert_eq!(snapshot.pending_conversation_id, None);
        assert_eq!(snapshot.current_title, "Summarize quantum computing advances thi...");
    }

    #[test]
    fn cards_come_only_from_displayed_assistant_messages() {
        let mut workspace = Workspace::default();
        let question = workspace.add_message("question", Role::User, None);

        assert_eq!(workspace.create_card(question.message_id), None);
        assert_eq!(workspace.create_card(MessageId::new_v7()), None);

        let answer =
            workspace.add_message("answer", Role::Assistant, Some(question.conversation_id));
        assert!(workspace.create_card(answer.message_id).is_some());
        assert_eq!(workspace.cards().len(), 1);
    }

    #[test]
    fn duplicate_content_yields_one_card() {
        let mut workspace = Workspace::default();
        let question = workspace.add_message("question", Role::User, None);
        let first = workspace.add_message("same", Role::Assistant, Some(question.conversation_id));
        let second = workspace.add_message("same", Role::Assistant, Some(question.conversation_id));

        assert!(workspace.create_card(first.message_id).is_some());
        assert_eq!(workspace.create_card(second.message_id), None);
        assert_eq!(workspace.cards().len(), 1);
    }

    #[test]
    fn cards_survive_deleting_their_source_conversation() {
        let (mut workspace, message_id) = workspace_with_reply("keep me");
        workspace.create_card(message_id);
        let conversation_id = workspace.snapshot().conversations[0].id;

        assert!(workspace.delete_conversation(conversation_id));
        let snapshot = workspace.snapshot();
        assert_eq!(snapshot.current_conversation_id, None);
        assert_eq!(snapshot.cards.len(), 1);
        assert_eq!(snapshot.cards[0].content, "keep me");
    }

    #[test]
    fn cards_from_a_non_displayed_thread_are_not_created() {
        let (mut workspace, message_id) = workspace_with_reply("hidden soon");
        workspace.create_new_conversation();

        assert_eq!(workspace.create_card(message_id), None);
    }

    #[test]
    fn reorder_preserves_membership() {
        let (mut workspace, ids) = seeded_cards(4);
        let mut shuffled = workspace.cards().cards().to_vec();
        shuffled.rotate_left(1);
        let expected = shuffled.iter().map(|card| card.id).collect::<Vec<_>>();
        workspace.reorder_cards(shuffled);

        let actual = workspace
            .cards()
            .cards()
            .iter()
            .map(|card| card.id)
            .collect::<Vec<_>>();
        assert_eq!(actual, expected);
        assert_eq!(
            actual.iter().copied().collect::<HashSet<_>>(),
            ids.into_iter().collect::<HashSet<_>>()
        );
    }

    #[test]
    fn dragging_a_message_into_the_region_creates_a_card() {
        let (mut workspace, message_id) = workspace_with_reply("drag me");
        let data = DragData::for_message(message_id);

        workspace.handle_drag(DragEvent::RegionDragOver { data: data.clone() });
        assert!(workspace.snapshot().drag.drop_zone_armed);
        assert!(!workspace.snapshot().shows_empty_card_hint());

        let action = workspace.handle_drag(DragEvent::RegionDrop { data });
        assert_eq!(action, DropAction::CreateCard { message_id });

        let snapshot = workspace.snapshot();
        assert!(!snapshot.drag.drop_zone_armed);
        assert_eq!(snapshot.cards.len(), 1);
        assert_eq!(snapshot.cards[0].content, "drag me");
    }

    #[test]
    fn leaving_the_region_disarms_without_creating() {
        let (mut workspace, message_id) = workspace_with_reply("drag me");
        let data = DragData::for_message(message_id);

        workspace.handle_drag(DragEvent::RegionDragOver { data: data.clone() });
        workspace.handle_drag(DragEvent::RegionDragLeave {
            data,
            pointer: Point::new(-5.0, 20.0),
            region: Bounds::new(0.0, 0.0, 300.0, 600.0),
        });

        let snapshot = workspace.snapshot();
        assert!(!snapshot.drag.drop_zone_armed);
        assert!(snapshot.cards.is_empty());
        assert!(snapshot.shows_empty_card_hint());
    }

    #[test]
    fn dragging_a_card_onto_another_reorders_and_cleans_up() {
        let (mut workspace, ids) = seeded_cards(3);
        // ids are newest-first: [reply 2, reply 1, reply 0]
        workspace.handle_drag(DragEvent::CardDragStart { card_id: ids[0] });
        let data = DragData::for_card(ids[0]);
        workspace.handle_drag(DragEvent::CardDragOver {
            card_id: ids[2],
            data: data.clone(),
        });
        assert_eq!(workspace.snapshot().drag.drop_target, Some(ids[2]));

        let action = workspace.handle_drag(DragEvent::CardDrop {
            card_id: ids[2],
            data,
        });
        assert_eq!(
            action,
            DropAction::Reorder {
                dragged: ids[0],
                target: ids[2]
            }
        );

        workspace.handle_drag(DragEvent::DragEnd);
        let snapshot = workspace.snapshot();
        let order = snapshot.cards.iter().map(|card| card.id).collect::<Vec<_>>();
        assert_eq!(order, vec![ids[1], ids[2], ids[0]]);
        assert_eq!(snapshot.drag.dragged_card, None);
        assert_eq!(snapshot.drag.drop_target, None);
    }

    #[test]
    fn cancelled_card_drag_still_clears_flags() {
        let (mut workspace, ids) = seeded_cards(2);
        workspace.handle_drag(DragEvent::CardDragStart { card_id: ids[0] });
        workspace.handle_drag(DragEvent::CardDragOver {
            card_id: ids[1],
            data: DragData::for_card(ids[0]),
        });
        workspace.handle_drag(DragEvent::DragEnd);

        let snapshot = workspace.snapshot();
        assert_eq!(snapshot.drag.dragged_card, None);
        assert_eq!(snapshot.drag.drop_target, None);
        let order = snapshot.cards.iter().map(|card| card.id).collect::<Vec<_>>();
        assert_eq!(order, ids);
    }

    #[test]
    fn reorder_onto_a_deleted_card_is_ignored() {
        let (mut workspace, ids) = seeded_cards(2);
        workspace.handle_drag(DragEvent::CardDragStart { card_id: ids[0] });
        workspace.delete_card(ids[1]);
        workspace.handle_drag(DragEvent::CardDrop {
            card_id: ids[1],
            data: DragData::for_card(ids[0]),
        });

        let order = workspace
            .cards()
            .cards()
            .iter()
            .map(|card| card.id)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![ids[0]]);
    }

    #[test]
    fn snapshot_serializes_with_camel_case_keys() {
        let (workspace, _) = workspace_with_reply("json");
        let value = serde_json::to_value(workspace.snapshot()).expect("serialize snapshot");

        assert!(value.get("currentConversationId").is_some());
        assert!(value.get("displayedMessages").is_some());
        assert_eq!(value["displayedMessages"][0]["role"], "user");
        assert_eq!(value["drag"]["dropZoneArmed"], false);
    }

    #[test]
    fn conversation_and_card_titles_share_the_configured_ellipsis() {
        let mut workspace = Workspace::new(WorkspaceConfig {
            title_rules: TitleRules {
                max_words: 2,
                max_chars: 40,
                ellipsis: "…".to_string(),
            },
            card_title_max_chars: 6,
        });
        let question = workspace.add_message("alpha beta gamma", Role::User, None);
        let reply = workspace.add_message(
            "answer text",
            Role::Assistant,
            Some(question.conversation_id),
        );
        workspace.create_card(reply.message_id);

        let snapshot = workspace.snapshot();
        assert_eq!(snapshot.current_title, "alpha beta…");
        assert_eq!(snapshot.cards[0].title, "answer…");
    }
}
