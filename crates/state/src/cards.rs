use chrono::Utc;

use super::ids::CardId;
use super::title::{DEFAULT_CARD_TITLE_MAX_CHARS, DEFAULT_ELLIPSIS, card_title};
use super::types::{ContentCard, Message, Role};

/// Ordered card list; position is presentation order and new cards go first.
#[derive(Debug, Clone)]
pub struct CardCollection {
    cards: Vec<ContentCard>,
    title_max_chars: usize,
    ellipsis: String,
}

impl Default for CardCollection {
    fn default() -> Self {
        Self::new(DEFAULT_CARD_TITLE_MAX_CHARS, DEFAULT_ELLIPSIS)
    }
}

impl CardCollection {
    pub fn new(title_max_chars: usize, ellipsis: impl Into<String>) -> Self {
        Self {
            cards: Vec::new(),
            title_max_chars,
            ellipsis: ellipsis.into(),
        }
    }

    pub fn cards(&self) -> &[ContentCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn index_of(&self, card_id: CardId) -> Option<usize> {
        self.cards.iter().position(|card| card.id == card_id)
    }

    pub fn contains_content(&self, content: &str) -> bool {
        self.cards.iter().any(|card| card.content == content)
    }

    /// Snapshots an assistant message into a new leading card.
    ///
    /// User messages and content that already has a card yield `None`.
    pub fn create_from_message(&mut self, message: &Message) -> Option<CardId> {
        if message.role != Role::Assistant {
            tracing::debug!("message {} is not an assistant reply; no card", message.id);
            return None;
        }

        if self.contains_content(&message.content) {
            tracing::debug!("a card with the content of message {} already exists", message.id);
            return None;
        }

        let card = ContentCard {
            id: CardId::new_v7(),
            content: message.content.clone(),
            title: card_title(&message.content, self.title_max_chars, &self.ellipsis),
            created_at: Utc::now(),
        };
        let card_id = card.id;
        self.cards.insert(0, card);

        tracing::info!("created card {card_id} from message {}", message.id);
        Some(card_id)
    }

    pub fn delete(&mut self, card_id: CardId) -> bool {
        let Some(index) = self.index_of(card_id) else {
            tracing::debug!("delete requested for unknown card {card_id}");
            return false;
        };

        self.cards.remove(index);
        true
    }

    /// Replaces the collection with a caller-ordered list.
    ///
    /// The drag protocol is the only producer and always passes a permutation, so
    /// membership is not re-validated here.
    pub fn reorder(&mut self, cards: Vec<ContentCard>) {
        self.cards = cards;
    }

    /// Computes the order after moving `dragged` onto `target`'s slot.
    ///
    /// The dragged card is removed first and then inserted at the target's original
    /// index, so dragging downwards lands just after the target.
    pub fn splice_move(&self, dragged: CardId, target: CardId) -> Option<Vec<ContentCard>> {
        if dragged == target {
            return None;
        }

        let dragged_index = self.index_of(dragged)?;
        let target_index = self.index_of(target)?;

        let mut reordered = self.cards.clone();
        let card = reordered.remove(dragged_index);
        reordered.insert(target_index, card);
        Some(reordered)
    }
}
