//! Drag gesture recognition for the card region.
//!
//! One gesture is either an external drag (a chat message dragged in to become a card)
//! or an internal reorder (a card dragged onto another card). The mode is decided by the
//! payload's type set, with the reorder tag always checked first.

use serde::{Deserialize, Serialize};
use snafu::OptionExt;

use super::error::{MissingDragDataSnafu, StateResult};
use super::ids::{CardId, MessageId};

/// Drag-data type carrying a message id for external drags.
pub const TEXT_PLAIN_TYPE: &str = "text/plain";
/// Drag-data type carrying the dragged card id for internal reorders.
pub const CARD_REORDER_TYPE: &str = "application/card-reorder";

/// Transient type-to-value map carried by a native drag gesture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragData {
    entries: Vec<(String, String)>,
}

impl DragData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload a chat message attaches when it starts being dragged.
    pub fn for_message(message_id: MessageId) -> Self {
        Self::new().with_data(TEXT_PLAIN_TYPE, message_id.to_string())
    }

    /// Payload a card attaches when it starts being dragged.
    pub fn for_card(card_id: CardId) -> Self {
        Self::new().with_data(CARD_REORDER_TYPE, card_id.to_string())
    }

    pub fn with_data(mut self, data_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_data(data_type, value);
        self
    }

    pub fn set_data(&mut self, data_type: impl Into<String>, value: impl Into<String>) {
        let data_type = data_type.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| *existing == data_type)
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((data_type, value)),
        }
    }

    pub fn get_data(&self, data_type: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == data_type)
            .map(|(_, value)| value.as_str())
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(data_type, _)| data_type.as_str())
    }

    pub fn has_type(&self, data_type: &str) -> bool {
        self.types().any(|existing| existing == data_type)
    }

    /// Classifies the gesture from the type set alone.
    ///
    /// Hover events only expose types, so this is what enter/leave handlers use. Any
    /// payload without the reorder tag is external; whether it carries a usable message
    /// id is only checked on drop.
    pub fn mode(&self) -> DragMode {
        if self.has_type(CARD_REORDER_TYPE) {
            DragMode::InternalReorder
        } else {
            DragMode::External
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DragMode {
    External,
    InternalReorder,
}

impl DragMode {
    pub fn drop_effect(self) -> DropEffect {
        match self {
            Self::External => DropEffect::Copy,
            Self::InternalReorder => DropEffect::Move,
        }
    }
}

/// Cursor feedback requested from the platform while hovering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropEffect {
    Copy,
    Move,
}

/// Decoded drag payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragPayload {
    External { message_id: MessageId },
    InternalReorder { card_id: CardId },
}

impl DragPayload {
    /// Decodes the payload, preferring the reorder tag over the plain-text fallback.
    pub fn decode(data: &DragData) -> StateResult<Self> {
        if let Some(raw) = data.get_data(CARD_REORDER_TYPE) {
            return Ok(Self::InternalReorder {
                card_id: CardId::parse(raw)?,
            });
        }

        let raw = data
            .get_data(TEXT_PLAIN_TYPE)
            .with_context(|| MissingDragDataSnafu {
                stage: "decode-drag-payload",
                available: data.types().map(str::to_string).collect::<Vec<_>>(),
            })?;
        Ok(Self::External {
            message_id: MessageId::parse(raw)?,
        })
    }

    pub fn encode(&self) -> DragData {
        match self {
            Self::External { message_id } => DragData::for_message(*message_id),
            Self::InternalReorder { card_id } => DragData::for_card(*card_id),
        }
    }

    pub fn mode(&self) -> DragMode {
        match self {
            Self::External { .. } => DragMode::External,
            Self::InternalReorder { .. } => DragMode::InternalReorder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Bounds {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Edges count as inside, so a leave fired exactly on the border is ignored.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right
            && point.y >= self.top
            && point.y <= self.bottom
    }
}

/// Raw gesture events delivered by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    CardDragStart {
        card_id: CardId,
    },
    RegionDragOver {
        data: DragData,
    },
    RegionDragLeave {
        data: DragData,
        pointer: Point,
        region: Bounds,
    },
    RegionDrop {
        data: DragData,
    },
    CardDragOver {
        card_id: CardId,
        data: DragData,
    },
    CardDragLeave {
        card_id: CardId,
        pointer: Point,
        card_bounds: Bounds,
    },
    CardDrop {
        card_id: CardId,
        data: DragData,
    },
    DragEnd,
}

/// Work the card collection must do after a recognised drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropAction {
    None,
    CreateCard { message_id: MessageId },
    Reorder { dragged: CardId, target: CardId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging(DragMode),
    Dropped(DragMode),
}

/// Transient visual state the presentation layer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragVisuals {
    pub phase: DragPhase,
    pub drop_zone_armed: bool,
    pub dragged_card: Option<CardId>,
    pub drop_target: Option<CardId>,
}

/// State machine for a single drag gesture over the card region.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    visuals: DragVisuals,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visuals(&self) -> DragVisuals {
        self.visuals
    }

    pub fn phase(&self) -> DragPhase {
        self.visuals.phase
    }

    pub fn is_drop_zone_armed(&self) -> bool {
        self.visuals.drop_zone_armed
    }

    pub fn is_being_dragged(&self, card_id: CardId) -> bool {
        self.visuals.dragged_card == Some(card_id)
    }

    pub fn is_drop_target(&self, card_id: CardId) -> bool {
        self.visuals.drop_target == Some(card_id)
    }

    /// Cursor feedback for a hover.
    pub fn drop_effect(&self, data: &DragData) -> DropEffect {
        data.mode().drop_effect()
    }

    pub fn handle(&mut self, event: DragEvent) -> DropAction {
        match event {
            DragEvent::CardDragStart { card_id } => {
                self.start_card_drag(card_id);
                DropAction::None
            }
            DragEvent::RegionDragOver { data } => {
                self.region_drag_over(&data);
                DropAction::None
            }
            DragEvent::RegionDragLeave {
                data,
                pointer,
                region,
            } => {
                self.region_drag_leave(&data, pointer, region);
                DropAction::None
            }
            DragEvent::RegionDrop { data } => self.region_drop(&data),
            DragEvent::CardDragOver { card_id, data } => {
                self.card_drag_over(card_id, &data);
                DropAction::None
            }
            DragEvent::CardDragLeave {
                card_id,
                pointer,
                card_bounds,
            } => {
                self.card_drag_leave(card_id, pointer, card_bounds);
                DropAction::None
            }
            DragEvent::CardDrop { card_id, data } => self.card_drop(card_id, &data),
            DragEvent::DragEnd => {
                self.drag_end();
                DropAction::None
            }
        }
    }

    /// Marks `card_id` as being dragged. The card attaches [`DragData::for_card`] itself.
    pub fn start_card_drag(&mut self, card_id: CardId) {
        self.visuals.dragged_card = Some(card_id);
        self.visuals.phase = DragPhase::Dragging(DragMode::InternalReorder);
    }

    pub fn region_drag_over(&mut self, data: &DragData) {
        if data.mode() != DragMode::External {
            return;
        }

        self.visuals.drop_zone_armed = true;
        if self.visuals.phase == DragPhase::Idle {
            self.visuals.phase = DragPhase::Dragging(DragMode::External);
        }
    }

    pub fn region_drag_leave(&mut self, data: &DragData, pointer: Point, region: Bounds) {
        if data.mode() == DragMode::InternalReorder || region.contains(pointer) {
            return;
        }

        self.disarm_drop_zone();
    }

    pub fn region_drop(&mut self, data: &DragData) -> DropAction {
        if data.mode() == DragMode::InternalReorder {
            // Released between cards; drag-end does the cleanup.
            return DropAction::None;
        }

        self.disarm_drop_zone();
        match DragPayload::decode(data) {
            Ok(DragPayload::External { message_id }) => DropAction::CreateCard { message_id },
            Ok(DragPayload::InternalReorder { .. }) => DropAction::None,
            Err(error) => {
                tracing::debug!("ignoring region drop: {error}");
                DropAction::None
            }
        }
    }

    pub fn card_drag_over(&mut self, card_id: CardId, data: &DragData) {
        if data.mode() != DragMode::InternalReorder {
            return;
        }

        // A recognised reorder always wins over an armed external drop zone.
        self.visuals.drop_target = Some(card_id);
        self.visuals.drop_zone_armed = false;
        if self.visuals.phase == DragPhase::Idle {
            self.visuals.phase = DragPhase::Dragging(DragMode::InternalReorder);
        }
    }

    pub fn card_drag_leave(&mut self, card_id: CardId, pointer: Point, card_bounds: Bounds) {
        if self.is_drop_target(card_id) && !card_bounds.contains(pointer) {
            self.visuals.drop_target = None;
        }
    }

    pub fn card_drop(&mut self, target: CardId, data: &DragData) -> DropAction {
        if data.mode() == DragMode::External {
            // Cards sit inside the region, so a message released on one still lands there.
            return self.region_drop(data);
        }

        self.visuals.drop_target = None;
        self.visuals.phase = DragPhase::Dropped(DragMode::InternalReorder);

        match DragPayload::decode(data) {
            Ok(DragPayload::InternalReorder { card_id }) if card_id == target => {
                tracing::debug!("card {card_id} dropped onto itself; order unchanged");
                DropAction::None
            }
            Ok(DragPayload::InternalReorder { card_id }) => DropAction::Reorder {
                dragged: card_id,
                target,
            },
            Ok(DragPayload::External { .. }) => DropAction::None,
            Err(error) => {
                tracing::debug!("ignoring card drop: {error}");
                DropAction::None
            }
        }
    }

    /// Unconditional end of gesture, whether or not a drop handler ran.
    pub fn drag_end(&mut self) {
        self.visuals = DragVisuals::default();
    }

    fn disarm_drop_zone(&mut self) {
        self.visuals.drop_zone_armed = false;
        if self.visuals.phase == DragPhase::Dragging(DragMode::External) {
            self.visuals.phase = DragPhase::Idle;
        }
    }
}
