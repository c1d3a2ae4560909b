use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use curator_state::{
    AddMessageOutcome, CardId, ContentCard, ConversationId, DragEvent, DropAction, MessageId,
    Role, ScheduledRetitle, Snapshot, Workspace, WorkspaceConfig,
};
use snafu::{ResultExt, Snafu};
use tokio::sync::{mpsc, oneshot, watch};

use crate::events::Command;
use crate::settings::CuratorSettings;

pub type ControllerWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ControllerResult<T> = Result<T, ControllerError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ControllerError {
    #[snafu(display("controller worker stopped before `{stage}` was delivered"))]
    WorkerStopped { stage: &'static str },
    #[snafu(display("controller worker dropped the reply on `{stage}`, {source}"))]
    ReplyDropped {
        stage: &'static str,
        source: oneshot::error::RecvError,
    },
    #[snafu(display("snapshot channel closed on `{stage}`, {source}"))]
    SnapshotsClosed {
        stage: &'static str,
        source: watch::error::RecvError,
    },
}

/// Cloneable front door to the workspace owned by the controller worker.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
}

impl ControllerHandle {
    pub async fn add_message(
        &self,
        content: impl Into<String>,
        role: Role,
        target: Option<ConversationId>,
    ) -> ControllerResult<AddMessageOutcome> {
        let content = content.into();
        self.request(|reply| Command::AddMessage {
            content,
            role,
            target,
            reply,
        })
        .await
    }

    pub async fn create_new_conversation(&self) -> ControllerResult<ConversationId> {
        self.request(|reply| Command::CreateConversation { reply })
            .await
    }

    pub async fn delete_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> ControllerResult<bool> {
        self.request(|reply| Command::DeleteConversation {
            conversation_id,
            reply,
        })
        .await
    }

    pub async fn select_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> ControllerResult<bool> {
        self.request(|reply| Command::SelectConversation {
            conversation_id,
            reply,
        })
        .await
    }

    /// Queues a retitle from `text`; it lands after the configured delay.
    pub async fn update_conversation_title(
        &self,
        conversation_id: ConversationId,
        text: impl Into<String>,
    ) -> ControllerResult<()> {
        let text = text.into();
        self.request(|reply| Command::UpdateConversationTitle {
            conversation_id,
            text,
            reply,
        })
        .await
    }

    pub async fn create_card(&self, message_id: MessageId) -> ControllerResult<Option<CardId>> {
        self.request(|reply| Command::CreateCard { message_id, reply })
            .await
    }

    pub async fn delete_card(&self, card_id: CardId) -> ControllerResult<bool> {
        self.request(|reply| Command::DeleteCard { card_id, reply })
            .await
    }

    pub async fn reorder_cards(&self, cards: Vec<ContentCard>) -> ControllerResult<()> {
        self.request(|reply| Command::ReorderCards { cards, reply })
            .await
    }

    pub async fn handle_drag(&self, event: DragEvent) -> ControllerResult<DropAction> {
        self.request(|reply| Command::Drag { event, reply }).await
    }

    /// Latest published render state.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    /// Resolves with the first published snapshot that satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&Arc<Snapshot>) -> bool,
    ) -> ControllerResult<Arc<Snapshot>> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(predicate)
            .await
            .context(SnapshotsClosedSnafu {
                stage: "wait-for-snapshot",
            })?;
        Ok(snapshot.clone())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> ControllerResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = build(reply_tx);
        let stage = command.stage();

        if self.commands.send(command).is_err() {
            return WorkerStoppedSnafu { stage }.fail();
        }

        reply_rx.await.context(ReplyDroppedSnafu { stage })
    }
}

/// Builds the worker and its handle. The caller spawns the worker on a tokio runtime.
pub fn controller(
    config: WorkspaceConfig,
    retitle_delay: Duration,
) -> (ControllerHandle, ControllerWorker) {
    let workspace = Workspace::new(config);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(workspace.snapshot()));

    let state = ControllerState {
        workspace,
        timer_commands: command_tx.downgrade(),
        snapshots: snapshot_tx,
        retitle_delay,
    };
    let handle = ControllerHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
    };

    (handle, Box::pin(state.run(command_rx)))
}

pub fn controller_from_settings(
    settings: &CuratorSettings,
) -> (ControllerHandle, ControllerWorker) {
    controller(settings.workspace_config(), settings.retitle_delay())
}

struct ControllerState {
    workspace: Workspace,
    // Timers only hold weak senders; the worker stops with the last handle.
    timer_commands: mpsc::WeakUnboundedSender<Command>,
    snapshots: watch::Sender<Arc<Snapshot>>,
    retitle_delay: Duration,
}

impl ControllerState {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::info!(
            "controller worker started with retitle delay {:?}",
            self.retitle_delay
        );

        while let Some(command) = commands.recv().await {
            self.dispatch(command);
        }

        tracing::info!("controller worker stopped");
    }

    fn dispatch(&mut self, command: Command) {
        tracing::trace!("controller handling `{}`", command.stage());

        match command {
            Command::AddMessage {
                content,
                role,
                target,
                reply,
            } => {
                let outcome = self.workspace.add_message(content, role, target);
                self.finish(reply, outcome);
            }
            Command::CreateConversation { reply } => {
                let conversation_id = self.workspace.create_new_conversation();
                self.finish(reply, conversation_id);
            }
            Command::DeleteConversation {
                conversation_id,
                reply,
            } => {
                let removed = self.workspace.delete_conversation(conversation_id);
                self.finish(reply, removed);
            }
            Command::SelectConversation {
                conversation_id,
                reply,
            } => {
                let selected = self.workspace.select_conversation(conversation_id);
                self.finish(reply, selected);
            }
            Command::UpdateConversationTitle {
                conversation_id,
                text,
                reply,
            } => {
                self.workspace
                    .update_conversation_title(conversation_id, text);
                self.finish(reply, ());
            }
            Command::CreateCard { message_id, reply } => {
                let card_id = self.workspace.create_card(message_id);
                self.finish(reply, card_id);
            }
            Command::DeleteCard { card_id, reply } => {
                let removed = self.workspace.delete_card(card_id);
                self.finish(reply, removed);
            }
            Command::ReorderCards { cards, reply } => {
                self.workspace.reorder_cards(cards);
                self.finish(reply, ());
            }
            Command::Drag { event, reply } => {
                let action = self.workspace.handle_drag(event);
                self.finish(reply, action);
            }
            Command::FireRetitle { retitle } => {
                if self.workspace.apply_scheduled_retitle(&retitle) {
                    self.publish();
                }
            }
        }
    }

    /// Arms timers for new retitles and publishes before the caller sees the reply.
    fn finish<T>(&mut self, reply: oneshot::Sender<T>, value: T) {
        for retitle in self.workspace.take_scheduled_retitles() {
            self.schedule_retitle(retitle);
        }
        self.publish();

        if reply.send(value).is_err() {
            tracing::debug!("controller caller went away before the reply");
        }
    }

    fn schedule_retitle(&self, retitle: ScheduledRetitle) {
        let commands = self.timer_commands.clone();
        let delay = self.retitle_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(commands) = commands.upgrade() else {
                return;
            };
            if commands.send(Command::FireRetitle { retitle }).is_err() {
                tracing::debug!("controller worker gone before a retitle fired");
            }
        });
    }

    fn publish(&self) {
        self.snapshots
            .send_replace(Arc::new(self.workspace.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use curator_state::{Bounds, DEFAULT_CONVERSATION_TITLE, DragData, DragPhase, Point};
    use tokio::time::Instant;

    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    fn spawn_controller() -> ControllerHandle {
        let (handle, worker) = controller(WorkspaceConfig::default(), DELAY);
        tokio::spawn(worker);
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn retitle_lands_after_the_delay() {
        let handle = spawn_controller();
        let conversation_id = handle.create_new_conversation().await.expect("create");
        let started = Instant::now();

        handle
            .add_message("Plan the garden beds", Role::User, None)
            .await
            .expect("user message");
        handle
            .add_message("Start with the sunniest corner.", Role::Assistant, None)
            .await
            .expect("assistant message");
        assert_eq!(handle.snapshot().current_title, DEFAULT_CONVERSATION_TITLE);

        let snapshot = handle
            .wait_for(|snapshot| snapshot.current_title != DEFAULT_CONVERSATION_TITLE)
            .await
            .expect("retitled snapshot");

        assert!(started.elapsed() >= DELAY);
        assert_eq!(snapshot.current_title, "Plan the garden beds");
        assert_eq!(
            snapshot
                .conversation(conversation_id)
                .map(|conversation| conversation.messages.len()),
            Some(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn later_retitle_does_not_overwrite_an_applied_title() {
        let handle = spawn_controller();
        let conversation_id = handle.create_new_conversation().await.expect("create");

        handle
            .update_conversation_title(conversation_id, "first topic")
            .await
            .expect("first retitle");
        handle
            .wait_for(|snapshot| snapshot.current_title == "first topic")
            .await
            .expect("first title");

        handle
            .update_conversation_title(conversation_id, "second topic")
            .await
            .expect("second retitle");
        tokio::time::sleep(DELAY * 3).await;
        assert_eq!(handle.snapshot().current_title, "first topic");
    }

    #[tokio::test(start_paused = true)]
    async fn pending_thread_is_promoted_with_its_title() {
        let handle = spawn_controller();
        let question = handle
            .add_message("What is a monad", Role::User, None)
            .await
            .expect("user message");

        let pending = handle.snapshot();
        assert_eq!(pending.pending_conversation_id, Some(question.conversation_id));
        assert!(pending.conversations.is_empty());

        handle
            .add_message("A monoid in the category of endofunctors.", Role::Assistant, None)
            .await
            .expect("assistant message");

        let promoted = handle.snapshot();
        assert_eq!(promoted.pending_conversation_id, None);
        assert_eq!(promoted.conversations.len(), 1);
        assert_eq!(promoted.current_title, "What is a monad");
    }

    #[tokio::test(start_paused = true)]
    async fn drag_events_reorder_cards() {
        let handle = spawn_controller();
        handle.create_new_conversation().await.expect("create");

        let mut message_ids = Vec::new();
        for content in ["alpha", "beta", "gamma"] {
            let outcome = handle
                .add_message(content, Role::Assistant, None)
                .await
                .expect("assistant message");
            message_ids.push(outcome.message_id);
        }
        for message_id in &message_ids {
            handle
                .create_card(*message_id)
                .await
                .expect("create card")
                .expect("new card");
        }

        // Newest first: gamma, beta, alpha.
        let cards = handle.snapshot().cards.clone();
        let dragged = cards[0].id;
        let target = cards[2].id;

        handle
            .handle_drag(DragEvent::CardDragStart { card_id: dragged })
            .await
            .expect("drag start");
        assert_eq!(handle.snapshot().drag.dragged_card, Some(dragged));

        let action = handle
            .handle_drag(DragEvent::CardDrop {
                card_id: target,
                data: DragData::for_card(dragged),
            })
            .await
            .expect("drop");
        assert_eq!(action, DropAction::Reorder { dragged, target });

        handle
            .handle_drag(DragEvent::DragEnd)
            .await
            .expect("drag end");

        let snapshot = handle.snapshot();
        let titles = snapshot
            .cards
            .iter()
            .map(|card| card.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["beta", "alpha", "gamma"]);
        assert_eq!(snapshot.drag.phase, DragPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn external_drop_creates_a_card_once() {
        let handle = spawn_controller();
        let outcome = handle
            .add_message("Keep this answer", Role::Assistant, None)
            .await
            .expect("assistant message");
        let data = DragData::for_message(outcome.message_id);
        let region = Bounds::new(0.0, 0.0, 100.0, 100.0);

        handle
            .handle_drag(DragEvent::RegionDragOver { data: data.clone() })
            .await
            .expect("drag over");
        assert!(handle.snapshot().drag.drop_zone_armed);

        handle
            .handle_drag(DragEvent::RegionDragLeave {
                data: data.clone(),
                pointer: Point::new(50.0, 50.0),
                region,
            })
            .await
            .expect("inner leave");
        assert!(handle.snapshot().drag.drop_zone_armed);

        for _ in 0..2 {
            handle
                .handle_drag(DragEvent::RegionDrop { data: data.clone() })
                .await
                .expect("drop");
        }

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.cards.len(), 1);
        assert_eq!(snapshot.cards[0].content, "Keep this answer");
        assert!(!snapshot.shows_empty_card_hint());
    }

    #[tokio::test(start_paused = true)]
    async fn worker_exits_once_every_handle_is_dropped() {
        let (handle, worker) = controller(WorkspaceConfig::default(), DELAY);
        let task = tokio::spawn(worker);

        let conversation_id = handle.create_new_conversation().await.expect("create");
        handle
            .update_conversation_title(conversation_id, "left behind")
            .await
            .expect("retitle");
        drop(handle);

        task.await.expect("worker task");
    }

    #[tokio::test]
    async fn requests_fail_when_the_worker_is_gone() {
        let (handle, worker) = controller(WorkspaceConfig::default(), DELAY);
        drop(worker);

        let error = handle
            .create_new_conversation()
            .await
            .expect_err("worker dropped");
        assert!(matches!(
            error,
            ControllerError::WorkerStopped {
                stage: "create-conversation"
            }
        ));
    }
}
