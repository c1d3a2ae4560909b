use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use snafu::{OptionExt, ResultExt, Snafu, ensure};

use curator::{
    ControllerError, ControllerHandle, CuratorSettings, SettingsError, SettingsSource,
    controller_from_settings, init_tracing,
};
use curator_state::{
    Bounds, DEFAULT_CONVERSATION_TITLE, DragData, DragEvent, DropAction, Point, Role, Snapshot,
};

#[derive(Debug, Clone)]
struct RunnerArgs {
    scenario: Scenario,
    settings_path: Option<PathBuf>,
    print_snapshot: bool,
}

#[derive(Debug, Clone, Copy)]
enum Scenario {
    PendingPromotion,
    DeleteSwitch,
    CardDedupe,
    DragReorder,
    DeferredRetitle,
    All,
}

impl Scenario {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending_promotion" => Some(Self::PendingPromotion),
            "delete_switch" => Some(Self::DeleteSwitch),
            "card_dedupe" => Some(Self::CardDedupe),
            "drag_reorder" => Some(Self::DragReorder),
            "deferred_retitle" => Some(Self::DeferredRetitle),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::PendingPromotion => "pending_promotion",
            Self::DeleteSwitch => "delete_switch",
            Self::CardDedupe => "card_dedupe",
            Self::DragReorder => "drag_reorder",
            Self::DeferredRetitle => "deferred_retitle",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Snafu)]
enum RunnerError {
    #[snafu(display("missing required --scenario argument"))]
    MissingScenario { stage: &'static str },
    #[snafu(display("missing value for argument '{arg}'"))]
    MissingArgumentValue {
        stage: &'static str,
        arg: &'static str,
    },
    #[snafu(display("unknown scenario '{raw}'"))]
    UnknownScenario { stage: &'static str, raw: String },
    #[snafu(display("unknown argument '{raw}'"))]
    UnknownArgument { stage: &'static str, raw: String },
    #[snafu(display("settings could not be loaded: {source}"))]
    Settings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("controller request failed: {source}"))]
    Controller {
        stage: &'static str,
        source: ControllerError,
    },
    #[snafu(display("scenario '{scenario}' failed: {reason}"))]
    ScenarioFailed {
        stage: &'static str,
        scenario: &'static str,
        reason: String,
    },
    #[snafu(display("retitle did not land within {waited:?}"))]
    RetitleTimeout {
        stage: &'static str,
        waited: Duration,
        source: tokio::time::error::Elapsed,
    },
    #[snafu(display("failed to serialize snapshot: {source}"))]
    SerializeSnapshot {
        stage: &'static str,
        source: serde_json::Error,
    },
}

type RunnerResult<T> = Result<T, RunnerError>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        println!("runner_ok=false");
        eprintln!("runner_error={error}");
        std::process::exit(1);
    }
}

async fn run() -> RunnerResult<()> {
    let args = parse_args(env::args().skip(1))?;
    let source = match args.settings_path.clone() {
        Some(path) => SettingsSource::new(path),
        None => SettingsSource::at_default_path(),
    };
    println!("settings_path={}", source.config_path().display());
    let settings = source.load().context(SettingsSnafu {
        stage: "load-settings",
    })?;
    init_tracing(&settings.log_filter);

    println!("scenario={}", args.scenario.name());

    let snapshot = match args.scenario {
        Scenario::PendingPromotion => run_pending_promotion(&settings).await?,
        Scenario::DeleteSwitch => run_delete_switch(&settings).await?,
        Scenario::CardDedupe => run_card_dedupe(&settings).await?,
        Scenario::DragReorder => run_drag_reorder(&settings).await?,
        Scenario::DeferredRetitle => run_deferred_retitle(&settings).await?,
        Scenario::All => run_all(&settings).await?,
    };

    if args.print_snapshot {
        let json = serde_json::to_string(&*snapshot).context(SerializeSnapshotSnafu {
            stage: "print-snapshot",
        })?;
        println!("snapshot={json}");
    }

    println!("runner_ok=true");
    Ok(())
}

fn parse_args(args: impl IntoIterator<Item = String>) -> RunnerResult<RunnerArgs> {
    let mut scenario = None;
    let mut settings_path = None;
    let mut print_snapshot = false;
    let mut pending = args.into_iter();

    while let Some(argument) = pending.next() {
        match argument.as_str() {
            "--scenario" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-scenario-value",
                    arg: "--scenario",
                })?;

                let parsed = Scenario::parse(&value).context(UnknownScenarioSnafu {
                    stage: "parse-args-scenario",
                    raw: value,
                })?;
                scenario = Some(parsed);
            }
            "--settings" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-settings-value",
                    arg: "--settings",
                })?;
                settings_path = Some(PathBuf::from(value));
            }
            "--print-snapshot" => print_snapshot = true,
            _ => {
                return UnknownArgumentSnafu {
                    stage: "parse-args",
                    raw: argument,
                }
                .fail();
            }
        }
    }

    Ok(RunnerArgs {
        scenario: scenario.context(MissingScenarioSnafu {
            stage: "parse-args-scenario-required",
        })?,
        settings_path,
        print_snapshot,
    })
}

fn spawn_controller(settings: &CuratorSettings) -> ControllerHandle {
    let (handle, worker) = controller_from_settings(settings);
    tokio::spawn(worker);
    handle
}

async fn run_pending_promotion(
    settings: &CuratorSettings,
) -> RunnerResult<Arc<Snapshot>> {
    let handle = spawn_controller(settings);
    let prompt = "Summarize quantum computing advances this week please";

    let question = handle
        .add_message(prompt, Role::User, None)
        .await
        .context(ControllerSnafu {
            stage: "scenario-pending-promotion-question",
        })?;
    let pending = handle.snapshot();
    let pending_ok = pending.pending_conversation_id == Some(question.conversation_id)
        && pending.conversations.is_empty()
        && pending.displayed_messages.len() == 1;

    handle
        .add_message("Several labs reported new error-correction results.", Role::Assistant, None)
        .await
        .context(ControllerSnafu {
            stage: "scenario-pending-promotion-answer",
        })?;
    let promoted = handle.snapshot();
    let expected_title = settings.title.to_rules().synthesize(prompt);
    let promoted_ok = promoted.pending_conversation_id.is_none()
        && promoted.conversations.len() == 1
        && promoted.current_conversation_id == Some(question.conversation_id)
        && promoted.current_title == expected_title;

    println!("pending_ok={pending_ok}");
    println!("promoted_ok={promoted_ok}");
    println!("promoted_title={}", promoted.current_title);
    ensure!(
        pending_ok && promoted_ok,
        ScenarioFailedSnafu {
            stage: "scenario-pending-promotion",
            scenario: "pending_promotion",
            reason: "pending thread was not promoted with a synthesized title",
        }
    );

    Ok(promoted)
}

async fn run_delete_switch(settings: &CuratorSettings) -> RunnerResult<Arc<Snapshot>> {
    let handle = spawn_controller(settings);

    let older = handle
        .create_new_conversation()
        .await
        .context(ControllerSnafu {
            stage: "scenario-delete-switch-create-older",
        })?;
    let newer = handle
        .create_new_conversation()
        .await
        .context(ControllerSnafu {
            stage: "scenario-delete-switch-create-newer",
        })?;

    let removed = handle
        .delete_conversation(newer)
        .await
        .context(ControllerSnafu {
            stage: "scenario-delete-switch-delete",
        })?;
    let switched = handle.snapshot();
    let switched_ok = removed && switched.current_conversation_id == Some(older);

    let removed_last = handle
        .delete_conversation(older)
        .await
        .context(ControllerSnafu {
            stage: "scenario-delete-switch-delete-last",
        })?;
    let emptied = handle.snapshot();
    let emptied_ok = removed_last
        && emptied.current_conversation_id.is_none()
        && !emptied.has_active_conversation
        && emptied.current_title == DEFAULT_CONVERSATION_TITLE;

    println!("switched_ok={switched_ok}");
    println!("emptied_ok={emptied_ok}");
    ensure!(
        switched_ok && emptied_ok,
        ScenarioFailedSnafu {
            stage: "scenario-delete-switch",
            scenario: "delete_switch",
            reason: "deleting the current conversation did not move the selection",
        }
    );

    Ok(emptied)
}

async fn run_card_dedupe(settings: &CuratorSettings) -> RunnerResult<Arc<Snapshot>> {
    let handle = spawn_controller(settings);

    let answer = handle
        .add_message("Use a binary heap for the scheduler queue.", Role::Assistant, None)
        .await
        .context(ControllerSnafu {
            stage: "scenario-card-dedupe-answer",
        })?;
    let repeat = handle
        .add_message("Use a binary heap for the scheduler queue.", Role::Assistant, None)
        .await
        .context(ControllerSnafu {
            stage: "scenario-card-dedupe-repeat",
        })?;

    let first = handle
        .create_card(answer.message_id)
        .await
        .context(ControllerSnafu {
            stage: "scenario-card-dedupe-first",
        })?;
    let second = handle
        .create_card(repeat.message_id)
        .await
        .context(ControllerSnafu {
            stage: "scenario-card-dedupe-second",
        })?;

    let snapshot = handle.snapshot();
    let dedupe_ok = first.is_some() && second.is_none() && snapshot.cards.len() == 1;

    println!("card_count={}", snapshot.cards.len());
    println!("dedupe_ok={dedupe_ok}");
    ensure!(
        dedupe_ok,
        ScenarioFailedSnafu {
            stage: "scenario-card-dedupe",
            scenario: "card_dedupe",
            reason: "identical content produced more than one card",
        }
    );

    Ok(snapshot)
}

async fn run_drag_reorder(settings: &CuratorSettings) -> RunnerResult<Arc<Snapshot>> {
    let handle = spawn_controller(settings);
    let region = Bounds::new(0.0, 0.0, 400.0, 800.0);

    for content in ["first answer", "second answer", "third answer"] {
        let outcome = handle
            .add_message(content, Role::Assistant, None)
            .await
            .context(ControllerSnafu {
                stage: "scenario-drag-reorder-answer",
            })?;
        let data = DragData::for_message(outcome.message_id);

        handle
            .handle_drag(DragEvent::RegionDragOver { data: data.clone() })
            .await
            .context(ControllerSnafu {
                stage: "scenario-drag-reorder-external-over",
            })?;
        handle
            .handle_drag(DragEvent::RegionDragLeave {
                data: data.clone(),
                pointer: Point::new(200.0, 400.0),
                region,
            })
            .await
            .context(ControllerSnafu {
                stage: "scenario-drag-reorder-external-leave",
            })?;
        handle
            .handle_drag(DragEvent::RegionDrop { data })
            .await
            .context(ControllerSnafu {
                stage: "scenario-drag-reorder-external-drop",
            })?;
        handle
            .handle_drag(DragEvent::DragEnd)
            .await
            .context(ControllerSnafu {
                stage: "scenario-drag-reorder-external-end",
            })?;
    }

    let before = handle.snapshot();
    let dragged = before.cards.first().map(|card| card.id);
    let target = before.cards.last().map(|card| card.id);
    let (Some(dragged), Some(target)) = (dragged, target) else {
        return ScenarioFailedSnafu {
            stage: "scenario-drag-reorder-seed",
            scenario: "drag_reorder",
            reason: format!("expected 3 cards, found {}", before.cards.len()),
        }
        .fail();
    };

    let events = [
        DragEvent::CardDragStart { card_id: dragged },
        DragEvent::CardDragOver {
            card_id: target,
            data: DragData::for_card(dragged),
        },
        DragEvent::CardDrop {
            card_id: target,
            data: DragData::for_card(dragged),
        },
    ];
    let mut last_action = DropAction::None;
    for event in events {
        last_action = handle.handle_drag(event).await.context(ControllerSnafu {
            stage: "scenario-drag-reorder-internal",
        })?;
    }
    handle
        .handle_drag(DragEvent::DragEnd)
        .await
        .context(ControllerSnafu {
            stage: "scenario-drag-reorder-internal-end",
        })?;

    let after = handle.snapshot();
    let titles = after
        .cards
        .iter()
        .map(|card| card.title.as_str())
        .collect::<Vec<_>>();
    let reorder_ok = last_action == DropAction::Reorder { dragged, target }
        && titles == ["second answer", "first answer", "third answer"]
        && after.drag == Default::default();

    println!("card_order={}", titles.join("|"));
    println!("reorder_ok={reorder_ok}");
    ensure!(
        reorder_ok,
        ScenarioFailedSnafu {
            stage: "scenario-drag-reorder",
            scenario: "drag_reorder",
            reason: "dragging the first card onto the last did not splice it into place",
        }
    );

    Ok(after)
}

async fn run_deferred_retitle(
    settings: &CuratorSettings,
) -> RunnerResult<Arc<Snapshot>> {
    let handle = spawn_controller(settings);
    let prompt = "Draft a packing list for a week of winter hiking";

    handle
        .create_new_conversation()
        .await
        .context(ControllerSnafu {
            stage: "scenario-deferred-retitle-create",
        })?;
    handle
        .add_message(prompt, Role::User, None)
        .await
        .context(ControllerSnafu {
            stage: "scenario-deferred-retitle-question",
        })?;
    handle
        .add_message("Layers, microspikes and a stove.", Role::Assistant, None)
        .await
        .context(ControllerSnafu {
            stage: "scenario-deferred-retitle-answer",
        })?;

    let deferred = handle.snapshot().current_title == DEFAULT_CONVERSATION_TITLE;
    let waited = settings.retitle_delay() * 10 + Duration::from_secs(1);
    let snapshot = tokio::time::timeout(
        waited,
        handle.wait_for(|snapshot| snapshot.current_title != DEFAULT_CONVERSATION_TITLE),
    )
    .await
    .context(RetitleTimeoutSnafu {
        stage: "scenario-deferred-retitle-wait",
        waited,
    })?
    .context(ControllerSnafu {
        stage: "scenario-deferred-retitle-wait",
    })?;

    let expected_title = settings.title.to_rules().synthesize(prompt);
    let retitle_ok = deferred && snapshot.current_title == expected_title;

    println!("deferred={deferred}");
    println!("retitled_to={}", snapshot.current_title);
    println!("retitle_ok={retitle_ok}");
    ensure!(
        retitle_ok,
        ScenarioFailedSnafu {
            stage: "scenario-deferred-retitle",
            scenario: "deferred_retitle",
            reason: format!("expected title '{expected_title}'"),
        }
    );

    Ok(snapshot)
}

async fn run_all(settings: &CuratorSettings) -> RunnerResult<Arc<Snapshot>> {
    run_pending_promotion(settings).await?;
    run_delete_switch(settings).await?;
    run_card_dedupe(settings).await?;
    let snapshot = run_drag_reorder(settings).await?;
    run_deferred_retitle(settings).await?;

    println!("all_passed=true");
    Ok(snapshot)
}
