#![deny(unsafe_code)]

pub mod controller;
pub mod events;
pub mod settings;
pub mod telemetry;

pub use controller::{
    ControllerError, ControllerHandle, ControllerResult, ControllerWorker, controller,
    controller_from_settings,
};
pub use events::Command;
pub use settings::{CuratorSettings, SettingsError, SettingsSource, TitleSettings};
pub use telemetry::init_tracing;
