//! Core library for the Screen Sentinel daemon.
//!
//! The daemon watches a music player's status file and keeps two outputs in
//! step with it: a companion visualizer process and the display backlight. A
//! manual override channel can force the screen either way.
//!
//! Leaf modules (`status`, `control`, `display`, `visualizer`) are thin I/O
//! wrappers behind small traits. All policy lives in [`ReconciliationEngine`],
//! which [`PollLoop`] drives at a fixed cadence.

pub mod config;
pub mod control;
pub mod display;
pub mod engine;
pub mod error;
pub mod poll;
pub mod status;
pub mod visualizer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AppConfig, DisplayConfig, EngineConfig, PollConfig, VisualizerConfig};
pub use control::{FileOverrideSource, OverrideCommand, OverrideSource};
pub use display::{DisplayController, SysfsBacklight};
pub use engine::{EngineState, ReconciliationEngine};
pub use error::{Result, SentinelError};
pub use poll::{PollLoop, ShutdownSignal};
pub use status::{FileStatusSource, PlaybackStatus, SourceKind, StatusSource};
pub use visualizer::{ProcessSupervisor, VisualizerSupervisor};
