//! Ad break scheduling for a media playback timeline.
//!
//! The scheduler decides when preroll, midroll, and postroll breaks fire.
//! The binding registry owns the event subscriptions that drive it. The
//! player and the ad SDK wrappers are collaborators behind the traits in
//! `playback`. The CLI and any hosting player consume this crate.

pub mod ad_config;
pub mod ad_scheduler;
pub mod bindings;
pub mod error;
pub mod event;
pub mod log;
pub mod playback;
pub mod sim;

pub use ad_config::{AdRef, AdScheduleConfig, BreakKind, ConfiguredAdBreak};
pub use ad_scheduler::{AdScheduler, AdSchedulerStatus, PostrollStage};
pub use error::ConfigError;
pub use event::{AdNotification, PlaybackEvent};
pub use playback::{AdPluginController, ControllerRole, Flush, PlaybackSource, RegisteredController};
