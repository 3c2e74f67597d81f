//! Collaborator contracts: the playback source the scheduler reads from and
//! the ad plugin controllers it commands.

use crate::ad_config::{AdRef, AdScheduleConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an event source, used as the binding registry's source key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceId(pub u32);

/// The hosting player. Borrowed for the duration of each call, never stored.
pub trait PlaybackSource {
    fn source_id(&self) -> SourceId;
    /// Content playhead in seconds.
    fn current_time(&self) -> f64;
    fn is_paused(&self) -> bool;
    fn ad_config(&self) -> &AdScheduleConfig;
}

/// Role assigned to a controller at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerRole {
    /// Plays scheduled and on-demand breaks.
    Primary,
    /// Plays the short branding clip ahead of the postroll.
    Bumper,
}

impl fmt::Display for ControllerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerRole::Primary => write!(f, "primary"),
            ControllerRole::Bumper => write!(f, "bumper"),
        }
    }
}

/// Outcome of asking a controller to flush in-flight ad playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Nothing was in flight, or it finished synchronously.
    Done,
    /// The controller reports completion later with
    /// `PlaybackEvent::PlaybackFlushed` for its role.
    Pending,
}

/// An ad SDK wrapper able to play ad pods.
pub trait AdPluginController {
    fn name(&self) -> &str;
    /// Currently presenting an ad.
    fn is_active(&self) -> bool;
    /// Has no further ad obligations this session.
    fn is_done(&self) -> bool;
    fn play_ad_now(&mut self, ads: &[AdRef]);
    fn skip_ad(&mut self);
    fn on_playback_ended(&mut self) -> Flush;
}

/// A controller together with the role it was registered under.
pub struct RegisteredController {
    pub role: ControllerRole,
    pub controller: Box<dyn AdPluginController>,
}

impl RegisteredController {
    pub fn new(role: ControllerRole, controller: impl AdPluginController + 'static) -> Self {
        RegisteredController {
            role,
            controller: Box::new(controller),
        }
    }

    pub fn primary(controller: impl AdPluginController + 'static) -> Self {
        Self::new(ControllerRole::Primary, controller)
    }

    pub fn bumper(controller: impl AdPluginController + 'static) -> Self {
        Self::new(ControllerRole::Bumper, controller)
    }
}

impl fmt::Debug for RegisteredController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredController")
            .field("role", &self.role)
            .field("name", &self.controller.name())
            .finish()
    }
}

/// First controller registered under `role`.
pub(crate) fn find_role(
    controllers: &mut [RegisteredController],
    role: ControllerRole,
) -> Option<&mut RegisteredController> {
    controllers.iter_mut().find(|c| c.role == role)
}
