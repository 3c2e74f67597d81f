//! Scripted simulation of a player and its ad controllers.
//!
//! `Simulation` owns an in-memory player, a scheduler, and probe-backed
//! controllers, then replays `ScriptStep`s against them. With `auto_play`
//! on, every break the primary controller is asked to play is acted out as
//! break-start → ad-loaded → ad-started → break-end.

use crate::ad_config::{AdRef, AdScheduleConfig};
use crate::ad_scheduler::{AdScheduler, AdSchedulerStatus};
use crate::error::ConfigError;
use crate::event::{Ad, AdBreak, AdNotification, ErrorSeverity, PlaybackEvent};
use crate::log::AdLog;
use crate::playback::{AdPluginController, ControllerRole, Flush, PlaybackSource, RegisteredController, SourceId};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::rc::Rc;

// ── Player ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SimPlayer {
    pub source: SourceId,
    pub time: f64,
    pub paused: bool,
    pub config: AdScheduleConfig,
}

impl SimPlayer {
    pub fn new(config: AdScheduleConfig) -> Self {
        SimPlayer {
            source: SourceId(1),
            time: 0.0,
            paused: false,
            config,
        }
    }
}

impl PlaybackSource for SimPlayer {
    fn source_id(&self) -> SourceId {
        self.source
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn ad_config(&self) -> &AdScheduleConfig {
        &self.config
    }
}

// ── Controller ───────────────────────────────────────────────────────────────

/// Observable state of a `SimController`, shared with whoever created it.
#[derive(Debug, Default)]
pub struct ControllerProbe {
    pub active: bool,
    pub done: bool,
    /// Answer flush requests with `Flush::Pending` instead of `Flush::Done`.
    pub defer_flush: bool,
    /// Every pod passed to `play_ad_now`, in order.
    pub commanded: Vec<Vec<AdRef>>,
    /// Pods not yet acted out by the simulation.
    pub pending: VecDeque<Vec<AdRef>>,
    pub skips: usize,
    pub flush_requests: usize,
}

pub type Probe = Rc<RefCell<ControllerProbe>>;

pub struct SimController {
    name: String,
    probe: Probe,
}

impl SimController {
    pub fn new(name: impl Into<String>) -> (Self, Probe) {
        let probe = Probe::default();
        let controller = SimController {
            name: name.into(),
            probe: probe.clone(),
        };
        (controller, probe)
    }
}

impl AdPluginController for SimController {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.probe.borrow().active
    }

    fn is_done(&self) -> bool {
        self.probe.borrow().done
    }

    fn play_ad_now(&mut self, ads: &[AdRef]) {
        let mut probe = self.probe.borrow_mut();
        probe.commanded.push(ads.to_vec());
        probe.pending.push_back(ads.to_vec());
    }

    fn skip_ad(&mut self) {
        self.probe.borrow_mut().skips += 1;
    }

    fn on_playback_ended(&mut self) -> Flush {
        let mut probe = self.probe.borrow_mut();
        probe.flush_requests += 1;
        if probe.defer_flush { Flush::Pending } else { Flush::Done }
    }
}

// ── Script ───────────────────────────────────────────────────────────────────

/// One scripted action against the simulated player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Playback progressed to `at` seconds.
    Time { at: f64 },
    /// A seek to `to` seconds completed.
    Seek { to: f64 },
    Pause,
    Resume,
    Ended,
    /// A controller reported the positions it can serve.
    Manifest { positions: Vec<f64> },
    /// The controller in `role` finished flushing.
    Flush { role: ControllerRole },
    /// Make the controller in `role` defer its flush.
    DeferFlush { role: ControllerRole },
    /// The controller in `role` has no further obligations.
    AdsCompleted { role: ControllerRole },
    AdError {
        #[serde(default)]
        critical: bool,
    },
    PlayAdNow { ads: Vec<AdRef> },
    SkipAd,
    Reset,
}

/// Read a JSON array of script steps.
pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&data)?)
}

// ── Simulation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    /// The primary controller was asked to play a pod.
    Commanded { at: f64, ads: Vec<String> },
    Notified { notification: AdNotification },
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub transcript: Vec<TranscriptEntry>,
    pub status: AdSchedulerStatus,
}

/// How a `Simulation` wires its controllers.
#[derive(Debug, Clone, Copy)]
pub struct SimOptions {
    /// Register a bumper controller next to the primary.
    pub with_bumper: bool,
    /// Act out commanded breaks instead of leaving them loading.
    pub auto_play: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        SimOptions {
            with_bumper: false,
            auto_play: true,
        }
    }
}

pub struct Simulation {
    pub player: SimPlayer,
    pub scheduler: AdScheduler,
    pub primary: Probe,
    pub bumper: Option<Probe>,
    pub auto_play: bool,
    transcript: Vec<TranscriptEntry>,
}

impl Simulation {
    pub fn new(config: AdScheduleConfig, options: SimOptions, log: impl AdLog + 'static) -> Self {
        let player = SimPlayer::new(config);
        let (primary_ctl, primary) = SimController::new("primary");
        let mut controllers = vec![RegisteredController::primary(primary_ctl)];
        let bumper = if options.with_bumper {
            let (bumper_ctl, probe) = SimController::new("bumper");
            controllers.push(RegisteredController::bumper(bumper_ctl));
            Some(probe)
        } else {
            None
        };

        let mut scheduler = AdScheduler::new(log);
        scheduler.initialize(&player, controllers);

        let mut sim = Simulation {
            player,
            scheduler,
            primary,
            bumper,
            auto_play: options.auto_play,
            transcript: Vec::new(),
        };
        sim.settle();
        sim
    }

    pub fn run(&mut self, steps: &[ScriptStep]) {
        for step in steps {
            self.apply(step);
        }
    }

    pub fn apply(&mut self, step: &ScriptStep) {
        match step {
            ScriptStep::Time { at } => {
                self.player.time = *at;
                self.emit(PlaybackEvent::TimeUpdate);
            }
            ScriptStep::Seek { to } => {
                self.player.time = *to;
                self.emit(PlaybackEvent::Seeked);
            }
            ScriptStep::Pause => self.player.paused = true,
            ScriptStep::Resume => self.player.paused = false,
            ScriptStep::Ended => self.emit(PlaybackEvent::Ended),
            ScriptStep::Manifest { positions } => {
                self.emit(PlaybackEvent::ManifestReady(positions.clone()));
            }
            ScriptStep::Flush { role } => self.emit(PlaybackEvent::PlaybackFlushed(*role)),
            ScriptStep::DeferFlush { role } => {
                if let Some(probe) = self.probe(*role) {
                    probe.borrow_mut().defer_flush = true;
                }
            }
            ScriptStep::AdsCompleted { role } => {
                if let Some(probe) = self.probe(*role) {
                    probe.borrow_mut().done = true;
                }
                self.emit(PlaybackEvent::AdsCompleted);
            }
            ScriptStep::AdError { critical } => {
                let severity = if *critical {
                    ErrorSeverity::Critical
                } else {
                    ErrorSeverity::Warning
                };
                self.emit(PlaybackEvent::AdError {
                    severity,
                    message: "simulated ad error".to_string(),
                });
            }
            ScriptStep::PlayAdNow { ads } => {
                self.scheduler.play_ad_now(&self.player, ads.clone());
                self.settle();
            }
            ScriptStep::SkipAd => {
                self.scheduler.skip_ad();
                self.settle();
            }
            ScriptStep::Reset => self.emit(PlaybackEvent::SourceReset),
        }
    }

    /// Deliver `event` and play out anything it caused.
    pub fn emit(&mut self, event: PlaybackEvent) {
        self.scheduler.handle_event(&self.player, &event);
        self.settle();
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            transcript: self.transcript.clone(),
            status: self.scheduler.status(),
        }
    }

    fn probe(&self, role: ControllerRole) -> Option<&Probe> {
        match role {
            ControllerRole::Primary => Some(&self.primary),
            ControllerRole::Bumper => self.bumper.as_ref(),
        }
    }

    fn settle(&mut self) {
        loop {
            for notification in self.scheduler.take_notifications() {
                self.transcript.push(TranscriptEntry::Notified { notification });
            }
            let next = self.primary.borrow_mut().pending.pop_front();
            let Some(ads) = next else {
                break;
            };
            self.transcript.push(TranscriptEntry::Commanded {
                at: self.player.time,
                ads: ads.iter().map(|a| a.id.clone()).collect(),
            });
            if self.auto_play {
                self.play_out(&ads);
            }
        }
    }

    fn play_out(&mut self, ads: &[AdRef]) {
        self.primary.borrow_mut().active = true;
        self.deliver(PlaybackEvent::AdBreakStarted(AdBreak {
            position: self.player.time,
            ad_count: ads.len(),
        }));
        for (index, ad) in ads.iter().enumerate() {
            let ad = Ad {
                id: ad.id.clone(),
                index,
                duration: None,
            };
            self.deliver(PlaybackEvent::AdLoaded(ad.clone()));
            self.deliver(PlaybackEvent::AdStarted(ad));
        }
        self.deliver(PlaybackEvent::AdBreakEnded);
        self.primary.borrow_mut().active = false;
    }

    fn deliver(&mut self, event: PlaybackEvent) {
        self.scheduler.handle_event(&self.player, &event);
    }
}
