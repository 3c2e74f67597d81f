//! Ad break scheduler.
//!
//! Decides when preroll, midroll, and postroll breaks fire, tracks which
//! configured breaks have played, and keeps the runtime break/ad state in
//! step with the controller's lifecycle events. All input arrives through
//! [`AdScheduler::handle_event`], routed by the binding registry to the
//! handler bound for that event type.

use crate::ad_config::{AdRef, BreakKind, ConfiguredAdBreak, POSTROLL, PREROLL};
use crate::bindings::BindingRegistry;
use crate::event::{Ad, AdBreak, AdNotification, ErrorSeverity, EventKind, PlaybackEvent};
use crate::log::{AdLog, TracingLog};
use crate::playback::{ControllerRole, Flush, PlaybackSource, RegisteredController, SourceId, find_role};
use serde::Serialize;
use tracing::Level;

type Handler = fn(&mut AdScheduler, &dyn PlaybackSource, &PlaybackEvent);

/// Events the scheduler subscribes to, with their handlers.
fn subscriptions() -> [(EventKind, Handler); 12] {
    [
        (EventKind::ManifestReady, AdScheduler::on_manifest_ready as Handler),
        (EventKind::AdBreakStarted, AdScheduler::on_ad_break_started as Handler),
        (EventKind::AdLoaded, AdScheduler::on_ad_loaded as Handler),
        (EventKind::AdStarted, AdScheduler::on_ad_started as Handler),
        (EventKind::AdBreakEnded, AdScheduler::on_ad_break_ended as Handler),
        (EventKind::AdsCompleted, AdScheduler::on_ads_completed as Handler),
        (EventKind::AdError, AdScheduler::on_ad_error as Handler),
        (EventKind::Ended, AdScheduler::on_ended as Handler),
        (EventKind::TimeUpdate, AdScheduler::on_time_update as Handler),
        (EventKind::Seeked, AdScheduler::on_seeked as Handler),
        (EventKind::SourceReset, AdScheduler::on_source_reset as Handler),
        (EventKind::PlaybackFlushed, AdScheduler::on_playback_flushed as Handler),
    ]
}

/// Progress of the postroll sequence: bumper flush, then primary flush,
/// then dispatch. At most one flush is outstanding at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostrollStage {
    Idle,
    AwaitingBumper,
    AwaitingPrimary,
}

/// Serializable snapshot for host UIs.
#[derive(Debug, Clone, Serialize)]
pub struct AdSchedulerStatus {
    pub is_ad_break: bool,
    pub all_ads_completed: bool,
    pub ad_is_loading: bool,
    pub ad_played: bool,
    pub snapback: f64,
    pub layout: Vec<f64>,
    pub postroll: PostrollStage,
    pub breaks: Vec<ConfiguredAdBreak>,
}

pub struct AdScheduler {
    log: Box<dyn AdLog>,
    bindings: BindingRegistry<SourceId, Handler>,
    controllers: Vec<RegisteredController>,
    breaks: Vec<ConfiguredAdBreak>,
    /// Every position discovered this session, sorted and deduplicated.
    layout: Vec<f64>,
    ad_break: Option<AdBreak>,
    ad: Option<Ad>,
    all_ads_completed: bool,
    /// Midrolls at or below this position do not fire.
    snapback: f64,
    ad_is_loading: bool,
    ad_played: bool,
    monitor_midrolls: bool,
    postroll: PostrollStage,
    /// `AllAdsCompleted` has been emitted this session.
    completion_notified: bool,
    outbox: Vec<AdNotification>,
}

impl AdScheduler {
    pub fn new(log: impl AdLog + 'static) -> Self {
        AdScheduler {
            log: Box::new(log),
            bindings: BindingRegistry::new(),
            controllers: Vec::new(),
            breaks: Vec::new(),
            layout: Vec::new(),
            ad_break: None,
            ad: None,
            all_ads_completed: true,
            snapback: 0.0,
            ad_is_loading: false,
            ad_played: false,
            monitor_midrolls: false,
            postroll: PostrollStage::Idle,
            completion_notified: false,
            outbox: Vec::new(),
        }
    }

    /// Register controllers, subscribe to `player`, and ingest its configured
    /// breaks. A preroll is dispatched immediately if one is due.
    pub fn initialize(&mut self, player: &dyn PlaybackSource, controllers: Vec<RegisteredController>) {
        self.controllers = controllers;
        self.setup(player);
    }

    /// Drop all subscriptions and start over from `player`'s configuration.
    /// Controllers stay registered.
    pub fn reset(&mut self, player: &dyn PlaybackSource) {
        self.log.record(Level::INFO, "resetting ad schedule");
        self.setup(player);
    }

    /// Tear down every subscription. Later events are ignored until the
    /// scheduler is initialized again.
    pub fn destroy(&mut self) {
        self.bindings.destroy();
        self.controllers.clear();
        self.breaks.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.bindings.is_destroyed()
    }

    fn setup(&mut self, player: &dyn PlaybackSource) {
        if self.bindings.is_destroyed() {
            self.bindings = BindingRegistry::new();
        } else {
            self.bindings.remove_all();
        }
        self.layout.clear();
        self.ad_break = None;
        self.ad = None;
        self.all_ads_completed = true;
        self.snapback = 0.0;
        self.ad_is_loading = false;
        self.ad_played = false;
        self.monitor_midrolls = false;
        self.postroll = PostrollStage::Idle;
        self.completion_notified = false;

        let source = player.source_id();
        for (kind, handler) in subscriptions() {
            self.bindings.listen(source, kind.as_str(), handler);
        }

        self.breaks = player.ad_config().ingest();
        let positions: Vec<f64> = self.breaks.iter().map(ConfiguredAdBreak::position).collect();
        if !positions.is_empty() {
            self.discover(&positions);
        }
    }

    /// Deliver one notification from `player` to the bound handlers.
    pub fn handle_event(&mut self, player: &dyn PlaybackSource, event: &PlaybackEvent) {
        let handlers = self.bindings.listeners(&player.source_id(), event.kind().as_str());
        for handler in handlers {
            handler(self, player, event);
        }
    }

    // ── Public queries ──────────────────────────────────────────────────────

    pub fn all_ads_completed(&self) -> bool {
        self.all_ads_completed
    }

    pub fn is_ad_break(&self) -> bool {
        self.ad_break.is_some()
    }

    pub fn ad_breaks_layout(&self) -> &[f64] {
        &self.layout
    }

    pub fn ad_break(&self) -> Option<&AdBreak> {
        self.ad_break.as_ref()
    }

    pub fn ad(&self) -> Option<&Ad> {
        self.ad.as_ref()
    }

    pub fn configured_breaks(&self) -> &[ConfiguredAdBreak] {
        &self.breaks
    }

    pub fn snapback(&self) -> f64 {
        self.snapback
    }

    pub fn ad_is_loading(&self) -> bool {
        self.ad_is_loading
    }

    pub fn ad_played(&self) -> bool {
        self.ad_played
    }

    pub fn postroll_stage(&self) -> PostrollStage {
        self.postroll
    }

    /// Drain notifications emitted since the last call.
    pub fn take_notifications(&mut self) -> Vec<AdNotification> {
        std::mem::take(&mut self.outbox)
    }

    pub fn status(&self) -> AdSchedulerStatus {
        AdSchedulerStatus {
            is_ad_break: self.is_ad_break(),
            all_ads_completed: self.all_ads_completed,
            ad_is_loading: self.ad_is_loading,
            ad_played: self.ad_played,
            snapback: self.snapback,
            layout: self.layout.clone(),
            postroll: self.postroll,
            breaks: self.breaks.clone(),
        }
    }

    // ── Public commands ─────────────────────────────────────────────────────

    /// Skip the current ad on whichever controller is presenting one.
    pub fn skip_ad(&mut self) {
        match self.controllers.iter_mut().find(|c| c.controller.is_active()) {
            Some(c) => c.controller.skip_ad(),
            None => self.log.record(Level::DEBUG, "skip_ad: no active ads plugin"),
        }
    }

    /// Play `ads` as an on-demand break at the current playhead.
    pub fn play_ad_now(&mut self, player: &dyn PlaybackSource, ads: Vec<AdRef>) {
        if self.is_ad_break() {
            self.log.record(Level::WARN, "play_ad_now ignored: an ad break is already active");
            return;
        }
        let Some(primary) = find_role(&mut self.controllers, ControllerRole::Primary) else {
            self.log.record(Level::ERROR, "no ads plugin registered");
            return;
        };
        self.ad_is_loading = true;
        primary.controller.play_ad_now(&ads);
        self.log.record(
            Level::INFO,
            &format!("on-demand break of {} ad(s) at {:.1}s", ads.len(), player.current_time()),
        );
    }

    // ── Dispatch ────────────────────────────────────────────────────────────

    /// Hand configured break `index` to the primary controller. Without one
    /// the break stays unplayed and is not retried.
    fn dispatch(&mut self, index: usize) {
        let Some(primary) = find_role(&mut self.controllers, ControllerRole::Primary) else {
            self.log.record(Level::ERROR, "no ads plugin registered");
            return;
        };
        let brk = &mut self.breaks[index];
        brk.mark_played();
        self.ad_is_loading = true;
        primary.controller.play_ad_now(brk.ads());
        let message = format!(
            "dispatched {} at {}s ({} ad(s)) to {}",
            brk.kind(),
            brk.position(),
            brk.ads().len(),
            primary.controller.name()
        );
        self.log.record(Level::INFO, &message);
    }

    /// Merge newly reported positions into the layout and act on them.
    fn discover(&mut self, positions: &[f64]) {
        let positions: Vec<f64> = positions.iter().copied().filter(|p| p.is_finite()).collect();
        for &p in &positions {
            if !self.layout.contains(&p) {
                self.layout.push(p);
            }
        }
        self.layout.sort_by(f64::total_cmp);
        self.all_ads_completed = false;
        self.outbox.push(AdNotification::ManifestDiscovered(self.layout.clone()));

        if positions.contains(&PREROLL) {
            if let Some(index) = self
                .breaks
                .iter()
                .position(|b| b.kind() == BreakKind::Preroll && !b.is_played())
            {
                self.dispatch(index);
            }
        }
        if positions.iter().any(|&p| p > 0.0) {
            self.monitor_midrolls = true;
        }
    }

    // ── Postroll sequence ───────────────────────────────────────────────────

    fn flush_bumper(&mut self) {
        let flush = find_role(&mut self.controllers, ControllerRole::Bumper)
            .map(|c| c.controller.on_playback_ended());
        match flush {
            Some(Flush::Pending) => self.postroll = PostrollStage::AwaitingBumper,
            _ => self.flush_primary(),
        }
    }

    fn flush_primary(&mut self) {
        let flush = find_role(&mut self.controllers, ControllerRole::Primary)
            .map(|c| c.controller.on_playback_ended());
        match flush {
            Some(Flush::Pending) => self.postroll = PostrollStage::AwaitingPrimary,
            _ => self.dispatch_postroll(),
        }
    }

    /// Nothing can play after the postroll, so every other unplayed break
    /// is retired here, even when the postroll slot came from a controller
    /// manifest and has no configured pod.
    fn dispatch_postroll(&mut self) {
        self.postroll = PostrollStage::Idle;
        let postroll = self
            .breaks
            .iter()
            .position(|b| b.kind() == BreakKind::Postroll && !b.is_played());
        for b in self.breaks.iter_mut().filter(|b| b.kind() != BreakKind::Postroll) {
            b.mark_played();
        }
        if let Some(index) = postroll {
            self.dispatch(index);
        }
    }

    // ── Completion ──────────────────────────────────────────────────────────

    /// `AllAdsCompleted` goes out at most once per session.
    fn check_completion(&mut self, notify: bool) {
        self.all_ads_completed = self.controllers.iter().all(|c| c.controller.is_done())
            && self.breaks.iter().all(ConfiguredAdBreak::is_played);
        if self.all_ads_completed && notify && !self.completion_notified {
            self.completion_notified = true;
            self.log.record(Level::INFO, "all ads completed");
            self.outbox.push(AdNotification::AllAdsCompleted);
        }
    }

    // ── Handlers ────────────────────────────────────────────────────────────

    fn on_manifest_ready(&mut self, _player: &dyn PlaybackSource, event: &PlaybackEvent) {
        if let PlaybackEvent::ManifestReady(positions) = event {
            self.discover(positions);
        }
    }

    fn on_ad_break_started(&mut self, _player: &dyn PlaybackSource, event: &PlaybackEvent) {
        if let PlaybackEvent::AdBreakStarted(brk) = event {
            self.ad_break = Some(brk.clone());
        }
    }

    fn on_ad_loaded(&mut self, _player: &dyn PlaybackSource, event: &PlaybackEvent) {
        if let PlaybackEvent::AdLoaded(ad) = event {
            self.ad_is_loading = false;
            self.ad = Some(ad.clone());
        }
    }

    fn on_ad_started(&mut self, _player: &dyn PlaybackSource, event: &PlaybackEvent) {
        if let PlaybackEvent::AdStarted(ad) = event {
            self.ad_is_loading = false;
            self.ad = Some(ad.clone());
            self.ad_played = true;
        }
    }

    fn on_ad_break_ended(&mut self, _player: &dyn PlaybackSource, _event: &PlaybackEvent) {
        self.ad_break = None;
        self.ad = None;
    }

    fn on_ads_completed(&mut self, _player: &dyn PlaybackSource, _event: &PlaybackEvent) {
        self.check_completion(true);
    }

    /// Only critical errors count toward completion, and they only notify
    /// if an ad actually started this session. A critical error ends the
    /// failed break, so nothing is loading or airing afterwards.
    fn on_ad_error(&mut self, _player: &dyn PlaybackSource, event: &PlaybackEvent) {
        if let PlaybackEvent::AdError { severity, message } = event {
            self.log.record(Level::WARN, &format!("ad error ({severity:?}): {message}"));
            if *severity == ErrorSeverity::Critical {
                self.ad_is_loading = false;
                self.ad_break = None;
                self.ad = None;
                self.check_completion(self.ad_played);
            }
        }
    }

    /// Postroll entry point. While an ad is loading the ended signal is
    /// dropped; postroll is only evaluated again on a later ended signal.
    fn on_ended(&mut self, _player: &dyn PlaybackSource, _event: &PlaybackEvent) {
        if self.ad_is_loading {
            self.log.record(Level::DEBUG, "media ended while an ad is loading; postroll not evaluated");
            return;
        }
        if !self.layout.contains(&POSTROLL) {
            self.all_ads_completed = true;
            return;
        }
        if self.postroll != PostrollStage::Idle {
            self.log.record(Level::DEBUG, "postroll sequence already pending");
            return;
        }
        self.flush_bumper();
    }

    /// Fire the latest due midroll; earlier ones crossed by the same jump
    /// are skipped.
    fn on_time_update(&mut self, player: &dyn PlaybackSource, _event: &PlaybackEvent) {
        if !self.monitor_midrolls || player.is_paused() {
            return;
        }
        let now = player.current_time();
        let snapback = self.snapback;
        let due = self
            .breaks
            .iter()
            .rposition(|b| !b.is_played() && b.position() <= now && b.position() > snapback);
        if let Some(index) = due {
            self.snapback = self.breaks[index].position();
            self.dispatch(index);
        }
    }

    /// Re-arm midrolls after seeking back across a played break that has an
    /// unplayed break right before it.
    fn on_seeked(&mut self, player: &dyn PlaybackSource, _event: &PlaybackEvent) {
        let now = player.current_time();
        let Some(next_played) = self
            .breaks
            .iter()
            .position(|b| b.is_played() && b.position() > now)
        else {
            return;
        };
        if next_played > 0 && !self.breaks[next_played - 1].is_played() {
            self.snapback = 0.0;
        }
    }

    fn on_source_reset(&mut self, player: &dyn PlaybackSource, _event: &PlaybackEvent) {
        self.reset(player);
    }

    fn on_playback_flushed(&mut self, _player: &dyn PlaybackSource, event: &PlaybackEvent) {
        let PlaybackEvent::PlaybackFlushed(role) = event else {
            return;
        };
        match (self.postroll, *role) {
            (PostrollStage::AwaitingBumper, ControllerRole::Bumper) => self.flush_primary(),
            (PostrollStage::AwaitingPrimary, ControllerRole::Primary) => self.dispatch_postroll(),
            (stage, role) => self.log.record(
                Level::DEBUG,
                &format!("ignoring {role} flush while postroll is {stage:?}"),
            ),
        }
    }
}

impl Default for AdScheduler {
    fn default() -> Self {
        Self::new(TracingLog)
    }
}
