use crate::playback::ControllerRole;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Event types ──────────────────────────────────────────────────────────────

/// Event-type key used by the binding registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ManifestReady,
    AdBreakStarted,
    AdLoaded,
    AdStarted,
    AdBreakEnded,
    AdsCompleted,
    AdError,
    Ended,
    TimeUpdate,
    Seeked,
    SourceReset,
    PlaybackFlushed,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ManifestReady => "manifestready",
            EventKind::AdBreakStarted => "adbreakstarted",
            EventKind::AdLoaded => "adloaded",
            EventKind::AdStarted => "adstarted",
            EventKind::AdBreakEnded => "adbreakended",
            EventKind::AdsCompleted => "adscompleted",
            EventKind::AdError => "aderror",
            EventKind::Ended => "ended",
            EventKind::TimeUpdate => "timeupdate",
            EventKind::Seeked => "seeked",
            EventKind::SourceReset => "sourcereset",
            EventKind::PlaybackFlushed => "playbackflushed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Warning,
    Critical,
}

// ── Runtime break/ad ─────────────────────────────────────────────────────────

/// The break currently airing, as announced by a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdBreak {
    pub position: f64,
    pub ad_count: usize,
}

/// The ad currently airing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    /// Index within the pod.
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

// ── Inbound / outbound ───────────────────────────────────────────────────────

/// Notifications emitted by the playback source.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A controller reports the break positions it can serve.
    ManifestReady(Vec<f64>),
    AdBreakStarted(AdBreak),
    AdLoaded(Ad),
    AdStarted(Ad),
    AdBreakEnded,
    AdsCompleted,
    AdError {
        severity: ErrorSeverity,
        message: String,
    },
    Ended,
    TimeUpdate,
    Seeked,
    /// A new media source was loaded.
    SourceReset,
    /// A controller finished flushing in-flight playback.
    PlaybackFlushed(ControllerRole),
}

impl PlaybackEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlaybackEvent::ManifestReady(_) => EventKind::ManifestReady,
            PlaybackEvent::AdBreakStarted(_) => EventKind::AdBreakStarted,
            PlaybackEvent::AdLoaded(_) => EventKind::AdLoaded,
            PlaybackEvent::AdStarted(_) => EventKind::AdStarted,
            PlaybackEvent::AdBreakEnded => EventKind::AdBreakEnded,
            PlaybackEvent::AdsCompleted => EventKind::AdsCompleted,
            PlaybackEvent::AdError { .. } => EventKind::AdError,
            PlaybackEvent::Ended => EventKind::Ended,
            PlaybackEvent::TimeUpdate => EventKind::TimeUpdate,
            PlaybackEvent::Seeked => EventKind::Seeked,
            PlaybackEvent::SourceReset => EventKind::SourceReset,
            PlaybackEvent::PlaybackFlushed(_) => EventKind::PlaybackFlushed,
        }
    }
}

/// Notifications emitted by the scheduler for the hosting player.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "positions", rename_all = "snake_case")]
pub enum AdNotification {
    /// Every break position discovered so far, sorted ascending.
    ManifestDiscovered(Vec<f64>),
    AllAdsCompleted,
}
