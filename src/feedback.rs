//! Transient user-facing signal derived from per-point match results.
//!
//! Latest message wins: every new classification or notice replaces the one
//! on display and restarts its expiry. Nothing is queued.

use serde::Serialize;

/// How long a message stays up, in ms
pub const DEFAULT_EXPIRY_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

/// Per-point classification of the latest movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PointVerdict {
    Matched,
    Misaligned,
    WrongDirection,
}

impl PointVerdict {
    /// Off-template beats wrong direction; only a point that passes both matches.
    pub fn classify(near_template: bool, direction_ok: bool) -> Self {
        match (near_template, direction_ok) {
            (false, _) => PointVerdict::Misaligned,
            (true, false) => PointVerdict::WrongDirection,
            (true, true) => PointVerdict::Matched,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PointVerdict::Matched => "Good! Keep following the guide.",
            PointVerdict::Misaligned => "Stay closer to the guide.",
            PointVerdict::WrongDirection => "Trace the line in the shown direction.",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PointVerdict::Matched => Severity::Success,
            PointVerdict::Misaligned | PointVerdict::WrongDirection => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Point(PointVerdict),
    Notice { text: String, severity: Severity },
}

impl Signal {
    pub fn text(&self) -> &str {
        match self {
            Signal::Point(v) => v.message(),
            Signal::Notice { text, .. } => text,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Signal::Point(v) => v.severity(),
            Signal::Notice { severity, .. } => *severity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FeedbackState {
    #[default]
    Idle,
    Drawing,
    Showing { signal: Signal, expires_at: u64 },
}

#[derive(Debug, Clone)]
pub struct FeedbackMachine {
    state: FeedbackState,
    expiry_ms: u64,
}

impl Default for FeedbackMachine {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY_MS)
    }
}

impl FeedbackMachine {
    pub fn new(expiry_ms: u64) -> Self {
        Self {
            state: FeedbackState::Idle,
            expiry_ms,
        }
    }

    pub fn state(&self) -> &FeedbackState {
        &self.state
    }

    /// A new stroke clears whatever was on display.
    pub fn stroke_started(&mut self) {
        self.state = FeedbackState::Drawing;
    }

    /// A shown message outlives the stroke until it expires.
    pub fn stroke_ended(&mut self) {
        if self.state == FeedbackState::Drawing {
            self.state = FeedbackState::Idle;
        }
    }

    pub fn show_verdict(&mut self, verdict: PointVerdict, now: u64) {
        self.show(Signal::Point(verdict), now);
    }

    pub fn notify(&mut self, text: impl Into<String>, severity: Severity, now: u64) {
        self.show(
            Signal::Notice {
                text: text.into(),
                severity,
            },
            now,
        );
    }

    fn show(&mut self, signal: Signal, now: u64) {
        self.state = FeedbackState::Showing {
            signal,
            expires_at: now.saturating_add(self.expiry_ms),
        };
    }

    /// Clear an expired message. Returns true if the display changed.
    pub fn tick(&mut self, now: u64) -> bool {
        match self.state {
            FeedbackState::Showing { expires_at, .. } if now >= expires_at => {
                self.state = FeedbackState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&Signal> {
        match &self.state {
            FeedbackState::Showing { signal, .. } => Some(signal),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = FeedbackState::Idle;
    }
}
