use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Leave,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    #[default]
    Mouse,
    Touch,
}

/// One pointer sample in display space
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerInput {
    pub kind: PointerKind,
    #[serde(default)]
    pub source: InputSource,
    pub x: f64,
    pub y: f64,
    /// Milliseconds on the source's monotonic clock
    pub time: u64,
}

impl PointerInput {
    pub fn new(kind: PointerKind, x: f64, y: f64, time: u64) -> Self {
        Self {
            kind,
            source: InputSource::Mouse,
            x,
            y,
            time,
        }
    }

    pub fn touch(kind: PointerKind, x: f64, y: f64, time: u64) -> Self {
        Self {
            source: InputSource::Touch,
            ..Self::new(kind, x, y, time)
        }
    }

    /// Touch input must not scroll the surface underneath
    pub fn prevent_default(&self) -> bool {
        self.source == InputSource::Touch
    }
}

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum TraceEvent {
    Pointer(PointerInput),
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of input events (pointer, keyboard, resize)
pub trait TraceEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<TraceEvent, RecvTimeoutError>;
}

/// Translate a terminal mouse event; only the left button draws.
/// Positions are cell centers so a click lands mid-cell.
pub fn pointer_from_mouse(ev: &MouseEvent, time: u64) -> Option<PointerInput> {
    let kind = match ev.kind {
        MouseEventKind::Down(MouseButton::Left) => PointerKind::Down,
        MouseEventKind::Drag(MouseButton::Left) => PointerKind::Move,
        MouseEventKind::Up(MouseButton::Left) => PointerKind::Up,
        _ => return None,
    };
    Some(PointerInput::new(
        kind,
        ev.column as f64 + 0.5,
        ev.row as f64 + 0.5,
        time,
    ))
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<TraceEvent>,
    epoch: Instant,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let epoch = Instant::now();

        std::thread::spawn(move || loop {
            let ev = match event::read() {
                Ok(CtEvent::Key(key)) => TraceEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => TraceEvent::Resize,
                Ok(CtEvent::Mouse(m)) => {
                    let now = epoch.elapsed().as_millis() as u64;
                    match pointer_from_mouse(&m, now) {
                        Some(p) => TraceEvent::Pointer(p),
                        None => continue,
                    }
                }
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(ev).is_err() {
                break;
            }
        });

        Self { rx, epoch }
    }

    /// Milliseconds on the same clock as emitted pointer times
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TraceEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed event source for tests
pub struct TestEventSource {
    rx: Receiver<TraceEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<TraceEvent>) -> Self {
        Self { rx }
    }
}

impl TraceEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TraceEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: TraceEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: TraceEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    pub fn source(&self) -> &E {
        &self.event_source
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> TraceEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                TraceEvent::Tick
            }
        }
    }
}
