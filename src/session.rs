//! The drawing session: owns the live stroke, the finalized strokes and their
//! rows, and drives scoring, feedback and submission.

use crate::adaptation::{adapt, estimate_effort, Adaptation, Mood, StrokeFeatures};
use crate::config::Config;
use crate::direction::check_direction;
use crate::feedback::{FeedbackMachine, PointVerdict, Severity, Signal};
use crate::local_store::{write_export_file, LocalSessionCache, StoredSession};
use crate::mapper::{map_client_point, GridSpec, LayoutSnapshot, Point};
use crate::persistence::SessionSink;
use crate::proximity::is_near_on_grid;
use crate::record::{RecordBuilder, ScoreSummary, SessionKey};
use crate::runtime::{PointerInput, PointerKind};
use crate::scoring::{self, Metrics, ScoringParams};
use crate::template::{Template, TemplateState};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SAVED_MESSAGE: &str = "Great job! Session saved successfully.";
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save session. Please try again.";
pub const KEEP_TRACING_MESSAGE: &str = "Keep tracing! A little more accuracy is needed to submit.";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub user_id: String,
    pub letter: String,
    pub grid: GridSpec,
    pub tolerance: i32,
    pub submit_threshold: f64,
    pub feedback_expiry_ms: u64,
}

impl SessionConfig {
    pub fn from_config(cfg: &Config, letter: &str) -> Self {
        Self {
            user_id: cfg.user_id.clone(),
            letter: letter.to_string(),
            grid: cfg.grid(),
            tolerance: cfg.tolerance,
            submit_threshold: cfg.submit_threshold,
            feedback_expiry_ms: cfg.feedback_expiry_ms,
        }
    }

    pub fn scoring_params(&self) -> ScoringParams {
        ScoringParams {
            tolerance: self.tolerance,
            grid: self.grid,
        }
    }
}

/// One contiguous pointer-down-to-up gesture. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    points: Vec<Point>,
}

impl Stroke {
    fn start(first: Point) -> Self {
        Self {
            points: vec![first],
        }
    }

    fn push(&mut self, p: Point) {
        self.points.push(p);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> &Point {
        // a stroke is created with its first point and only grows
        &self.points[self.points.len() - 1]
    }
}

/// What an accepted submission produced
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReceipt {
    pub session_id: String,
    pub letter: String,
    pub metrics: Metrics,
    pub csv: String,
    pub export_path: Option<PathBuf>,
    pub locator: String,
    pub evicted: usize,
}

pub struct TracingSession {
    config: SessionConfig,
    template: TemplateState,
    live: Option<Stroke>,
    strokes: Vec<Stroke>,
    points: Vec<Point>,
    record: Option<RecordBuilder>,
    started_at: Option<u64>,
    metrics: Metrics,
    feedback: FeedbackMachine,
}

impl TracingSession {
    pub fn new(config: SessionConfig, template: TemplateState) -> Self {
        let feedback = FeedbackMachine::new(config.feedback_expiry_ms);
        Self {
            config,
            template,
            live: None,
            strokes: Vec::new(),
            points: Vec::new(),
            record: None,
            started_at: None,
            metrics: Metrics::default(),
            feedback,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn letter(&self) -> &str {
        &self.config.letter
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.template()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn live_stroke(&self) -> Option<&Stroke> {
        self.live.as_ref()
    }

    pub fn is_drawing(&self) -> bool {
        self.live.is_some()
    }

    /// Points of all finalized strokes, in order
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn record(&self) -> Option<&RecordBuilder> {
        self.record.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.key().session_id.as_str())
    }

    pub fn feedback(&self) -> &FeedbackMachine {
        &self.feedback
    }

    pub fn current_signal(&self) -> Option<&Signal> {
        self.feedback.current()
    }

    /// Map a display-space input through `layout` and apply it.
    pub fn handle(&mut self, input: &PointerInput, layout: &LayoutSnapshot) {
        let point = map_client_point(input.x, input.y, input.time, layout, &self.config.grid);
        match input.kind {
            PointerKind::Down => self.pointer_down(point),
            PointerKind::Move => {
                self.pointer_move(point);
            }
            PointerKind::Up => {
                self.pointer_up(input.time);
            }
            PointerKind::Leave => {
                self.pointer_leave(input.time);
            }
        }
    }

    /// Begin a stroke. A stroke still open is finalized first.
    pub fn pointer_down(&mut self, point: Point) {
        if self.live.is_some() {
            self.finish_stroke(point.time);
        }

        if self.record.is_none() {
            let key = SessionKey::generate(&self.config.user_id, &self.config.letter);
            debug!(session_id = %key.session_id, letter = %key.letter, "session started");
            self.record = Some(RecordBuilder::new(key));
        }
        self.started_at.get_or_insert(point.time);

        self.live = Some(Stroke::start(point));
        self.feedback.stroke_started();
    }

    /// Extend the live stroke and classify the new point. Hover moves are
    /// ignored, as is classification of points off the grid or with no template.
    pub fn pointer_move(&mut self, point: Point) -> Option<PointVerdict> {
        let live = self.live.as_mut()?;
        let prev = *live.last();
        live.push(point);

        let template = self.template.template()?;
        let grid = &self.config.grid;
        if !grid.contains(point.cell()) {
            return None;
        }

        let tol = self.config.tolerance;
        let near = is_near_on_grid(point.cell(), template, tol, grid);
        let dir_ok =
            !grid.contains(prev.cell()) || check_direction(prev.cell(), point.cell(), template, tol);

        let verdict = PointVerdict::classify(near, dir_ok);
        self.feedback.show_verdict(verdict, point.time);
        Some(verdict)
    }

    pub fn pointer_up(&mut self, now: u64) -> Option<Metrics> {
        self.finish_stroke(now)
    }

    /// Leaving the surface ends the stroke exactly like lifting the pointer.
    pub fn pointer_leave(&mut self, now: u64) -> Option<Metrics> {
        self.finish_stroke(now)
    }

    fn finish_stroke(&mut self, now: u64) -> Option<Metrics> {
        let stroke = self.live.take()?;
        self.feedback.stroke_ended();

        if let Some(record) = self.record.as_mut() {
            record.push_stroke(stroke.points());
        }
        self.points.extend_from_slice(stroke.points());
        self.strokes.push(stroke);

        self.metrics = self.rescore(now);
        info!(
            letter = %self.config.letter,
            strokes = self.strokes.len(),
            points = self.points.len(),
            accuracy = self.metrics.total_accuracy,
            "stroke completed"
        );
        Some(self.metrics)
    }

    fn rescore(&self, now: u64) -> Metrics {
        let total_time = self
            .started_at
            .map(|start| now.saturating_sub(start) as f64 / 1000.0)
            .unwrap_or(0.0);
        scoring::score(
            &self.points,
            self.template.template(),
            &self.config.scoring_params(),
            total_time,
            self.strokes.len(),
        )
    }

    /// Advance the feedback expiry clock. Returns true if the display changed.
    pub fn tick(&mut self, now: u64) -> bool {
        self.feedback.tick(now)
    }

    /// Back to the initial state. Safe mid-stroke: the open stroke is dropped
    /// along with everything else.
    pub fn reset(&mut self) {
        if self.live.is_some() {
            debug!("reset with a stroke in progress");
        }
        let template = std::mem::take(&mut self.template);
        let config = self.config.clone();
        *self = Self::new(config, template);
    }

    pub fn can_submit(&self) -> bool {
        !self.strokes.is_empty() && self.metrics.can_submit(self.config.submit_threshold)
    }

    pub fn can_try_again(&self) -> bool {
        scoring::can_try_again(self.strokes.len())
    }

    pub fn stroke_features(&self) -> Vec<StrokeFeatures> {
        self.strokes
            .iter()
            .map(|s| StrokeFeatures::from_points(s.points()))
            .collect()
    }

    /// Practice suggestion from the finalized strokes. Does not touch Metrics.
    pub fn adaptation(&self, mood: Mood) -> Adaptation {
        adapt(
            estimate_effort(&self.stroke_features()),
            self.metrics.total_accuracy,
            mood,
        )
    }

    /// Submit the session.
    ///
    /// The local cache entry and export file are written first. Remote
    /// persistence follows; if it fails the session stays intact for a retry.
    /// On success the session resets and a confirmation is shown.
    pub fn submit(
        &mut self,
        cache: &mut LocalSessionCache,
        export_dir: Option<&Path>,
        sink: &dyn SessionSink,
        now: u64,
    ) -> Result<SubmitReceipt> {
        let Some(record) = self.record.as_ref().filter(|_| !self.strokes.is_empty()) else {
            return Err(Error::NoStrokes);
        };

        if !self.metrics.can_submit(self.config.submit_threshold) {
            self.feedback
                .notify(KEEP_TRACING_MESSAGE, Severity::Warning, now);
            return Err(Error::SubmissionBelowThreshold {
                accuracy: self.metrics.total_accuracy,
                threshold: self.config.submit_threshold,
            });
        }

        let key = record.key().clone();
        let csv = record.to_csv()?;
        let metrics = self.metrics;

        let evicted = match cache.push(StoredSession::new(
            &key.session_id,
            &key.letter,
            &csv,
            chrono::Local::now(),
        )) {
            Ok(evicted) => evicted.len(),
            Err(e) => {
                warn!(session_id = %key.session_id, error = %e, "local cache write failed");
                0
            }
        };

        let export_path = export_dir.and_then(|dir| {
            write_export_file(dir, &key.letter, &key.session_id, &csv)
                .map_err(|e| warn!(session_id = %key.session_id, error = %e, "export file write failed"))
                .ok()
        });

        let remote = sink
            .upload_session_csv(&key.user_id, &key.letter, &key.session_id, &csv)
            .and_then(|locator| {
                sink.write_score_summary(&ScoreSummary::new(&key, &metrics, locator.clone()))?;
                Ok(locator)
            });

        let locator = match remote {
            Ok(locator) => locator,
            Err(e) => {
                warn!(session_id = %key.session_id, error = %e, "session persistence failed");
                self.feedback
                    .notify(SAVE_FAILED_MESSAGE, Severity::Error, now);
                return Err(match e {
                    Error::Persistence(msg) => Error::Persistence(msg),
                    other => Error::Persistence(other.to_string()),
                });
            }
        };

        info!(
            session_id = %key.session_id,
            letter = %key.letter,
            accuracy = metrics.total_accuracy,
            locator = %locator,
            "session submitted"
        );

        self.reset();
        self.feedback.notify(SAVED_MESSAGE, Severity::Success, now);

        Ok(SubmitReceipt {
            session_id: key.session_id,
            letter: key.letter,
            metrics,
            csv,
            export_path,
            locator,
            evicted,
        })
    }
}
