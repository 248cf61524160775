//! Session scoring: alignment, direction and coverage ratios combined into a
//! weighted total accuracy that gates submission.
//!
//! All functions are pure over `(points, template, params)` and are always
//! evaluated over the whole accumulated point set.

use crate::direction::check_direction;
use crate::mapper::{GridSpec, Point};
use crate::proximity::{is_near_on_grid, DEFAULT_TOLERANCE};
use crate::template::Template;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const ALIGNMENT_WEIGHT: f64 = 0.4;
pub const DIRECTION_WEIGHT: f64 = 0.3;
pub const COVERAGE_WEIGHT: f64 = 0.3;

/// Minimum total accuracy for a session to be submitted
pub const SUBMIT_THRESHOLD: f64 = 0.6;

// A few ulps at 0.6: absorbs rounding in the weighted sum and nothing more
const GATE_EPSILON: f64 = 4.0 * f64::EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub alignment_score: f64,
    pub direction_score: f64,
    pub coverage_score: f64,
    pub total_accuracy: f64,
    /// Seconds since the session's first stroke started
    pub total_time: f64,
    pub stroke_count: usize,
}

impl Metrics {
    pub fn can_submit(&self, threshold: f64) -> bool {
        can_submit(self.total_accuracy, threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub tolerance: i32,
    pub grid: GridSpec,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            grid: GridSpec::default(),
        }
    }
}

fn ratio(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Fraction of points lying within tolerance of the template.
pub fn alignment_score(points: &[Point], template: &Template, params: &ScoringParams) -> f64 {
    let on_path = points
        .iter()
        .filter(|p| is_near_on_grid(p.cell(), template, params.tolerance, &params.grid))
        .count();
    ratio(on_path, points.len())
}

/// Fraction of consecutive point pairs moving in the template's local direction.
/// Zero when there are fewer than two points.
///
/// Pairs whose origin is off the grid have nothing to match against and count as valid.
pub fn direction_score(points: &[Point], template: &Template, params: &ScoringParams) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let correct = points
        .iter()
        .tuple_windows()
        .filter(|(from, to)| {
            !params.grid.contains(from.cell())
                || check_direction(from.cell(), to.cell(), template, params.tolerance)
        })
        .count();
    ratio(correct, points.len() - 1)
}

/// Fraction of distinct template cells with at least one on-grid point within tolerance.
pub fn coverage_score(points: &[Point], template: &Template, params: &ScoringParams) -> f64 {
    let template_cells = template.distinct_cells();
    let covered = template_cells
        .iter()
        .filter(|t| {
            points.iter().any(|p| {
                let cell = p.cell();
                params.grid.contains(cell) && cell.chebyshev(**t) <= params.tolerance
            })
        })
        .count();
    ratio(covered, template_cells.len())
}

/// Weighted combination of the three component ratios, clamped to `[0, 1]`.
pub fn total_accuracy(alignment: f64, direction: f64, coverage: f64) -> f64 {
    (alignment * ALIGNMENT_WEIGHT + direction * DIRECTION_WEIGHT + coverage * COVERAGE_WEIGHT)
        .clamp(0.0, 1.0)
}

pub fn can_submit(total_accuracy: f64, threshold: f64) -> bool {
    total_accuracy + GATE_EPSILON >= threshold
}

/// "Try again" only needs something to discard.
pub fn can_try_again(stroke_count: usize) -> bool {
    stroke_count > 0
}

/// Score the full accumulated point set.
///
/// With no template every component is vacuously satisfied (free drawing is
/// never blocked), so any non-empty session scores 1.0. An empty session
/// always scores zero.
pub fn score(
    points: &[Point],
    template: Option<&Template>,
    params: &ScoringParams,
    total_time: f64,
    stroke_count: usize,
) -> Metrics {
    let (alignment, direction, coverage) = match (points.is_empty(), template) {
        (true, _) => (0.0, 0.0, 0.0),
        (false, None) => (1.0, 1.0, 1.0),
        (false, Some(t)) => (
            alignment_score(points, t, params),
            direction_score(points, t, params),
            coverage_score(points, t, params),
        ),
    };

    Metrics {
        alignment_score: alignment,
        direction_score: direction,
        coverage_score: coverage,
        total_accuracy: total_accuracy(alignment, direction, coverage),
        total_time: total_time.max(0.0),
        stroke_count,
    }
}
