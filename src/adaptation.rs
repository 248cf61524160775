//! Stroke-effort heuristics and the practice adaptation derived from them.
//!
//! Informational only: nothing here feeds the scoring engine or the
//! submission gate.

use crate::kinematics::{elapsed_ms, velocity};
use crate::mapper::Point;
use itertools::Itertools;
use serde::Serialize;

const BASE_FRUSTRATION: f64 = 0.2;
const BASE_CONFIDENCE: f64 = 0.6;
const FRUSTRATION_PER_MS: f64 = 1.0 / 2000.0;
const CONFIDENT_VELOCITY: f64 = 0.3;
const FRUSTRATION_LIMIT: f64 = 0.6;
const PROGRESS_ACCURACY: f64 = 0.7;

/// Summary features of one stroke
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrokeFeatures {
    pub point_count: usize,
    /// First-to-last point, floored at 1 ms
    pub duration_ms: u64,
    pub avg_velocity: f64,
    pub peak_velocity: f64,
}

impl StrokeFeatures {
    pub fn from_points(points: &[Point]) -> Self {
        let duration_ms = match (points.first(), points.last()) {
            (Some(first), Some(last)) => elapsed_ms(first.time, last.time),
            _ => elapsed_ms(0, 0),
        };

        let velocities: Vec<f64> = points
            .iter()
            .tuple_windows()
            .map(|(a, b)| velocity(a, b))
            .collect();

        let avg_velocity = if velocities.is_empty() {
            0.0
        } else {
            velocities.iter().sum::<f64>() / velocities.len() as f64
        };
        let peak_velocity = velocities.iter().copied().fold(0.0, f64::max);

        Self {
            point_count: points.len(),
            duration_ms,
            avg_velocity,
            peak_velocity,
        }
    }
}

/// Estimated frustration and confidence, both in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffortEstimate {
    pub frustration: f64,
    pub confidence: f64,
}

impl Default for EffortEstimate {
    fn default() -> Self {
        Self {
            frustration: BASE_FRUSTRATION,
            confidence: BASE_CONFIDENCE,
        }
    }
}

/// Long strokes add frustration; quick, fluent strokes add confidence.
pub fn estimate_effort(strokes: &[StrokeFeatures]) -> EffortEstimate {
    let raw = strokes
        .iter()
        .fold(EffortEstimate::default(), |acc, s| EffortEstimate {
            frustration: acc.frustration + s.duration_ms as f64 * FRUSTRATION_PER_MS,
            confidence: acc.confidence
                + if s.avg_velocity > CONFIDENT_VELOCITY {
                    0.1
                } else {
                    -0.05
                },
        });

    EffortEstimate {
        frustration: raw.frustration.min(1.0),
        confidence: raw.confidence.clamp(0.0, 1.0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mood {
    Joyful,
    #[default]
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PracticeMode {
    Colouring,
    Story,
    Drawing,
}

/// What to practice next
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Adaptation {
    pub effort: EffortEstimate,
    pub difficulty_delta: i8,
    pub next_mode: PracticeMode,
}

impl Adaptation {
    pub fn prompt(&self) -> &'static str {
        if self.difficulty_delta < 0 {
            "Let's take a gentle break with soft colours and a few slow breaths."
        } else {
            "Awesome progress! Try a slightly tighter curve challenge."
        }
    }
}

pub fn adapt(effort: EffortEstimate, total_accuracy: f64, mood: Mood) -> Adaptation {
    let frustrated = effort.frustration > FRUSTRATION_LIMIT;

    let difficulty_delta = if frustrated {
        -1
    } else if total_accuracy > PROGRESS_ACCURACY {
        1
    } else {
        0
    };

    let next_mode = match (frustrated, mood) {
        (true, _) => PracticeMode::Colouring,
        (false, Mood::Joyful) => PracticeMode::Story,
        (false, Mood::Neutral) => PracticeMode::Drawing,
    };

    Adaptation {
        effort,
        difficulty_delta,
        next_mode,
    }
}
