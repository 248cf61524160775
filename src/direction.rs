//! Local direction checks against the template's pen trajectory.
//!
//! The anchor is the *first* template point (scanning paths, then points, in
//! template order) that lies within tolerance of the movement's origin and has
//! a successor in its path. The nearest anchor is deliberately not searched
//! for, so self-intersecting or looping templates can yield verdicts that
//! depend on path order.

use crate::mapper::GridCell;
use crate::template::Template;

/// How far each axis of the observed movement may differ from the template's
pub const AXIS_SLACK: i32 = 1;

/// Expected local movement `(dx, dy)` at `from`, if any template anchor is near it.
pub fn expected_delta(from: GridCell, template: &Template, tolerance: i32) -> Option<(i32, i32)> {
    template
        .segments()
        .find(|(anchor, _)| anchor.chebyshev(from) <= tolerance)
        .map(|(anchor, next)| anchor.delta_to(next))
}

/// Whether moving from `from` to `to` follows the template's local direction.
///
/// Vacuously true when no anchor is near `from`: no guidance, no penalty.
pub fn check_direction(from: GridCell, to: GridCell, template: &Template, tolerance: i32) -> bool {
    match expected_delta(from, template, tolerance) {
        Some((ex, ey)) => {
            let (dx, dy) = from.delta_to(to);
            dx.saturating_sub(ex).saturating_abs() <= AXIS_SLACK
                && dy.saturating_sub(ey).saturating_abs() <= AXIS_SLACK
        }
        None => true,
    }
}
