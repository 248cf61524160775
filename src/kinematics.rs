use crate::mapper::Point;

/// Elapsed-time floor, in ms, used to avoid dividing by zero
pub const MIN_ELAPSED_MS: u64 = 1;

/// Per-point kinematic values, in px/ms and px/ms²
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    pub velocity: f64,
    pub acceleration: f64,
}

/// Elapsed time between two timestamps, floored at [`MIN_ELAPSED_MS`].
/// Out-of-order timestamps also collapse to the floor.
pub fn elapsed_ms(from: u64, to: u64) -> u64 {
    to.saturating_sub(from).max(MIN_ELAPSED_MS)
}

/// Euclidean distance over elapsed time
pub fn velocity(from: &Point, to: &Point) -> f64 {
    from.distance_to(to) / elapsed_ms(from.time, to.time) as f64
}

/// Velocity change over elapsed time
pub fn acceleration(prev_velocity: f64, velocity: f64, elapsed: u64) -> f64 {
    (velocity - prev_velocity) / elapsed.max(MIN_ELAPSED_MS) as f64
}

/// Kinematics for every point of one stroke. The first point has no
/// predecessor, so both of its values are zero. Acceleration needs two measured
/// velocities and is zero at the second point as well.
pub fn annotate(points: &[Point]) -> Vec<Kinematics> {
    let mut out = Vec::with_capacity(points.len());
    let mut prev_velocity: Option<f64> = None;

    for (idx, point) in points.iter().enumerate() {
        if idx == 0 {
            out.push(Kinematics::default());
            continue;
        }

        let prev = &points[idx - 1];
        let v = velocity(prev, point);
        let a = prev_velocity
            .map_or(0.0, |pv| acceleration(pv, v, elapsed_ms(prev.time, point.time)));
        out.push(Kinematics {
            velocity: v,
            acceleration: a,
        });
        prev_velocity = Some(v);
    }

    out
}
