//! Continuous collision time prediction
//!
//! Over a candidate window every moving ball is treated as travelling in a
//! straight line at its mean velocity for that window (friction and phase
//! changes included). Contact times then come from a quadratic in t, so fast
//! balls cannot tunnel through each other or through a cushion.

use glam::{DVec2, DVec3};

use super::ball::{Ball, MotionState};
use super::motion::evolve;
use super::state::SimulationState;
use super::table::{Aabb, Cushion, Pocket, Table};
use crate::consts::*;
use crate::params::Params;
use crate::planar;

/// Mean planar velocity of a ball over the next `window` seconds
pub fn mean_velocity(ball: &Ball, window: f64, params: &Params, table: &Table) -> DVec3 {
    match ball.state {
        MotionState::Stationary
        | MotionState::Spinning
        | MotionState::Pocketed
        | MotionState::OutOfPlay => DVec3::ZERO,
        MotionState::Sliding | MotionState::Rolling | MotionState::Airborne => {
            if window <= 0.0 {
                return planar(ball.vel);
            }
            let mut ahead = ball.clone();
            evolve(&mut ahead, window, params, table);
            planar(ahead.pos - ball.pos) / window
        }
    }
}

/// Earliest t ≥ 0 with |dp + dv t| = reach, for a closing pair
///
/// `dp` is the relative position, `dv` the relative velocity. Returns 0 when
/// already within reach and closing, `None` when diverging or passing wide.
pub fn quadratic_contact(dp: DVec3, dv: DVec3, reach: f64) -> Option<f64> {
    let half_b = dp.dot(dv);
    if half_b >= 0.0 {
        return None;
    }
    let a = dv.length_squared();
    assert!(a > 0.0, "closing pair with zero relative velocity");
    let c = dp.length_squared() - reach * reach;
    if c <= 0.0 {
        return Some(0.0);
    }
    let disc = half_b * half_b - a * c;
    if disc < 0.0 {
        return None;
    }
    // Smaller root, written to stay accurate when a is tiny
    Some(c / (-half_b + disc.sqrt()))
}

/// Time until two balls touch, planar motion only
pub fn ball_ball_time(p1: DVec3, v1: DVec3, p2: DVec3, v2: DVec3, reach: f64) -> Option<f64> {
    let dv = planar(v2 - v1);
    if dv.length_squared() < QUADRATIC_EPSILON {
        return None;
    }
    quadratic_contact(planar(p2 - p1), dv, reach)
}

/// Time until a ball touches a cushion, with the contact normal
///
/// Segments are tested against the line offset by the ball radius (impact
/// point must project inside the segment), vertices as circles of that
/// radius. A bounding-box check against the swept ball skips far cushions.
pub fn ball_cushion_time(
    p: DVec3,
    v: DVec3,
    radius: f64,
    cushion: &Cushion,
    window: f64,
) -> Option<(f64, DVec2)> {
    let p2 = p.truncate();
    let v2 = v.truncate();
    if v2.length_squared() < QUADRATIC_EPSILON {
        return None;
    }
    let swept = Aabb::swept(p2, p2 + v2 * window, radius + CONTACT_SLOP);
    if !cushion.bounds.overlaps(&swept) {
        return None;
    }

    let mut best: Option<(f64, DVec2)> = None;
    let mut consider = |t: f64, normal: DVec2| {
        if t <= window && best.is_none_or(|(bt, _)| t < bt) {
            best = Some((t, normal));
        }
    };

    for seg in &cushion.segments {
        let vn = v2.dot(seg.normal);
        if vn >= 0.0 {
            continue;
        }
        let d0 = (p2 - seg.start).dot(seg.normal);
        if d0 < 0.0 {
            // Centre already behind this face
            continue;
        }
        let t = ((d0 - radius) / -vn).max(0.0);
        let hit = p2 + v2 * t;
        let along = (hit - seg.start).dot(seg.dir);
        if (0.0..=seg.length).contains(&along) {
            consider(t, seg.normal);
        }
    }

    for vertex in &cushion.vertices {
        let dp = (*vertex - p2).extend(0.0);
        if let Some(t) = quadratic_contact(dp, -v, radius) {
            let at = p2 + v2 * t;
            let normal = (at - *vertex).normalize_or_zero();
            if normal != DVec2::ZERO {
                consider(t, normal);
            }
        }
    }

    best
}

/// Time until a ball centre enters a pocket's capture circle
pub fn ball_pocket_time(p: DVec3, v: DVec3, pocket: &Pocket) -> Option<f64> {
    let dv = planar(-v);
    if dv.length_squared() < QUADRATIC_EPSILON {
        return None;
    }
    let dp = pocket.center.extend(0.0) - planar(p);
    quadratic_contact(dp, dv, pocket.radius)
}

/// Earliest upcoming event within `window`, over all active pairs
pub fn next_event_time(state: &SimulationState, params: &Params, window: f64) -> Option<f64> {
    let table = &state.table;
    let mean: Vec<DVec3> = state
        .balls
        .iter()
        .map(|b| mean_velocity(b, window, params, table))
        .collect();

    let mut earliest: Option<f64> = None;
    let mut consider = |t: f64| {
        if t <= window && earliest.is_none_or(|e| t < e) {
            earliest = Some(t);
        }
    };

    for &(i, j) in state.ball_pairs() {
        let (a, b) = (&state.balls[i], &state.balls[j]);
        if a.state == MotionState::Airborne || b.state == MotionState::Airborne {
            continue;
        }
        if mean[i] == DVec3::ZERO && mean[j] == DVec3::ZERO {
            continue;
        }
        if is_persistent_contact(a, b) {
            continue;
        }
        let reach = a.radius() + b.radius();
        if let Some(t) = ball_ball_time(a.pos, mean[i], b.pos, mean[j], reach) {
            if t == 0.0 && !touching_and_closing(a, b) {
                continue;
            }
            consider(t);
        }
    }

    for &(i, c) in state.cushion_pairs() {
        let ball = &state.balls[i];
        if mean[i] == DVec3::ZERO {
            continue;
        }
        if ball.state == MotionState::Airborne && ball.pos.z > params.rail_height {
            continue;
        }
        let cushion = &table.cushions[c];
        if let Some((t, normal)) = ball_cushion_time(ball.pos, mean[i], ball.radius(), cushion, window) {
            if t == 0.0 && ball.vel.truncate().dot(normal) >= -CLOSING_EPSILON {
                continue;
            }
            consider(t);
        }
    }

    for &(i, p) in state.pocket_pairs() {
        let ball = &state.balls[i];
        if mean[i] == DVec3::ZERO || ball.state == MotionState::Airborne {
            continue;
        }
        let pocket = &table.pockets[p];
        // Already within capture range: the resolution pass takes it
        if pocket.distance_to(ball.pos) <= pocket.radius + CONTACT_SLOP {
            continue;
        }
        if let Some(t) = ball_pocket_time(ball.pos, mean[i], pocket) {
            consider(t);
        }
    }

    earliest
}

/// A touching pair whose actual velocities still close it
fn touching_and_closing(a: &Ball, b: &Ball) -> bool {
    let n = planar(b.pos - a.pos).normalize_or_zero();
    planar(b.vel - a.vel).dot(n) < -CLOSING_EPSILON
}

/// Normal speed of `b` relative to `a` for a touching pair
///
/// Negative while closing. `None` when the pair is apart or coincident.
pub fn contact_closing(a: &Ball, b: &Ball) -> Option<(DVec3, f64)> {
    let dp = planar(b.pos - a.pos);
    let dist = dp.length();
    if dist > a.radius() + b.radius() + CONTACT_SLOP || dist < TANGENT_EPSILON {
        return None;
    }
    let normal = dp / dist;
    Some((normal, planar(b.vel - a.vel).dot(normal)))
}

/// Touching pair whose normal speed is below `RESTING_EPSILON`
///
/// Such a pair is in persistent contact (resting, or one ball pushing the
/// other). It never produces an event; `hold_persistent_contacts` keeps it
/// apart at the end of each step.
pub fn is_persistent_contact(a: &Ball, b: &Ball) -> bool {
    contact_closing(a, b).is_some_and(|(_, closing)| closing.abs() < RESTING_EPSILON)
}
