//! Closed-form motion of a single ball through its phases
//!
//! Each phase has constant acceleration, so position, velocity and spin are
//! exact polynomials in time up to the next phase boundary. `evolve` walks
//! as many boundaries as fit in one interval (slide → roll → spin → rest).

use glam::{DQuat, DVec3};

use super::ball::{Ball, MotionState};
use super::table::Table;
use crate::consts::*;
use crate::params::Params;
use crate::{planar, z_cross};

/// Advance one ball by `dt` seconds
///
/// Stationary and out-of-play balls are never touched.
pub fn evolve(ball: &mut Ball, dt: f64, params: &Params, table: &Table) {
    if dt <= 0.0 || matches!(ball.state, MotionState::Stationary | MotionState::OutOfPlay) {
        return;
    }

    let mut remaining = dt;
    for _ in 0..MAX_PHASE_TRANSITIONS {
        if remaining <= 0.0 {
            break;
        }
        let used = match ball.state {
            MotionState::Stationary | MotionState::OutOfPlay => break,
            MotionState::Sliding => slide(ball, remaining, params),
            MotionState::Rolling => roll(ball, remaining, params),
            MotionState::Spinning => spin_in_place(ball, remaining, params),
            MotionState::Airborne => fly(ball, remaining, params),
            MotionState::Pocketed => fall(ball, remaining, params, table),
        };
        remaining -= used;
    }

    ball.snap_small();
    ball.refresh_state();
}

/// Time until the ball's current phase ends on its own
pub fn phase_duration(ball: &Ball, params: &Params) -> f64 {
    let r = ball.radius();
    let g = params.gravity;
    match ball.state {
        MotionState::Sliding => {
            let a = params.sliding_friction * g;
            2.0 * ball.contact_velocity().length() / (7.0 * a)
        }
        MotionState::Rolling => planar(ball.vel).length() / (params.rolling_friction * g),
        MotionState::Spinning => ball.spin.z.abs() / params.spin_deceleration(r),
        MotionState::Airborne => {
            let vz = ball.vel.z;
            let height = (ball.pos.z - r).max(0.0);
            (vz + (vz * vz + 2.0 * g * height).sqrt()) / g
        }
        MotionState::Stationary | MotionState::Pocketed | MotionState::OutOfPlay => {
            f64::INFINITY
        }
    }
}

/// z-spin after `t` seconds of constant cloth deceleration
fn decay_z(wz: f64, t: f64, deceleration: f64) -> f64 {
    let drop = deceleration * t;
    if wz.abs() <= drop {
        0.0
    } else {
        wz - wz.signum() * drop
    }
}

/// Turn the orientation by a mean angular velocity over `t`
fn rotate(ball: &mut Ball, mean_spin: DVec3, t: f64) {
    let angle = mean_spin * t;
    if angle.length_squared() > 0.0 {
        ball.orientation = (DQuat::from_scaled_axis(angle) * ball.orientation).normalize();
    }
}

/// Sliding: friction opposes the contact velocity, whose direction stays fixed
fn slide(ball: &mut Ball, remaining: f64, params: &Params) -> f64 {
    let u = ball.contact_velocity();
    let slip = u.length();
    if slip <= ROLLING_EPSILON {
        ball.spin = ball.rolling_spin();
        ball.state = MotionState::Rolling;
        return 0.0;
    }

    let r = ball.radius();
    let a = params.sliding_friction * params.gravity;
    let tau = 2.0 * slip / (7.0 * a);
    let t = remaining.min(tau);
    let u_hat = u / slip;
    let w0 = ball.spin;

    ball.pos += planar(ball.vel) * t - u_hat * (0.5 * a * t * t);
    ball.vel = planar(ball.vel) - u_hat * (a * t);
    let dw = z_cross(u_hat) * (5.0 * a * t / (2.0 * r));
    ball.spin.x += dw.x;
    ball.spin.y += dw.y;
    ball.spin.z = decay_z(w0.z, t, params.spin_deceleration(r));
    rotate(ball, (w0 + ball.spin) * 0.5, t);

    if t >= tau {
        ball.spin = ball.rolling_spin();
        ball.state = MotionState::Rolling;
        if planar(ball.vel).length() <= VELOCITY_EPSILON {
            stop_translation(ball);
        }
    }
    t
}

/// Rolling: spin stays locked to travel, translation decays linearly
fn roll(ball: &mut Ball, remaining: f64, params: &Params) -> f64 {
    let v = planar(ball.vel);
    let speed = v.length();
    if speed <= VELOCITY_EPSILON {
        stop_translation(ball);
        return 0.0;
    }

    let r = ball.radius();
    let a = params.rolling_friction * params.gravity;
    let tau = speed / a;
    let t = remaining.min(tau);
    let v_hat = v / speed;
    let w0 = ball.spin;

    ball.pos += v * t - v_hat * (0.5 * a * t * t);
    ball.vel = v - v_hat * (a * t);
    ball.spin.z = decay_z(w0.z, t, params.spin_deceleration(r));
    ball.spin = ball.rolling_spin();
    rotate(ball, (w0 + ball.spin) * 0.5, t);

    if t >= tau {
        stop_translation(ball);
    }
    t
}

/// Centre has stopped: keep only z-spin, if any
fn stop_translation(ball: &mut Ball) {
    ball.vel = DVec3::ZERO;
    ball.spin = DVec3::new(0.0, 0.0, ball.spin.z);
    ball.state = if ball.spin.z.abs() > SPIN_EPSILON {
        MotionState::Spinning
    } else {
        ball.spin = DVec3::ZERO;
        MotionState::Stationary
    };
}

/// Spinning in place: z-spin decays at constant rate
fn spin_in_place(ball: &mut Ball, remaining: f64, params: &Params) -> f64 {
    let deceleration = params.spin_deceleration(ball.radius());
    let tau = ball.spin.z.abs() / deceleration;
    let t = remaining.min(tau);
    let w0 = ball.spin;

    ball.spin.z = decay_z(w0.z, t, deceleration);
    rotate(ball, (w0 + ball.spin) * 0.5, t);

    if t >= tau {
        ball.spin = DVec3::ZERO;
        ball.state = MotionState::Stationary;
    }
    t
}

/// Airborne: parabola until the centre is back at table height
fn fly(ball: &mut Ball, remaining: f64, params: &Params) -> f64 {
    let g = params.gravity;
    let tau = phase_duration(ball, params);
    let t = remaining.min(tau);

    ball.pos += ball.vel * t + DVec3::new(0.0, 0.0, -0.5 * g * t * t);
    ball.vel.z -= g * t;
    rotate(ball, ball.spin, t);

    if t >= tau {
        ball.pos.z = ball.radius();
        let rebound = -ball.vel.z * params.table_restitution;
        if rebound > MIN_BOUNCE_SPEED {
            ball.vel.z = rebound;
        } else {
            ball.vel.z = 0.0;
            ball.state = MotionState::Sliding;
            ball.refresh_state();
        }
    }
    t
}

/// Pocketed: gravity fall to the pocket floor, confined by the pocket wall
fn fall(ball: &mut Ball, remaining: f64, params: &Params, table: &Table) -> f64 {
    let pocket = match ball.pocket.and_then(|id| table.pocket(id)) {
        Some(pocket) => *pocket,
        None => panic!("pocketed ball {} has no valid owning pocket", ball.id),
    };

    let floor = ball.radius() - pocket.depth;
    if ball.pos.z <= floor && ball.vel == DVec3::ZERO {
        return remaining;
    }

    let g = params.gravity;
    let vz = ball.vel.z;
    let height = (ball.pos.z - floor).max(0.0);
    let tau = (vz + (vz * vz + 2.0 * g * height).sqrt()) / g;
    let t = remaining.min(tau);

    ball.pos += ball.vel * t + DVec3::new(0.0, 0.0, -0.5 * g * t * t);
    ball.vel.z -= g * t;
    rotate(ball, ball.spin, t);

    let offset = ball.pos.truncate() - pocket.center;
    let dist = offset.length();
    if dist > pocket.radius {
        let n = offset / dist;
        let edge = pocket.center + n * pocket.radius;
        ball.pos.x = edge.x;
        ball.pos.y = edge.y;
        let outward = ball.vel.truncate().dot(n);
        if outward > 0.0 {
            let dv = n * (outward * (1.0 + POCKET_WALL_DAMPING));
            ball.vel.x -= dv.x;
            ball.vel.y -= dv.y;
        }
    }

    if t >= tau {
        ball.pos.z = floor;
        ball.vel = DVec3::ZERO;
        ball.spin = DVec3::ZERO;
        return remaining;
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Params, Table) {
        let params = Params::default();
        let table = Table::standard(&params);
        (params, table)
    }

    fn ball(params: &Params) -> Ball {
        Ball::new(1, 0.0, 0.0, params.ball_radius, params.ball_mass)
    }

    #[test]
    fn test_stationary_ball_is_never_advanced() {
        let (params, table) = setup();
        let mut b = ball(&params);
        // Inconsistent on purpose: a stationary ball must not be touched
        b.vel = DVec3::new(1.0, 0.0, 0.0);
        let before = b.clone();
        evolve(&mut b, 1.0, &params, &table);
        assert_eq!(b, before);
    }

    #[test]
    fn test_slide_ends_in_rolling_at_five_sevenths() {
        let (params, table) = setup();
        let mut b = ball(&params);
        b.vel = DVec3::new(2.0, 0.0, 0.0);
        b.state = MotionState::Sliding;
        let tau = phase_duration(&b, &params);
        let expected_tau = 2.0 * 2.0 / (7.0 * params.sliding_friction * params.gravity);
        assert!((tau - expected_tau).abs() < 1e-12);

        evolve(&mut b, tau, &params, &table);
        assert_eq!(b.state, MotionState::Rolling);
        assert!((b.vel.x - 2.0 * 5.0 / 7.0).abs() < 1e-9);
        assert!(b.contact_velocity().length() < 1e-9);
    }

    #[test]
    fn test_rolling_stops_at_analytic_distance() {
        let (params, table) = setup();
        let mut b = ball(&params);
        b.vel = DVec3::new(0.0, 0.8, 0.0);
        b.spin = b.rolling_spin();
        b.refresh_state();
        assert_eq!(b.state, MotionState::Rolling);

        evolve(&mut b, 100.0, &params, &table);
        let expected = 0.8 * 0.8 / (2.0 * params.rolling_friction * params.gravity);
        assert_eq!(b.state, MotionState::Stationary);
        assert!((b.pos.y - expected).abs() < 1e-9);
        assert_eq!(b.vel, DVec3::ZERO);
    }

    #[test]
    fn test_traverses_slide_roll_spin_in_one_call() {
        let (params, table) = setup();
        let g = params.gravity;
        let mut b = ball(&params);
        b.vel = DVec3::new(1.0, 0.0, 0.0);
        b.spin = DVec3::new(0.0, 0.0, 400.0);
        b.state = MotionState::Sliding;

        let a_s = params.sliding_friction * g;
        let tau_s = 2.0 * 1.0 / (7.0 * a_s);
        let slide_dist = tau_s - 0.5 * a_s * tau_s * tau_s;
        let v1 = 1.0 - a_s * tau_s;
        let roll_dist = v1 * v1 / (2.0 * params.rolling_friction * g);

        evolve(&mut b, 7.5, &params, &table);
        assert_eq!(b.state, MotionState::Spinning);
        assert!((b.pos.x - (slide_dist + roll_dist)).abs() < 1e-9);
        assert!(b.spin.z > 0.0);

        evolve(&mut b, 20.0, &params, &table);
        assert_eq!(b.state, MotionState::Stationary);
        assert_eq!(b.spin, DVec3::ZERO);
    }

    #[test]
    fn test_airborne_bounces_then_lands() {
        let (params, table) = setup();
        let mut b = ball(&params);
        b.vel = DVec3::new(1.0, 0.0, 1.0);
        b.state = MotionState::Airborne;

        evolve(&mut b, 0.1, &params, &table);
        assert_eq!(b.state, MotionState::Airborne);
        assert!(b.pos.z > b.radius());

        evolve(&mut b, 0.4, &params, &table);
        assert_eq!(b.state, MotionState::Sliding);
        assert_eq!(b.pos.z, b.radius());
        assert_eq!(b.vel.z, 0.0);
    }

    #[test]
    fn test_pocketed_ball_falls_and_rests() {
        let (params, table) = setup();
        let pocket = table.pockets[4];
        let mut b = ball(&params);
        b.pos.x = pocket.center.x + pocket.radius * 0.9;
        b.pos.y = pocket.center.y;
        b.vel = DVec3::new(1.5, 0.0, 0.0);
        b.capture(pocket.id);

        evolve(&mut b, 1.0, &params, &table);
        assert_eq!(b.state, MotionState::Pocketed);
        assert!(b.is_at_rest());
        assert!((b.pos.z - (b.radius() - pocket.depth)).abs() < 1e-12);
        assert!(pocket.distance_to(b.pos) <= pocket.radius + 1e-12);
    }

    #[test]
    #[should_panic(expected = "no valid owning pocket")]
    fn test_pocketed_without_pocket_panics() {
        let (params, table) = setup();
        let mut b = ball(&params);
        b.state = MotionState::Pocketed;
        evolve(&mut b, 0.1, &params, &table);
    }

    #[test]
    fn test_orientation_follows_roll() {
        let (params, table) = setup();
        let mut b = ball(&params);
        b.vel = DVec3::new(1.0, 0.0, 0.0);
        b.spin = b.rolling_spin();
        b.refresh_state();
        evolve(&mut b, 0.05, &params, &table);
        assert_ne!(b.orientation, DQuat::IDENTITY);
        assert!((b.orientation.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tiny_motion_snaps_to_rest() {
        let (params, table) = setup();
        let mut b = ball(&params);
        b.vel = DVec3::new(2e-6, 0.0, 0.0);
        b.spin = b.rolling_spin();
        b.state = MotionState::Rolling;
        evolve(&mut b, 1e-3, &params, &table);
        assert_eq!(b.state, MotionState::Stationary);
        assert_eq!(b.vel, DVec3::ZERO);
    }
}
