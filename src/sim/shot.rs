//! Cue strike description and its application to the cue ball

use std::f64::consts::FRAC_PI_2;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::ball::{Ball, MotionState};
use crate::consts::*;
use crate::params::Params;
use crate::{normalize_angle, z_cross};

/// A cue strike
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    /// Aim direction in the table plane (radians, 0 = +x)
    pub angle: f64,
    /// Strike strength in engine units
    pub force: f64,
    /// Side spin, -1 (left) to 1 (right)
    pub side: f64,
    /// Top spin, -1 (draw) to 1 (follow)
    pub top: f64,
    /// Cue elevation, 0 to π/2
    pub lift: f64,
}

/// Quantized shot, equal for shots that play identically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShotKey {
    pub angle: i32,
    pub force: i32,
    pub side: i32,
    pub top: i32,
    pub lift: i32,
}

impl Shot {
    pub fn new(angle: f64, force: f64) -> Self {
        Self {
            angle,
            force,
            side: 0.0,
            top: 0.0,
            lift: 0.0,
        }
    }

    pub fn with_spin(mut self, side: f64, top: f64) -> Self {
        self.side = side;
        self.top = top;
        self
    }

    pub fn with_lift(mut self, lift: f64) -> Self {
        self.lift = lift;
        self
    }

    /// Memoization key: angles to 1e-3 rad, the rest to 1e-2
    pub fn key(&self) -> ShotKey {
        ShotKey {
            angle: (normalize_angle(self.angle) * 1000.0).round() as i32,
            force: (self.force * 100.0).round() as i32,
            side: (self.side.clamp(-1.0, 1.0) * 100.0).round() as i32,
            top: (self.top.clamp(-1.0, 1.0) * 100.0).round() as i32,
            lift: (self.lift.clamp(0.0, FRAC_PI_2) * 1000.0).round() as i32,
        }
    }

    /// Set the cue ball moving
    ///
    /// The tip offset drives the spin: a strike `b` off centre gives
    /// ω = 5 v b / 2R², with `b` up to `MAX_TIP_OFFSET` of the radius.
    pub fn apply(&self, cue: &mut Ball, params: &Params) {
        assert!(cue.is_cue(), "shots are applied to the cue ball, got {}", cue.id);
        if !cue.state.is_active() {
            log::warn!("Ignoring shot on cue ball in state {:?}", cue.state);
            return;
        }

        let speed = self.force.max(0.0) * params.force_scale;
        let lift = self.lift.clamp(0.0, FRAC_PI_2);
        let side = self.side.clamp(-1.0, 1.0);
        let top = self.top.clamp(-1.0, 1.0);
        let r = cue.radius();

        let aim = DVec3::new(self.angle.cos(), self.angle.sin(), 0.0);
        cue.vel = aim * (speed * lift.cos()) + DVec3::Z * (speed * lift.sin());

        let spin_scale = 2.5 * MAX_TIP_OFFSET * speed / r;
        cue.spin = z_cross(aim) * (top * spin_scale) + DVec3::Z * (-side * spin_scale);

        if cue.vel.z > VELOCITY_EPSILON {
            cue.state = MotionState::Airborne;
        } else {
            cue.vel.z = 0.0;
            // Force a re-derive even from rest
            cue.state = MotionState::Sliding;
            cue.refresh_state();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cue() -> Ball {
        let p = Params::default();
        Ball::new(0, 0.0, 0.0, p.ball_radius, p.ball_mass)
    }

    #[test]
    fn test_key_quantizes() {
        let a = Shot::new(0.5, 10.0).with_spin(0.301, -0.2);
        let b = Shot::new(0.5002, 10.001).with_spin(0.299, -0.2);
        assert_eq!(a.key(), b.key());
        let c = Shot::new(0.502, 10.0).with_spin(0.3, -0.2);
        assert_ne!(a.key(), c.key());

        let mut memo = HashMap::new();
        memo.insert(a.key(), 1);
        assert_eq!(memo.get(&b.key()), Some(&1));
    }

    #[test]
    fn test_key_wraps_angle() {
        let a = Shot::new(0.25, 5.0);
        let b = Shot::new(0.25 + std::f64::consts::TAU, 5.0);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_plain_strike_slides_along_aim() {
        let params = Params::default();
        let mut ball = cue();
        Shot::new(0.0, 10.0).apply(&mut ball, &params);
        assert!((ball.vel - DVec3::new(5.0, 0.0, 0.0)).length() < 1e-12);
        assert_eq!(ball.spin, DVec3::ZERO);
        assert_eq!(ball.state, MotionState::Sliding);
    }

    #[test]
    fn test_follow_and_english() {
        let params = Params::default();
        let mut ball = cue();
        Shot::new(0.0, 4.0).with_spin(1.0, 1.0).apply(&mut ball, &params);
        let r = params.ball_radius;
        // Follow spins about +y for motion along +x (rolling direction)
        assert!(ball.spin.y > 0.0);
        assert!((ball.spin.y - 1.25 * 2.0 / r).abs() < 1e-9);
        // Right english spins clockwise seen from above
        assert!(ball.spin.z < 0.0);
    }

    #[test]
    fn test_lift_goes_airborne() {
        let params = Params::default();
        let mut ball = cue();
        Shot::new(0.0, 10.0).with_lift(0.3).apply(&mut ball, &params);
        assert_eq!(ball.state, MotionState::Airborne);
        assert!(ball.vel.z > 0.0);
        assert!((ball.vel.length() - 5.0).abs() < 1e-12);
    }
}
