//! Ball entity and its motion state
//!
//! Coordinate system: table plane is xy, z points up. A ball resting on the
//! cloth has its centre at z = radius.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::{planar, z_cross};

/// Identity of the cue ball
pub const CUE_BALL_ID: u32 = 0;

/// Motion phase of a ball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionState {
    /// No motion at all
    Stationary,
    /// Contact point slips against the cloth
    Sliding,
    /// Pure rolling, contact point at rest
    Rolling,
    /// Only z-spin left, centre at rest
    Spinning,
    /// Off the cloth, projectile motion
    Airborne,
    /// Captured by a pocket (terminal)
    Pocketed,
    /// Left the table (terminal)
    OutOfPlay,
}

impl MotionState {
    /// Balls in this state can still collide laterally
    #[inline]
    pub fn is_active(self) -> bool {
        !matches!(self, MotionState::Pocketed | MotionState::OutOfPlay)
    }

    /// On the cloth (not flying, not captured)
    #[inline]
    pub fn on_table(self) -> bool {
        matches!(
            self,
            MotionState::Stationary
                | MotionState::Sliding
                | MotionState::Rolling
                | MotionState::Spinning
        )
    }
}

/// A ball entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    /// 0 is always the cue ball
    pub id: u32,
    pub pos: DVec3,
    pub vel: DVec3,
    /// Angular velocity (rad/s)
    pub spin: DVec3,
    pub orientation: DQuat,
    pub state: MotionState,
    /// Owning pocket once captured
    pub pocket: Option<u32>,
    radius: f64,
    mass: f64,
}

impl Ball {
    /// A stationary ball resting on the cloth at (x, y)
    pub fn new(id: u32, x: f64, y: f64, radius: f64, mass: f64) -> Self {
        assert!(radius > 0.0 && mass > 0.0, "ball {id} needs positive radius and mass");
        Self {
            id,
            pos: DVec3::new(x, y, radius),
            vel: DVec3::ZERO,
            spin: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            state: MotionState::Stationary,
            pocket: None,
            radius,
            mass,
        }
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    #[inline]
    pub fn inv_mass(&self) -> f64 {
        1.0 / self.mass
    }

    /// Moment of inertia of a solid sphere
    #[inline]
    pub fn inertia(&self) -> f64 {
        0.4 * self.mass * self.radius * self.radius
    }

    #[inline]
    pub fn is_cue(&self) -> bool {
        self.id == CUE_BALL_ID
    }

    /// Velocity of the surface point touching the cloth, v + ω × (−R ẑ)
    pub fn contact_velocity(&self) -> DVec3 {
        planar(self.vel + self.spin.cross(DVec3::new(0.0, 0.0, -self.radius)))
    }

    /// Angular velocity that makes the current planar velocity pure rolling
    pub fn rolling_spin(&self) -> DVec3 {
        let w = z_cross(self.vel) / self.radius;
        DVec3::new(w.x, w.y, self.spin.z)
    }

    /// Nothing left to simulate for this ball
    pub fn is_at_rest(&self) -> bool {
        match self.state {
            MotionState::Stationary | MotionState::OutOfPlay => true,
            MotionState::Pocketed => self.vel == DVec3::ZERO,
            _ => false,
        }
    }

    /// Zero out components too small to matter
    pub fn snap_small(&mut self) {
        for c in [&mut self.vel.x, &mut self.vel.y, &mut self.vel.z] {
            if c.abs() < VELOCITY_EPSILON {
                *c = 0.0;
            }
        }
        for c in [&mut self.spin.x, &mut self.spin.y, &mut self.spin.z] {
            if c.abs() < SPIN_EPSILON {
                *c = 0.0;
            }
        }
    }

    /// Re-derive an on-table state from the current velocities
    ///
    /// Airborne and terminal states are left alone; they change only
    /// through landing, capture or ejection.
    pub fn refresh_state(&mut self) {
        if !self.state.on_table() {
            return;
        }
        let u = self.contact_velocity();
        self.state = if u.length() > ROLLING_EPSILON {
            MotionState::Sliding
        } else if planar(self.vel).length() > VELOCITY_EPSILON {
            MotionState::Rolling
        } else if self.spin.z.abs() > SPIN_EPSILON {
            MotionState::Spinning
        } else {
            MotionState::Stationary
        };
        if self.state == MotionState::Stationary {
            self.vel = DVec3::ZERO;
            self.spin = DVec3::ZERO;
        }
    }

    /// Capture by a pocket; the fall itself is handled by motion evolution
    pub fn capture(&mut self, pocket_id: u32) {
        self.state = MotionState::Pocketed;
        self.pocket = Some(pocket_id);
    }

    /// Take the ball off the table for good
    pub fn eject(&mut self) {
        self.state = MotionState::OutOfPlay;
        self.vel = DVec3::ZERO;
        self.spin = DVec3::ZERO;
    }

    pub fn snapshot(&self) -> BallSnapshot {
        BallSnapshot {
            id: self.id,
            pos: self.pos,
            vel: self.vel,
            spin: self.spin,
            state: self.state,
        }
    }
}

/// Copy of the kinematic fields of a ball at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub id: u32,
    pub pos: DVec3,
    pub vel: DVec3,
    pub spin: DVec3,
    pub state: MotionState,
}
