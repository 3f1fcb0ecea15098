//! Billiards Sim - deterministic event-driven billiards physics
//!
//! Core modules:
//! - `sim`: Deterministic simulation (motion, collision prediction/resolution, stepping)
//! - `params`: Immutable physics/table configuration
//! - `pool`: Background and batch shot evaluation on worker threads

pub mod params;
pub mod pool;
pub mod sim;

pub use params::Params;
pub use pool::{BackgroundRun, JobId, JobOutput, ShotPool};

use glam::DVec3;

/// Engine constants
///
/// Epsilons guard degenerate geometry. The values marked "tuned" shape how
/// shots feel and were picked by play-testing rather than derived.
pub mod consts {
    /// Speeds below this snap to zero (m/s)
    pub const VELOCITY_EPSILON: f64 = 1e-5;
    /// Angular speeds below this snap to zero (rad/s)
    pub const SPIN_EPSILON: f64 = 1e-4;
    /// Contact-point speed under which a ball counts as rolling (m/s)
    pub const ROLLING_EPSILON: f64 = 1e-5;

    /// Distance tolerance for treating two surfaces as touching (m)
    pub const CONTACT_SLOP: f64 = 1e-5;
    /// Normal relative speed below which a contact counts as closing (m/s)
    pub const CLOSING_EPSILON: f64 = 1e-8;
    /// Nearly resting contacts are skipped below this speed (m/s)
    pub const RESTING_EPSILON: f64 = 1e-4;
    /// Tangential slip below this is left alone (m/s)
    pub const TANGENT_EPSILON: f64 = 1e-6;
    /// Smallest usable pivot in the dense contact solve
    pub const PIVOT_EPSILON: f64 = 1e-12;
    /// Smallest quadratic leading coefficient treated as moving
    pub const QUADRATIC_EPSILON: f64 = 1e-12;

    /// Share of ball-ball penetration removed per resolution pass (tuned)
    pub const SEPARATION_FRACTION: f64 = 0.8;
    /// Sweeps of the ball-ball friction pass (tuned)
    pub const FRICTION_ITERATIONS: usize = 4;
    /// z-spin kept after a cushion hit (tuned)
    pub const CUSHION_SPIN_RETENTION: f64 = 0.5;
    /// Radial speed kept when a falling ball glances off the pocket wall (tuned)
    pub const POCKET_WALL_DAMPING: f64 = 0.3;
    /// Rebound speed under which an airborne ball settles onto the cloth (m/s)
    pub const MIN_BOUNCE_SPEED: f64 = 0.1;
    /// Cue-tip offset at full side/top spin, as a fraction of ball radius
    pub const MAX_TIP_OFFSET: f64 = 0.5;

    /// Phase changes a single evolution call may walk through
    pub const MAX_PHASE_TRANSITIONS: usize = 16;
    /// Gap left between racked balls (m)
    pub const RACK_GAP: f64 = 2e-5;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f64) -> f64 {
    use std::f64::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Drop the vertical component of a vector
#[inline]
pub fn planar(v: DVec3) -> DVec3 {
    DVec3::new(v.x, v.y, 0.0)
}

/// In-plane perpendicular, ẑ × v
#[inline]
pub fn z_cross(v: DVec3) -> DVec3 {
    DVec3::new(-v.y, v.x, 0.0)
}

/// Round to a fixed number of decimals, for fixtures and comparisons
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * PI) - (-PI)).abs() < 1e-12);
        assert!((normalize_angle(-PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((normalize_angle(2.0 * PI + 0.25) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_z_cross() {
        let v = z_cross(DVec3::X);
        assert!((v - DVec3::Y).length() < 1e-12);
        let v = z_cross(DVec3::Y);
        assert!((v + DVec3::X).length() < 1e-12);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 3), 1.235);
        assert_eq!(round_to(-0.00004, 4), -0.0);
    }
}
