//! Deterministic simulation module
//!
//! All physics lives here. This module must be pure and deterministic:
//! - Explicit `Params` passed into every entry point, no globals
//! - Seeded RNG only, and only at rack setup
//! - Stable iteration order (balls sorted by id)
//! - No threads, rendering or platform dependencies

pub mod ball;
pub mod collision;
pub mod motion;
pub mod predict;
pub mod result;
pub mod runner;
pub mod shot;
pub mod solver;
pub mod state;
pub mod table;
pub mod tick;

pub use ball::{Ball, BallSnapshot, CUE_BALL_ID, MotionState};
pub use collision::resolve_all;
pub use motion::evolve;
pub use predict::next_event_time;
pub use result::{Collision, CollisionKind, SimResult, TrackingPoint};
pub use runner::{golden_positions, run, strike};
pub use shot::{Shot, ShotKey};
pub use state::SimulationState;
pub use table::{Cushion, Pocket, Table};
pub use tick::step;
