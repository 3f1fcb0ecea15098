//! Event-driven step
//!
//! One call covers `dt` seconds of simulated time. Inside it the state jumps
//! from one predicted contact to the next, so collisions are resolved in
//! temporal order no matter how fast the balls move.

use super::collision::{hold_persistent_contacts, resolve_all};
use super::motion::evolve;
use super::predict::next_event_time;
use super::result::SimResult;
use super::state::SimulationState;
use crate::params::Params;

/// Move every ball forward by `t` seconds with no interaction
fn advance(state: &mut SimulationState, params: &Params, t: f64) {
    let table = &state.table;
    for ball in &mut state.balls {
        evolve(ball, t, params, table);
    }
    state.time += t;
}

/// Advance the simulation by `dt` seconds
///
/// Returns the number of substeps taken. When `params.max_substeps` is
/// reached the rest of `dt` is dropped; the state stays consistent at the
/// last event instant. Pairs in persistent contact are held apart once, at
/// the end.
pub fn step(state: &mut SimulationState, params: &Params, dt: f64, result: &mut SimResult) -> u32 {
    let mut remaining = dt;
    let mut substeps = 0;

    while remaining > 0.0 {
        if substeps >= params.max_substeps {
            log::debug!(
                "substep cap {} reached at t={:.5}, dropping {:.6}s",
                params.max_substeps,
                state.time,
                remaining
            );
            break;
        }
        substeps += 1;

        let t = match next_event_time(state, params, remaining) {
            Some(t) if t < remaining => t,
            _ => remaining,
        };
        advance(state, params, t);
        remaining -= t;
        result.elapsed += t;

        if resolve_all(state, params, result) {
            log::debug!("t={:.5} active balls: {:?}", state.time, state.active_ids());
        }
    }

    hold_persistent_contacts(state);

    state.steps += 1;
    result.steps += 1;
    result.substeps += u64::from(substeps);
    substeps
}
