//! Simulation state and rack setup
//!
//! Everything a run needs lives here so the whole value can be cloned across
//! a thread boundary. Active pair lists are derived data: call
//! `refresh_pairs` whenever a ball enters or leaves play.

use std::collections::BTreeMap;

use glam::DQuat;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::ball::{Ball, CUE_BALL_ID, MotionState};
use super::table::Table;
use crate::consts::*;
use crate::params::Params;

/// Complete simulation state (deterministic, serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub table: Table,
    /// All balls of the rack, sorted by id
    pub balls: Vec<Ball>,
    /// Simulated seconds since the state was built
    pub time: f64,
    /// Ticks taken
    pub steps: u64,
    /// Pocket id → ids of the balls it holds, in capture order
    pub pocketed: BTreeMap<u32, Vec<u32>>,
    /// Active ball index pairs (i < j)
    ball_pairs: Vec<(usize, usize)>,
    /// Active ball index × cushion index
    cushion_pairs: Vec<(usize, usize)>,
    /// Active ball index × pocket index
    pocket_pairs: Vec<(usize, usize)>,
}

impl SimulationState {
    pub fn new(table: Table, mut balls: Vec<Ball>) -> Self {
        balls.sort_by_key(|b| b.id);
        let mut pocketed: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for ball in &balls {
            if let (MotionState::Pocketed, Some(pocket)) = (ball.state, ball.pocket) {
                pocketed.entry(pocket).or_default().push(ball.id);
            }
        }
        let mut state = Self {
            table,
            balls,
            time: 0.0,
            steps: 0,
            pocketed,
            ball_pairs: Vec::new(),
            cushion_pairs: Vec::new(),
            pocket_pairs: Vec::new(),
        };
        state.refresh_pairs();
        state
    }

    /// Regulation fifteen-ball triangle plus the cue ball
    ///
    /// The seed only picks the balls' initial orientations.
    pub fn standard_rack(params: &Params, seed: u64) -> Self {
        let table = Table::standard(params);
        let r = params.ball_radius;
        let spacing = 2.0 * r + RACK_GAP;
        let row_step = spacing * (3.0f64).sqrt() / 2.0;
        let head = -params.table_length / 4.0;
        let foot = params.table_length / 4.0;

        // Row by row from the apex; 8 sits mid third row
        const ORDER: [u32; 15] = [1, 9, 2, 10, 8, 3, 11, 4, 12, 5, 13, 6, 14, 7, 15];

        let mut rng = Pcg32::seed_from_u64(seed);
        let mut balls = Vec::with_capacity(16);
        balls.push(Ball::new(CUE_BALL_ID, head, 0.0, r, params.ball_mass));

        let mut k = 0;
        for row in 0..5 {
            for j in 0..=row {
                let x = foot + row as f64 * row_step;
                let y = (j as f64 - row as f64 / 2.0) * spacing;
                balls.push(Ball::new(ORDER[k], x, y, r, params.ball_mass));
                k += 1;
            }
        }

        for ball in &mut balls {
            ball.orientation = random_orientation(&mut rng);
        }

        Self::new(table, balls)
    }

    /// Rebuild active pair lists from the current ball states
    pub fn refresh_pairs(&mut self) {
        let active: Vec<usize> = self
            .balls
            .iter()
            .enumerate()
            .filter(|(_, b)| b.state.is_active())
            .map(|(i, _)| i)
            .collect();

        self.ball_pairs.clear();
        for (n, &i) in active.iter().enumerate() {
            for &j in &active[n + 1..] {
                self.ball_pairs.push((i, j));
            }
        }

        self.cushion_pairs.clear();
        self.pocket_pairs.clear();
        for &i in &active {
            for c in 0..self.table.cushions.len() {
                self.cushion_pairs.push((i, c));
            }
            for p in 0..self.table.pockets.len() {
                self.pocket_pairs.push((i, p));
            }
        }
    }

    pub fn ball_pairs(&self) -> &[(usize, usize)] {
        &self.ball_pairs
    }

    pub fn cushion_pairs(&self) -> &[(usize, usize)] {
        &self.cushion_pairs
    }

    pub fn pocket_pairs(&self) -> &[(usize, usize)] {
        &self.pocket_pairs
    }

    pub fn ball(&self, id: u32) -> Option<&Ball> {
        self.balls.iter().find(|b| b.id == id)
    }

    pub fn cue_ball(&self) -> Option<&Ball> {
        self.ball(CUE_BALL_ID)
    }

    /// Record a capture in the pocket index
    pub fn note_pocketed(&mut self, pocket_id: u32, ball_id: u32) {
        let held = self.pocketed.entry(pocket_id).or_default();
        assert!(!held.contains(&ball_id), "ball {ball_id} captured twice");
        held.push(ball_id);
    }

    /// Every ball stationary, pocketed at rest or out of play
    pub fn is_settled(&self) -> bool {
        self.balls.iter().all(Ball::is_at_rest)
    }

    /// Ids of balls still on the table
    pub fn active_ids(&self) -> Vec<u32> {
        self.balls
            .iter()
            .filter(|b| b.state.is_active())
            .map(|b| b.id)
            .collect()
    }
}

/// Uniformly distributed rotation (Shoemake)
fn random_orientation(rng: &mut Pcg32) -> DQuat {
    use std::f64::consts::TAU;
    let u1: f64 = rng.random();
    let u2: f64 = rng.random();
    let u3: f64 = rng.random();
    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    DQuat::from_xyzw(
        a * (TAU * u2).sin(),
        a * (TAU * u2).cos(),
        b * (TAU * u3).sin(),
        b * (TAU * u3).cos(),
    )
    .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rack() {
        let params = Params::default();
        let state = SimulationState::standard_rack(&params, 7);
        assert_eq!(state.balls.len(), 16);
        assert_eq!(state.balls[0].id, CUE_BALL_ID);
        let ids: Vec<u32> = state.balls.iter().map(|b| b.id).collect();
        assert_eq!(ids, (0..16).collect::<Vec<_>>());

        // No overlaps, apex on the foot spot
        for (i, a) in state.balls.iter().enumerate() {
            for b in &state.balls[i + 1..] {
                assert!((a.pos - b.pos).length() >= a.radius() + b.radius());
            }
        }
        let apex = state.ball(1).unwrap();
        assert!((apex.pos.x - params.table_length / 4.0).abs() < 1e-12);
        assert!(apex.pos.y.abs() < 1e-12);
        assert!(state.is_settled());
    }

    #[test]
    fn test_rack_seed_only_changes_orientation() {
        let params = Params::default();
        let a = SimulationState::standard_rack(&params, 1);
        let b = SimulationState::standard_rack(&params, 1);
        let c = SimulationState::standard_rack(&params, 2);
        assert_eq!(a, b);
        assert_ne!(a.balls[3].orientation, c.balls[3].orientation);
        assert_eq!(a.balls[3].pos, c.balls[3].pos);
        assert!((a.balls[3].orientation.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pairs_exclude_pocketed() {
        let params = Params::default();
        let mut state = SimulationState::standard_rack(&params, 0);
        assert_eq!(state.ball_pairs().len(), 16 * 15 / 2);
        assert_eq!(state.cushion_pairs().len(), 16 * 6);
        assert_eq!(state.pocket_pairs().len(), 16 * 6);

        state.balls[5].capture(3);
        state.note_pocketed(3, state.balls[5].id);
        state.refresh_pairs();
        assert_eq!(state.ball_pairs().len(), 15 * 14 / 2);
        assert!(state.ball_pairs().iter().all(|&(i, j)| i != 5 && j != 5));
        assert!(state.cushion_pairs().iter().all(|&(i, _)| i != 5));
        assert!(state.pocket_pairs().iter().all(|&(i, _)| i != 5));
        assert_eq!(state.pocketed.get(&3), Some(&vec![5]));
        assert_eq!(state.active_ids().len(), 15);
    }

    #[test]
    fn test_new_indexes_pocketed_balls() {
        let params = Params::default();
        let table = Table::standard(&params);
        let mut ball = Ball::new(4, 0.0, 0.0, params.ball_radius, params.ball_mass);
        ball.capture(1);
        let state = SimulationState::new(table, vec![ball]);
        assert_eq!(state.pocketed.get(&1), Some(&vec![4]));
        assert!(state.ball_pairs().is_empty());
    }
}
