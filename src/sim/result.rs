//! Run outcome accumulator
//!
//! Append-only record of what happened during one or more steps. Partial
//! results from consecutive calls merge with `combine`.

use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::ball::{Ball, BallSnapshot, CUE_BALL_ID, MotionState};

/// Discriminant of a collision log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionKind {
    BallBall,
    BallCushion,
    BallPocket,
}

/// One entry of the collision log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Collision {
    BallBall {
        time: f64,
        a: u32,
        b: u32,
        /// Contact point
        position: DVec3,
        /// Normal impulse magnitude (N·s)
        impulse: f64,
        before: [BallSnapshot; 2],
        after: [BallSnapshot; 2],
    },
    BallCushion {
        time: f64,
        ball: u32,
        cushion: u32,
        position: DVec3,
        impulse: f64,
        before: BallSnapshot,
        after: BallSnapshot,
    },
    BallPocket {
        time: f64,
        ball: u32,
        pocket: u32,
        position: DVec3,
        before: BallSnapshot,
        after: BallSnapshot,
    },
}

impl Collision {
    pub fn kind(&self) -> CollisionKind {
        match self {
            Collision::BallBall { .. } => CollisionKind::BallBall,
            Collision::BallCushion { .. } => CollisionKind::BallCushion,
            Collision::BallPocket { .. } => CollisionKind::BallPocket,
        }
    }

    pub fn time(&self) -> f64 {
        match self {
            Collision::BallBall { time, .. }
            | Collision::BallCushion { time, .. }
            | Collision::BallPocket { time, .. } => *time,
        }
    }

    pub fn impulse(&self) -> f64 {
        match self {
            Collision::BallBall { impulse, .. } | Collision::BallCushion { impulse, .. } => *impulse,
            Collision::BallPocket { .. } => 0.0,
        }
    }

    pub fn involves(&self, id: u32) -> bool {
        match self {
            Collision::BallBall { a, b, .. } => *a == id || *b == id,
            Collision::BallCushion { ball, .. } | Collision::BallPocket { ball, .. } => *ball == id,
        }
    }
}

/// Sampled ball position for path playback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingPoint {
    pub time: f64,
    pub pos: DVec3,
    pub state: MotionState,
}

/// Accumulated outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimResult {
    /// Ticks taken
    pub steps: u64,
    /// Event substeps taken across all ticks
    pub substeps: u64,
    /// Simulated seconds covered
    pub elapsed: f64,
    /// In temporal order
    pub collisions: Vec<Collision>,
    pub balls_potted: Vec<u32>,
    pub balls_ejected: Vec<u32>,
    pub tracking: BTreeMap<u32, Vec<TrackingPoint>>,
    /// First object ball the cue ball touched
    pub first_struck: Option<u32>,
    /// Cue ball potted or ejected
    pub scratch: bool,
    /// Iteration cap reached before the table settled
    pub capped: bool,
}

impl SimResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, collision: Collision) {
        if self.first_struck.is_none() {
            if let Collision::BallBall { a, b, .. } = collision {
                if a == CUE_BALL_ID {
                    self.first_struck = Some(b);
                } else if b == CUE_BALL_ID {
                    self.first_struck = Some(a);
                }
            }
        }
        self.collisions.push(collision);
    }

    pub fn record_potted(&mut self, id: u32) {
        if !self.balls_potted.contains(&id) {
            self.balls_potted.push(id);
        }
        if id == CUE_BALL_ID {
            self.scratch = true;
        }
    }

    pub fn record_ejected(&mut self, id: u32) {
        if !self.balls_ejected.contains(&id) {
            self.balls_ejected.push(id);
        }
        if id == CUE_BALL_ID {
            self.scratch = true;
        }
    }

    pub fn track(&mut self, ball: &Ball, time: f64) {
        self.tracking.entry(ball.id).or_default().push(TrackingPoint {
            time,
            pos: ball.pos,
            state: ball.state,
        });
    }

    pub fn count(&self, kind: CollisionKind) -> usize {
        self.collisions.iter().filter(|c| c.kind() == kind).count()
    }

    /// Last tracked position per ball
    pub fn final_positions(&self) -> BTreeMap<u32, DVec3> {
        self.tracking
            .iter()
            .filter_map(|(id, points)| points.last().map(|p| (*id, p.pos)))
            .collect()
    }

    /// Merge a later partial result into this one
    ///
    /// Counters add up, logs concatenate in order, id lists union, and a
    /// derived fact already known here wins over the later one.
    pub fn combine(&mut self, other: SimResult) {
        self.steps += other.steps;
        self.substeps += other.substeps;
        self.elapsed += other.elapsed;
        self.collisions.extend(other.collisions);
        for id in other.balls_potted {
            if !self.balls_potted.contains(&id) {
                self.balls_potted.push(id);
            }
        }
        for id in other.balls_ejected {
            if !self.balls_ejected.contains(&id) {
                self.balls_ejected.push(id);
            }
        }
        for (id, points) in other.tracking {
            self.tracking.entry(id).or_default().extend(points);
        }
        self.first_struck = self.first_struck.or(other.first_struck);
        self.scratch |= other.scratch;
        self.capped |= other.capped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn snap(id: u32) -> BallSnapshot {
        BallSnapshot {
            id,
            pos: DVec3::ZERO,
            vel: DVec3::ZERO,
            spin: DVec3::ZERO,
            state: MotionState::Sliding,
        }
    }

    fn hit(time: f64, a: u32, b: u32) -> Collision {
        Collision::BallBall {
            time,
            a,
            b,
            position: DVec3::ZERO,
            impulse: 1.0,
            before: [snap(a), snap(b)],
            after: [snap(a), snap(b)],
        }
    }

    fn cushion(time: f64, ball: u32) -> Collision {
        Collision::BallCushion {
            time,
            ball,
            cushion: 0,
            position: DVec3::ZERO,
            impulse: 0.5,
            before: snap(ball),
            after: snap(ball),
        }
    }

    #[test]
    fn test_first_struck_from_first_cue_contact() {
        let mut r = SimResult::new();
        r.record(hit(0.1, 3, 4));
        assert_eq!(r.first_struck, None);
        r.record(hit(0.2, 7, CUE_BALL_ID));
        r.record(hit(0.3, CUE_BALL_ID, 2));
        assert_eq!(r.first_struck, Some(7));
        assert_eq!(r.count(CollisionKind::BallBall), 3);
    }

    #[test]
    fn test_scratch() {
        let mut r = SimResult::new();
        r.record_potted(5);
        assert!(!r.scratch);
        r.record_ejected(CUE_BALL_ID);
        assert!(r.scratch);
        r.record_potted(5);
        assert_eq!(r.balls_potted, vec![5]);
    }

    #[test]
    fn test_combine_keeps_order_and_earliest_fact() {
        let mut first = SimResult::new();
        first.steps = 3;
        first.record(cushion(0.1, 0));
        first.record(hit(0.2, CUE_BALL_ID, 9));
        first.record_potted(9);

        let mut second = SimResult::new();
        second.steps = 2;
        second.record(hit(0.3, CUE_BALL_ID, 4));
        second.record_potted(4);
        second.record_potted(9);
        second.capped = true;

        first.combine(second);
        assert_eq!(first.steps, 5);
        let times: Vec<f64> = first.collisions.iter().map(Collision::time).collect();
        assert_eq!(times, vec![0.1, 0.2, 0.3]);
        assert_eq!(first.first_struck, Some(9));
        assert_eq!(first.balls_potted, vec![9, 4]);
        assert!(first.capped);

        // An empty earlier result takes the later fact
        let mut empty = SimResult::new();
        let mut later = SimResult::new();
        later.record(hit(1.0, 6, CUE_BALL_ID));
        empty.combine(later);
        assert_eq!(empty.first_struck, Some(6));
    }

    #[test]
    fn test_serde_tags_collision_kind() {
        let json = serde_json::to_string(&cushion(0.5, 2)).unwrap();
        assert!(json.contains("\"kind\":\"ball_cushion\""));
        let back: Collision = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), CollisionKind::BallCushion);
        assert!(back.involves(2));
    }

    proptest! {
        #[test]
        fn potted_union_is_order_independent(
            a in proptest::collection::vec(0u32..16, 0..8),
            b in proptest::collection::vec(0u32..16, 0..8),
        ) {
            let build = |ids: &[u32]| {
                let mut r = SimResult::new();
                for id in ids {
                    r.record_potted(*id);
                }
                r
            };
            let mut ab = build(&a);
            ab.combine(build(&b));
            let mut ba = build(&b);
            ba.combine(build(&a));

            let set_ab: BTreeSet<u32> = ab.balls_potted.iter().copied().collect();
            let set_ba: BTreeSet<u32> = ba.balls_potted.iter().copied().collect();
            prop_assert_eq!(&set_ab, &set_ba);
            prop_assert_eq!(set_ab.len(), ab.balls_potted.len());
        }
    }
}
