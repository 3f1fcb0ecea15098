//! Collision response at an event instant
//!
//! Ball-ball contacts are gathered first and solved together, because a
//! break shot touches several balls at the same moment. Cushions, pockets
//! and table exits follow, in that order, so the cushion pass can undo any
//! push a ball-ball separation gave toward a rail.

use glam::{DVec2, DVec3};

use super::ball::{Ball, BallSnapshot, MotionState};
use super::predict::contact_closing;
use super::result::{Collision, SimResult};
use super::solver::{DenseMatrix, solve};
use super::state::SimulationState;
use super::table::Aabb;
use crate::consts::*;
use crate::params::Params;
use crate::{planar, z_cross};

/// A touching, closing ball pair
#[derive(Debug, Clone, Copy)]
struct Contact {
    /// Ball indices, `a < b`
    a: usize,
    b: usize,
    /// Unit planar normal from a toward b
    normal: DVec3,
    /// Normal relative speed, negative while closing
    closing: f64,
    /// Overlap depth (negative inside the slop band)
    penetration: f64,
}

/// Mutable access to two distinct balls
fn pair_mut(balls: &mut [Ball], i: usize, j: usize) -> (&mut Ball, &mut Ball) {
    assert!(i < j, "ball pair indices out of order");
    let (head, tail) = balls.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}

fn find_ball_contacts(state: &SimulationState) -> Vec<Contact> {
    let mut contacts = Vec::new();
    for &(i, j) in state.ball_pairs() {
        let (a, b) = (&state.balls[i], &state.balls[j]);
        if a.state == MotionState::Airborne || b.state == MotionState::Airborne {
            continue;
        }
        let Some((normal, closing)) = contact_closing(a, b) else {
            continue;
        };
        // Slower than this is persistent contact, not a collision
        if closing > -RESTING_EPSILON {
            continue;
        }
        contacts.push(Contact {
            a: i,
            b: j,
            normal,
            closing,
            penetration: penetration(a, b),
        });
    }
    contacts
}

/// Overlap depth of two balls, negative when apart
fn penetration(a: &Ball, b: &Ball) -> f64 {
    a.radius() + b.radius() - planar(b.pos - a.pos).length()
}

/// +1 when ball `x` is the b side of `contact`, -1 for the a side
fn side(x: usize, contact: &Contact) -> f64 {
    if x == contact.b {
        1.0
    } else if x == contact.a {
        -1.0
    } else {
        0.0
    }
}

/// Normal impulses for all contacts at once
///
/// Row i asks the normal relative velocity of contact i to end at
/// `-e * closing_i`; column k is what a unit impulse on contact k does to it.
fn normal_impulses(balls: &[Ball], contacts: &[Contact], restitution: f64) -> Vec<f64> {
    let n = contacts.len();
    let mut a = DenseMatrix::zeros(n);
    let mut rhs = Vec::with_capacity(n);
    for (i, ci) in contacts.iter().enumerate() {
        let inv_a = balls[ci.a].inv_mass();
        let inv_b = balls[ci.b].inv_mass();
        for (k, ck) in contacts.iter().enumerate() {
            let coupling = side(ci.b, ck) * inv_b - side(ci.a, ck) * inv_a;
            if coupling != 0.0 {
                a.set(i, k, ci.normal.dot(ck.normal) * coupling);
            }
        }
        rhs.push(-(1.0 + restitution) * ci.closing);
    }

    let solved = solve(a, rhs).unwrap_or_else(|| {
        log::debug!("contact system of {n} is singular, resolving pairs independently");
        contacts
            .iter()
            .map(|c| {
                let inv = balls[c.a].inv_mass() + balls[c.b].inv_mass();
                -(1.0 + restitution) * c.closing / inv
            })
            .collect()
    });
    solved.into_iter().map(|j| j.max(0.0)).collect()
}

/// Push the pair apart along the normal, split by inverse mass
fn separate(a: &mut Ball, b: &mut Ball, contact: &Contact) {
    if contact.penetration <= 0.0 {
        return;
    }
    let inv_a = a.inv_mass();
    let inv_b = b.inv_mass();
    let shift = contact.penetration * SEPARATION_FRACTION / (inv_a + inv_b);
    a.pos -= contact.normal * (shift * inv_a);
    b.pos += contact.normal * (shift * inv_b);
}

/// Accumulated, Coulomb-clamped tangential impulses at each contact
///
/// The impulse on ball a opposes the slip of its contact point against b's
/// and changes both linear and angular velocity of each ball.
fn friction_pass(balls: &mut [Ball], contacts: &[Contact], impulses: &[f64], mu: f64) {
    let mut accumulated = vec![DVec3::ZERO; contacts.len()];
    for _ in 0..FRICTION_ITERATIONS {
        for (k, contact) in contacts.iter().enumerate() {
            let limit = mu * impulses[k];
            if limit <= 0.0 {
                continue;
            }
            let (a, b) = pair_mut(balls, contact.a, contact.b);
            let n = contact.normal;
            let ra = n * a.radius();
            let rb = -n * b.radius();
            let slip = (a.vel + a.spin.cross(ra)) - (b.vel + b.spin.cross(rb));
            let tangential = planar(slip - n * slip.dot(n));
            let speed = tangential.length();
            if speed < TANGENT_EPSILON {
                continue;
            }

            let k_t = 3.5 * (a.inv_mass() + b.inv_mass());
            let target = accumulated[k] - tangential / k_t;
            let clamped = target.clamp_length_max(limit);
            let delta = clamped - accumulated[k];
            accumulated[k] = clamped;

            a.vel += delta * a.inv_mass();
            a.spin += ra.cross(delta) / a.inertia();
            b.vel -= delta * b.inv_mass();
            b.spin += rb.cross(-delta) / b.inertia();
        }
    }
}

/// Resolve every closing ball-ball contact simultaneously
///
/// Returns the number of collisions recorded.
pub fn resolve_ball_contacts(
    state: &mut SimulationState,
    params: &Params,
    result: &mut SimResult,
) -> usize {
    let contacts = find_ball_contacts(state);
    if contacts.is_empty() {
        return 0;
    }

    let before: Vec<[BallSnapshot; 2]> = contacts
        .iter()
        .map(|c| [state.balls[c.a].snapshot(), state.balls[c.b].snapshot()])
        .collect();
    let impulses = normal_impulses(&state.balls, &contacts, params.ball_restitution);

    for (contact, &j) in contacts.iter().zip(&impulses) {
        let (a, b) = pair_mut(&mut state.balls, contact.a, contact.b);
        if j > 0.0 {
            let p = contact.normal * j;
            a.vel -= p * a.inv_mass();
            b.vel += p * b.inv_mass();
        }
        separate(a, b, contact);
    }

    friction_pass(&mut state.balls, &contacts, &impulses, params.ball_friction);

    for contact in &contacts {
        let (a, b) = pair_mut(&mut state.balls, contact.a, contact.b);
        a.refresh_state();
        b.refresh_state();
    }

    let mut recorded = 0;
    for ((contact, &j), before) in contacts.iter().zip(&impulses).zip(before) {
        if j <= 0.0 {
            continue;
        }
        let a = &state.balls[contact.a];
        let b = &state.balls[contact.b];
        log::debug!("t={:.5} ball {} hit ball {} (j={:.4})", state.time, a.id, b.id, j);
        result.record(Collision::BallBall {
            time: state.time,
            a: a.id,
            b: b.id,
            position: a.pos + contact.normal * a.radius(),
            impulse: j,
            before,
            after: [a.snapshot(), b.snapshot()],
        });
        recorded += 1;
    }
    recorded
}

/// Keep pairs in persistent contact from sinking into each other
///
/// Runs once at the end of a step. Each touching pair closing slower than
/// `RESTING_EPSILON` gets a plastic normal impulse and its overlap removed.
/// Nothing is logged. Returns the number of pairs held.
pub fn hold_persistent_contacts(state: &mut SimulationState) -> usize {
    let mut held = 0;
    let pairs = state.ball_pairs().to_vec();
    for (i, j) in pairs {
        let (a, b) = pair_mut(&mut state.balls, i, j);
        if a.state == MotionState::Airborne || b.state == MotionState::Airborne {
            continue;
        }
        let Some((normal, closing)) = contact_closing(a, b) else {
            continue;
        };
        if closing >= -CLOSING_EPSILON || closing <= -RESTING_EPSILON {
            continue;
        }

        let impulse = -closing / (a.inv_mass() + b.inv_mass());
        let p = normal * impulse;
        a.vel -= p * a.inv_mass();
        b.vel += p * b.inv_mass();
        let contact = Contact {
            a: i,
            b: j,
            normal,
            closing,
            penetration: penetration(a, b),
        };
        separate(a, b, &contact);
        a.refresh_state();
        b.refresh_state();
        held += 1;
    }
    held
}

/// Push balls out of cushions and bounce the closing ones
///
/// Returns the number of collisions recorded.
pub fn resolve_cushion_contacts(
    state: &mut SimulationState,
    params: &Params,
    result: &mut SimResult,
) -> usize {
    let mut recorded = 0;
    let pairs = state.cushion_pairs().to_vec();
    for (i, c) in pairs {
        let cushion = &state.table.cushions[c];
        let ball = &mut state.balls[i];
        if !ball.state.is_active() {
            continue;
        }
        if ball.state == MotionState::Airborne && ball.pos.z > params.rail_height {
            continue;
        }

        let r = ball.radius();
        let reach = r + CONTACT_SLOP;
        let p = ball.pos.truncate();
        if !Aabb::swept(p, p, reach).overlaps(&cushion.bounds) {
            continue;
        }
        let hit = cushion.closest_boundary(p);
        if hit.distance > reach || hit.normal == DVec2::ZERO {
            continue;
        }

        let before = ball.snapshot();
        let n = hit.normal;
        let penetration = r - hit.distance;
        if penetration > 0.0 {
            let shift = n * penetration;
            ball.pos.x += shift.x;
            ball.pos.y += shift.y;
        }

        let vn = ball.vel.truncate().dot(n);
        if vn >= -CLOSING_EPSILON {
            continue;
        }
        let n3 = n.extend(0.0);
        ball.vel -= n3 * ((1.0 + cushion.restitution) * vn);
        ball.vel += z_cross(n3) * (cushion.friction * r * ball.spin.z);
        ball.spin.z *= CUSHION_SPIN_RETENTION;
        ball.refresh_state();

        let impulse = -(1.0 + cushion.restitution) * vn * ball.mass();
        log::debug!("t={:.5} ball {} hit cushion {} (j={:.4})", state.time, ball.id, cushion.id, impulse);
        result.record(Collision::BallCushion {
            time: state.time,
            ball: ball.id,
            cushion: cushion.id,
            position: hit.point.extend(ball.pos.z),
            impulse,
            before,
            after: ball.snapshot(),
        });
        recorded += 1;
    }
    recorded
}

/// Capture balls whose centre reaches a pocket at or below rail height
///
/// Returns the number of balls captured.
pub fn resolve_pocket_captures(
    state: &mut SimulationState,
    params: &Params,
    result: &mut SimResult,
) -> usize {
    let mut captured = Vec::new();
    let pairs = state.pocket_pairs().to_vec();
    for (i, p) in pairs {
        let pocket = state.table.pockets[p];
        let ball = &mut state.balls[i];
        if !ball.state.is_active() || ball.pos.z > params.rail_height {
            continue;
        }
        if pocket.distance_to(ball.pos) > pocket.radius + CONTACT_SLOP {
            continue;
        }

        let before = ball.snapshot();
        ball.capture(pocket.id);
        log::debug!("t={:.5} ball {} potted in pocket {}", state.time, ball.id, pocket.id);
        result.record(Collision::BallPocket {
            time: state.time,
            ball: ball.id,
            pocket: pocket.id,
            position: ball.pos,
            before,
            after: ball.snapshot(),
        });
        result.record_potted(ball.id);
        captured.push((pocket.id, ball.id));
    }

    for &(pocket_id, ball_id) in &captured {
        state.note_pocketed(pocket_id, ball_id);
    }
    if !captured.is_empty() {
        state.refresh_pairs();
    }
    captured.len()
}

/// Take balls whose centre left the table footprint out of play
pub fn resolve_out_of_bounds(state: &mut SimulationState, result: &mut SimResult) -> usize {
    let mut ejected = 0;
    for ball in &mut state.balls {
        if !ball.state.is_active() || !state.table.is_outside(ball.pos) {
            continue;
        }
        log::debug!("t={:.5} ball {} left the table at {:?}", state.time, ball.id, ball.pos);
        ball.eject();
        result.record_ejected(ball.id);
        ejected += 1;
    }
    if ejected > 0 {
        state.refresh_pairs();
    }
    ejected
}

/// One full resolution pass at the current instant
///
/// Returns true when the set of balls in play changed.
pub fn resolve_all(state: &mut SimulationState, params: &Params, result: &mut SimResult) -> bool {
    resolve_ball_contacts(state, params, result);
    resolve_cushion_contacts(state, params, result);
    let potted = resolve_pocket_captures(state, params, result);
    let ejected = resolve_out_of_bounds(state, result);
    potted + ejected > 0
}
