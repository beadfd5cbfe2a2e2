//! Sleeping
//!
//! Freezes quiescent bodies so the integrator and solver can skip them.
//!
//! Each body tracks `motion`, a biased moving average of its squared linear
//! and angular speed. Bodies whose motion stays below the threshold for long
//! enough fall asleep: their Verlet state is pinned so they cannot drift,
//! and the broad phase stops pairing them with other inactive bodies. Any
//! applied force wakes a body instantly; a colliding neighbour wakes it once
//! the neighbour is moving hard enough.

use crate::body::{Body, BodyStore};
use crate::common::{BodyId, BASE_DELTA};
use crate::events::{EventName, EventPayload, Events};
use crate::math::Vector;
use crate::pairs::Pair;

/// Motion below this (squared speed units) counts as idle.
const MOTION_SLEEP_THRESHOLD: f64 = 0.08;

/// A colliding neighbour must move at least this hard to wake a sleeper.
const MOTION_WAKE_THRESHOLD: f64 = 0.08;

/// Weight of the smaller sample in the motion average.
const MIN_BIAS: f64 = 0.9;

/// Advance the sleep state of every body by one step.
pub fn update(bodies: &mut BodyStore, ids: &[BodyId], delta: f64, events: &mut Events) {
    let time_scale = delta / BASE_DELTA;

    for &id in ids {
        let Some(body) = bodies.get_mut(id) else {
            continue;
        };

        // applied force wakes the body regardless of motion
        if body.force.x != 0.0 || body.force.y != 0.0 {
            set(body, false, events);
            continue;
        }

        let motion = body.speed * body.speed + body.angular_speed * body.angular_speed;
        let min_motion = body.motion.min(motion);
        let max_motion = body.motion.max(motion);
        body.motion = MIN_BIAS * min_motion + (1.0 - MIN_BIAS) * max_motion;

        if body.sleep_threshold > 0.0 && body.motion < MOTION_SLEEP_THRESHOLD {
            body.sleep_counter += 1;
            if f64::from(body.sleep_counter) >= body.sleep_threshold / time_scale {
                set(body, true, events);
            }
        } else if body.sleep_counter > 0 {
            body.sleep_counter -= 1;
        }
    }
}

/// Wake sleeping bodies that are being pushed by an awake neighbour.
pub fn after_collisions(pairs: &[Pair], bodies: &mut BodyStore, events: &mut Events) {
    for pair in pairs {
        if !pair.is_active {
            continue;
        }
        let collision = &pair.collision;
        let (sleeping_info, moving_motion) = {
            let (Some(parent_a), Some(parent_b)) = (
                bodies.get(collision.parent_a),
                bodies.get(collision.parent_b),
            ) else {
                continue;
            };
            // only pairs where exactly one dynamic body sleeps matter here
            if parent_a.is_static || parent_b.is_static {
                continue;
            }
            if parent_a.is_sleeping == parent_b.is_sleeping {
                continue;
            }
            let (sleeping, moving) = if parent_a.is_sleeping {
                (parent_a, parent_b)
            } else {
                (parent_b, parent_a)
            };
            (sleeping.id, moving.motion)
        };

        if moving_motion > MOTION_WAKE_THRESHOLD {
            if let Some(body) = bodies.get_mut(sleeping_info) {
                set(body, false, events);
            }
        }
    }
}

/// Put a body to sleep or wake it, emitting `sleepStart`/`sleepEnd` on
/// transitions.
///
/// Falling asleep pins the Verlet state (`position_prev`, `angle_prev`) and
/// zeroes every kinematic derivative, so the body holds perfectly still
/// until woken.
pub fn set(body: &mut Body, is_sleeping: bool, events: &mut Events) {
    let was_sleeping = body.is_sleeping;

    if is_sleeping {
        body.is_sleeping = true;
        body.sleep_counter = body.sleep_threshold as u32;

        body.position_impulse = Vector::ZERO;
        body.position_prev = body.position;
        body.angle_prev = body.angle;

        body.velocity = Vector::ZERO;
        body.angular_velocity = 0.0;
        body.speed = 0.0;
        body.angular_speed = 0.0;
        body.motion = 0.0;

        if !was_sleeping {
            events.emit(EventName::SleepStart, &EventPayload::Sleep { body: body.id });
        }
    } else {
        body.is_sleeping = false;
        body.sleep_counter = 0;

        if was_sleeping {
            events.emit(EventName::SleepEnd, &EventPayload::Sleep { body: body.id });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
