//! Hit timing: hitlag, hitstun, knockback.
//!
//! Ordering on a landed hit:
//! 1. the attacker freezes for the hitlag,
//! 2. the target's hitstun starts at once and outlasts the launch,
//! 3. the target's knockback launches when the hitlag ends.
//!
//! Each delayed step is tied to a timer activation; when a newer hit restarts
//! the timer, the older step finds its activation stale and does nothing.

use glam::Vec3;
use tracing::trace;

use crate::entity::{Actor, PendingLaunch};
use crate::timer::{Expired, TimerKind};
use crate::tuning::CombatTuning;

/// Timing values for one landed hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTiming {
    /// Attacker freeze, also the launch delay (seconds)
    pub hitlag: f32,
    /// Target stun (seconds)
    pub hitstun: f32,
    /// Knockback velocity
    pub knockback: Vec3,
}

/// Drives hit timing on actors.
#[derive(Debug, Clone, Copy)]
pub struct Choreography<'a> {
    tuning: &'a CombatTuning,
}

impl<'a> Choreography<'a> {
    /// Creates a choreography over `tuning`.
    #[must_use]
    pub fn new(tuning: &'a CombatTuning) -> Self {
        Self { tuning }
    }

    /// Freezes the attacker in place. A new hit restarts the freeze instead of
    /// extending it.
    pub fn freeze_attacker(&self, attacker: &mut Actor, hitlag: f32) {
        if hitlag <= 0.0 {
            return;
        }
        if attacker.status.frozen_velocity.is_none() {
            attacker.status.frozen_velocity = Some(attacker.body.velocity);
        }
        attacker.body.velocity = Vec3::ZERO;
        attacker.status.timers.start(TimerKind::Hitlag, hitlag);
    }

    /// Starts the target's hitstun and schedules its knockback.
    ///
    /// A target already displaced by an earlier hit accumulates the new
    /// knockback with diminishing returns.
    pub fn strike_target(&self, target: &mut Actor, timing: HitTiming) {
        let t = self.tuning;
        let was_displaced = target.is_displaced();

        if timing.hitstun > 0.0 {
            target.status.timers.start(TimerKind::Hitstun, timing.hitstun);
        }

        if timing.knockback.length_squared() <= f32::EPSILON {
            return;
        }

        let launch = if was_displaced {
            target.status.juggle += 1;
            let existing = target
                .status
                .pending_launch
                .map_or(target.body.velocity, |p| p.velocity);
            let steps = i32::try_from(target.status.juggle.saturating_sub(1)).unwrap_or(i32::MAX);
            let decay = t.juggle_decay.powi(steps);
            existing + timing.knockback * decay
        } else {
            target.status.juggle = 1;
            timing.knockback
        }
        .clamp_length_max(t.max_knockback);

        if timing.hitlag > 0.0 {
            let activation = target.status.timers.start(TimerKind::Launch, timing.hitlag);
            target.status.pending_launch = Some(PendingLaunch {
                activation,
                velocity: launch,
            });
        } else {
            target.status.timers.cancel(TimerKind::Launch);
            target.status.pending_launch = None;
            self.launch(target, launch);
        }
    }

    fn launch(&self, target: &mut Actor, velocity: Vec3) {
        // A target frozen in its own hitlag resumes into the launch.
        if target.status.frozen_velocity.is_some() {
            target.status.frozen_velocity = Some(velocity);
        } else {
            target.body.velocity = velocity;
        }
        if velocity.y > 0.0 {
            target.body.grounded = false;
        }
        target
            .status
            .timers
            .start(TimerKind::Knockback, self.tuning.knockback_duration);
        trace!(entity = %target.id, ?velocity, "knockback launched");
    }

    /// Advances the actor's timers and runs whatever came due.
    pub fn tick(&self, actor: &mut Actor, dt: f32) -> Vec<Expired> {
        let expired = actor.status.timers.advance(dt);

        for e in &expired {
            match e.kind {
                TimerKind::Hitlag => {
                    if let Some(velocity) = actor.status.frozen_velocity.take() {
                        actor.body.velocity = velocity;
                    }
                }
                TimerKind::Launch => match actor.status.pending_launch {
                    Some(pending) if pending.activation == e.activation => {
                        actor.status.pending_launch = None;
                        self.launch(actor, pending.velocity);
                    }
                    _ => trace!(entity = %actor.id, "stale launch ignored"),
                },
                TimerKind::Slow => actor.status.slow_factor = 1.0,
                TimerKind::Hitstun | TimerKind::Knockback => {}
            }
        }

        if actor.body.grounded && !actor.status.in_knockback() && !actor.status.in_hitstun() {
            actor.status.juggle = 0;
        }

        expired
    }
}
