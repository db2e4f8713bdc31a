use glam::Vec3;

use super::{face_movement, locomotion_exit, StateCx, StateEffect, StateId, StatePolicy, StateTraits};
use crate::entity::Body;
use crate::weapon::ProjectileProfile;

/// Muzzle height above the feet.
const MUZZLE_HEIGHT: f32 = 1.4;

/// Spawn point and unit direction of a shot fired by `body` in its current pose.
#[must_use]
pub fn muzzle(body: &Body) -> (Vec3, Vec3) {
    let direction = body.forward();
    (body.position + Vec3::Y * MUZZLE_HEIGHT + direction * (body.extents.radius + 0.1), direction)
}

/// Draw, fire once, recover.
#[derive(Debug, Clone, PartialEq)]
pub struct RangedAttack {
    windup: f32,
    recovery: f32,
    projectile: ProjectileProfile,
    elapsed: f32,
    fired: bool,
}

impl RangedAttack {
    /// A shot with the given timings.
    #[must_use]
    pub fn new(windup: f32, recovery: f32, projectile: ProjectileProfile) -> Self {
        Self {
            windup,
            recovery,
            projectile,
            elapsed: 0.0,
            fired: false,
        }
    }

    /// Whether the shot already left.
    #[must_use]
    pub fn fired(&self) -> bool {
        self.fired
    }

    fn done(&self) -> bool {
        self.fired && self.elapsed >= self.windup + self.recovery
    }
}

impl StatePolicy for RangedAttack {
    fn id(&self) -> StateId {
        StateId::RangedAttack
    }

    fn traits(&self) -> StateTraits {
        StateTraits {
            can_be_interrupted: false,
            priority: 2,
            allows_movement: false,
            allows_rotation: !self.fired,
        }
    }

    fn on_enter(&mut self, _previous: StateId, cx: &mut StateCx<'_, '_>) {
        self.elapsed = 0.0;
        self.fired = false;
        face_movement(cx.actor);
        cx.animate("aim");
    }

    fn on_physics_process(&mut self, dt: f32, cx: &mut StateCx<'_, '_>) {
        self.elapsed += dt;

        if !self.fired {
            face_movement(cx.actor);
            if self.elapsed >= self.windup {
                self.fired = true;
                let (origin, direction) = muzzle(&cx.actor.body);
                cx.emit(StateEffect::FireProjectile {
                    origin,
                    direction,
                    profile: self.projectile,
                });
                cx.animate("fire");
            }
            return;
        }

        if self.done() {
            let exit = locomotion_exit(cx.actor);
            cx.request(exit);
        }
    }

    fn can_transition_to(&self, target: StateId) -> bool {
        match target {
            StateId::Stunned | StateId::Dead => true,
            StateId::Dash => self.fired,
            StateId::Idle | StateId::Moving | StateId::Airborne => self.done(),
            StateId::MeleeAttack | StateId::RangedAttack | StateId::Block => false,
        }
    }
}
