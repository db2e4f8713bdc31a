use glam::Vec3;

use super::{attack_transition, locomotion_exit, StateCx, StateId, StatePolicy, StateTraits};
use crate::events::Notification;
use crate::input::InputAction;

const DASH_OPACITY: f32 = 0.6;

/// Fixed-length dodge burst. Stamina was checked when the state was built and
/// is spent exactly once on entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Dash {
    direction: Vec3,
    elapsed: f32,
    finished: bool,
}

impl Dash {
    /// A dash along `direction` (unit, ground plane).
    #[must_use]
    pub fn new(direction: Vec3) -> Self {
        Self {
            direction,
            elapsed: 0.0,
            finished: false,
        }
    }

    /// Dash direction.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }
}

impl StatePolicy for Dash {
    fn id(&self) -> StateId {
        StateId::Dash
    }

    fn traits(&self) -> StateTraits {
        StateTraits {
            can_be_interrupted: false,
            priority: 2,
            allows_movement: false,
            allows_rotation: false,
        }
    }

    fn on_enter(&mut self, _previous: StateId, cx: &mut StateCx<'_, '_>) {
        let t = cx.tuning();
        cx.actor
            .vitals
            .spend_stamina(t.dash_stamina_cost, t.stamina_regen_delay);

        let speed = t.dash_speed;
        cx.actor.body.velocity.x = self.direction.x * speed;
        cx.actor.body.velocity.z = self.direction.z * speed;
        cx.actor.body.face(self.direction);

        let entity = cx.actor.id;
        cx.notify(Notification::Opacity {
            entity,
            alpha: DASH_OPACITY,
        });
        cx.animate("dash");
    }

    fn on_physics_process(&mut self, dt: f32, cx: &mut StateCx<'_, '_>) {
        let t = cx.tuning();
        self.elapsed += dt;

        // Attack-cancel: the consumed press is gone before the attack state
        // ever looks at the buffer.
        if cx.input.consume(InputAction::Attack) {
            self.finished = true;
            let attack = attack_transition(cx.actor, 0);
            cx.request(attack);
            return;
        }

        if self.elapsed >= t.dash_duration {
            self.finished = true;
            let exit = locomotion_exit(cx.actor);
            cx.request(exit);
            return;
        }

        cx.actor.body.velocity.x = self.direction.x * t.dash_speed;
        cx.actor.body.velocity.z = self.direction.z * t.dash_speed;
    }

    fn on_exit(&mut self, _next: StateId, cx: &mut StateCx<'_, '_>) {
        let entity = cx.actor.id;
        cx.notify(Notification::Opacity { entity, alpha: 1.0 });
    }

    fn can_transition_to(&self, target: StateId) -> bool {
        match target {
            StateId::MeleeAttack | StateId::RangedAttack | StateId::Stunned | StateId::Dead => true,
            StateId::Idle | StateId::Moving | StateId::Airborne => self.finished,
            StateId::Dash | StateId::Block => false,
        }
    }

    fn drives_velocity(&self) -> bool {
        true
    }
}
