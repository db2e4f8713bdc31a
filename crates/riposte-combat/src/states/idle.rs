use super::{
    ground_steer, has_movement, read_combat_input, EnterParams, StateCx, StateId, StatePolicy,
    StateTraits, Transition,
};

/// Standing still.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Idle;

impl StatePolicy for Idle {
    fn id(&self) -> StateId {
        StateId::Idle
    }

    fn traits(&self) -> StateTraits {
        StateTraits {
            can_be_interrupted: true,
            priority: 0,
            allows_movement: true,
            allows_rotation: true,
        }
    }

    fn on_enter(&mut self, _previous: StateId, cx: &mut StateCx<'_, '_>) {
        cx.animate("idle");
    }

    fn on_physics_process(&mut self, dt: f32, cx: &mut StateCx<'_, '_>) {
        if let Some(transition) = read_combat_input(cx) {
            cx.request(transition);
            return;
        }

        if !cx.actor.body.grounded {
            cx.request(Transition::with(StateId::Airborne, EnterParams::Fall));
            return;
        }

        // Zero input: steering toward rest doubles as idle friction.
        let tuning = cx.tuning();
        ground_steer(cx.actor, tuning, dt);

        if has_movement(cx.actor) {
            cx.request(Transition::to(StateId::Moving));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::input::InputBuffer;
    use crate::physics::FlatWorld;
    use crate::tuning::CombatTuning;
    use glam::Vec3;

    #[test]
    fn test_movement_requests_moving() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor();
        actor.controls.movement = Vec3::X;
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        Idle.on_physics_process(1.0 / 60.0, &mut cx);
        assert_eq!(cx.pending().map(|t| t.target), Some(StateId::Moving));
    }

    #[test]
    fn test_idle_decelerates() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor();
        actor.body.velocity = Vec3::new(0.5, 0.0, 0.0);
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        Idle.on_physics_process(0.1, &mut cx);
        assert_eq!(cx.actor.body.velocity, Vec3::ZERO);
        assert!(cx.pending().is_none());
    }
}
