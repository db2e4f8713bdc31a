use super::{
    face_movement, ground_steer, has_movement, read_combat_input, EnterParams, StateCx, StateId,
    StatePolicy, StateTraits, Transition,
};

/// Walking or running on the ground.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Moving;

impl StatePolicy for Moving {
    fn id(&self) -> StateId {
        StateId::Moving
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
        cx.animate("run");
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

        let tuning = cx.tuning();
        ground_steer(cx.actor, tuning, dt);
        face_movement(cx.actor);

        if !has_movement(cx.actor) {
            cx.request(Transition::to(StateId::Idle));
        }
    }
}
