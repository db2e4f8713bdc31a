use super::{dodge_transition, locomotion_exit, StateCx, StateId, StatePolicy, StateTraits};
use crate::block::BlockState;

/// Guard raised. The [`BlockState`] exists exactly as long as this state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Block;

impl StatePolicy for Block {
    fn id(&self) -> StateId {
        StateId::Block
    }

    fn traits(&self) -> StateTraits {
        StateTraits {
            can_be_interrupted: true,
            priority: 1,
            allows_movement: false,
            allows_rotation: true,
        }
    }

    fn on_enter(&mut self, _previous: StateId, cx: &mut StateCx<'_, '_>) {
        cx.actor.block = Some(BlockState::raise(cx.env.now, cx.env.tuning.parry_window));
        cx.animate("block");
    }

    fn on_physics_process(&mut self, _dt: f32, cx: &mut StateCx<'_, '_>) {
        if let Some(dash) = dodge_transition(cx) {
            cx.request(dash);
            return;
        }
        if !cx.actor.controls.block_held || !cx.actor.body.grounded {
            let exit = locomotion_exit(cx.actor);
            cx.request(exit);
        }
    }

    fn on_exit(&mut self, _next: StateId, cx: &mut StateCx<'_, '_>) {
        cx.actor.block = None;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::input::InputBuffer;
    use crate::physics::FlatWorld;
    use crate::tuning::CombatTuning;

    #[test]
    fn test_block_state_lifecycle() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 4.0);
        let mut actor = actor();
        actor.controls.block_held = true;
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        let mut block = Block;
        block.on_enter(StateId::Idle, &mut cx);
        let raised = cx.actor.block.expect("block raised");
        assert!((raised.raised_at - 4.0).abs() < f64::EPSILON);

        block.on_physics_process(1.0 / 60.0, &mut cx);
        assert!(cx.pending().is_none());

        cx.actor.controls.block_held = false;
        block.on_physics_process(1.0 / 60.0, &mut cx);
        assert_eq!(cx.pending().map(|t| t.target), Some(StateId::Idle));

        block.on_exit(StateId::Idle, &mut cx);
        assert!(cx.actor.block.is_none());
    }
}
