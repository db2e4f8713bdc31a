use super::{locomotion_exit, StateCx, StateId, StatePolicy, StateTraits};

/// Hit reaction. Leaves only once hitstun is over and no launch is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stunned {
    recovered: bool,
}

impl Stunned {
    /// Whether the stun has run out.
    #[must_use]
    pub fn recovered(&self) -> bool {
        self.recovered
    }
}

impl StatePolicy for Stunned {
    fn id(&self) -> StateId {
        StateId::Stunned
    }

    fn traits(&self) -> StateTraits {
        StateTraits {
            can_be_interrupted: false,
            priority: 4,
            allows_movement: false,
            allows_rotation: false,
        }
    }

    fn on_enter(&mut self, _previous: StateId, cx: &mut StateCx<'_, '_>) {
        self.recovered = false;
        cx.input.clear();
        cx.animate("stunned");
    }

    fn on_physics_process(&mut self, _dt: f32, cx: &mut StateCx<'_, '_>) {
        let status = &cx.actor.status;
        if status.in_hitstun() || status.pending_launch.is_some() {
            return;
        }
        self.recovered = true;
        let exit = locomotion_exit(cx.actor);
        cx.request(exit);
    }

    fn can_transition_to(&self, target: StateId) -> bool {
        match target {
            StateId::Dead | StateId::Stunned => true,
            StateId::Idle | StateId::Moving | StateId::Airborne => self.recovered,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::input::InputBuffer;
    use crate::physics::FlatWorld;
    use crate::timer::TimerKind;
    use crate::tuning::CombatTuning;

    #[test]
    fn test_holds_until_hitstun_ends() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor();
        actor.status.timers.start(TimerKind::Hitstun, 0.3);
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        let mut stunned = Stunned::default();
        stunned.on_enter(StateId::Idle, &mut cx);
        stunned.on_physics_process(1.0 / 60.0, &mut cx);
        assert!(cx.pending().is_none());
        assert!(!stunned.can_transition_to(StateId::Idle));
        assert!(stunned.can_transition_to(StateId::Dead));

        cx.actor.status.timers.cancel(TimerKind::Hitstun);
        stunned.on_physics_process(1.0 / 60.0, &mut cx);
        assert_eq!(cx.pending().map(|t| t.target), Some(StateId::Idle));
        assert!(stunned.recovered());
    }
}
