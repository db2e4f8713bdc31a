//! Per-entity state machine.
//!
//! Owns the single active [`ActionState`], the entity's input buffer and the
//! effects its states produced. A transition is atomic: exit the old state,
//! swap, enter the new one. Nothing outside the machine can observe the gap.

use std::mem;
use tracing::{debug, trace};

use crate::entity::Actor;
use crate::events::Notification;
use crate::input::{InputAction, InputBuffer, InputData};
use crate::states::{
    apply_friction, ActionState, MachineEnv, StateCx, StateEffect, StateId, Transition,
};

/// Drives one entity's action states.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: ActionState,
    input: InputBuffer,
    effects: Vec<StateEffect>,
}

impl StateMachine {
    /// A machine in the idle state.
    #[must_use]
    pub fn new(input_capacity: usize) -> Self {
        Self {
            current: ActionState::default(),
            input: InputBuffer::new(input_capacity),
            effects: Vec::new(),
        }
    }

    /// Name of the active state.
    #[must_use]
    pub fn current(&self) -> StateId {
        self.current.id()
    }

    /// The active state.
    #[must_use]
    pub fn state(&self) -> &ActionState {
        &self.current
    }

    /// Changes state without entry data. See [`StateMachine::transition`].
    pub fn change_state(
        &mut self,
        actor: &mut Actor,
        env: &MachineEnv<'_>,
        target: StateId,
        force: bool,
    ) -> bool {
        self.transition(actor, env, Transition::to(target), force)
    }

    /// Changes state.
    ///
    /// Legal when `force` is set, when the active state is interruptible, or
    /// when it explicitly allows `target`. Dead only yields to `force`. The
    /// target state may still refuse entry (no stamina, no weapon); either
    /// way a refusal changes nothing.
    pub fn transition(
        &mut self,
        actor: &mut Actor,
        env: &MachineEnv<'_>,
        transition: Transition,
        force: bool,
    ) -> bool {
        let from = self.current.id();
        let policy = self.current.policy();
        let legal = force
            || (from != StateId::Dead
                && (policy.traits().can_be_interrupted || policy.can_transition_to(transition.target)));
        if !legal {
            trace!(entity = %actor.id, %from, to = %transition.target, "transition not allowed");
            return false;
        }

        let Some(next) = ActionState::build(&transition, actor, env.tuning) else {
            debug!(entity = %actor.id, %from, to = %transition.target, "state refused entry");
            return false;
        };
        let to = next.id();

        {
            let mut cx = StateCx::new(env, actor, &mut self.input, &mut self.effects);
            self.current.policy_mut().on_exit(to, &mut cx);
        }
        let _previous = mem::replace(&mut self.current, next);
        {
            let mut cx = StateCx::new(env, actor, &mut self.input, &mut self.effects);
            self.current.policy_mut().on_enter(from, &mut cx);
        }

        self.effects.push(StateEffect::Notify(Notification::StateChanged {
            entity: actor.id,
            from,
            to,
        }));
        debug!(entity = %actor.id, %from, %to, forced = force, "state changed");
        true
    }

    /// Runs one simulation tick: the state's logic, at most one transition,
    /// then gravity and friction the state leaves to the machine.
    pub fn tick(&mut self, actor: &mut Actor, env: &MachineEnv<'_>, dt: f32) {
        let requested = {
            let mut cx = StateCx::new(env, actor, &mut self.input, &mut self.effects);
            self.current.policy_mut().on_physics_process(dt, &mut cx);
            cx.take_pending()
        };

        if let Some(transition) = requested {
            self.transition(actor, env, transition, false);
        }

        self.settle(actor, env, dt);
        self.input.age_out(env.tuning.input_buffer_ticks);
    }

    fn settle(&self, actor: &mut Actor, env: &MachineEnv<'_>, dt: f32) {
        let t = env.tuning;
        let policy = self.current.policy();

        if !actor.body.grounded && !policy.drives_vertical() {
            actor.body.velocity.y -= t.gravity * dt;
        }

        // Airborne momentum is never decayed here.
        if actor.body.grounded && !policy.traits().allows_movement && !policy.drives_velocity() {
            let friction = if actor.status.in_knockback() {
                t.knockback_friction
            } else {
                t.ground_friction
            };
            apply_friction(actor, friction, dt);
        }
    }

    /// Pushes a discrete input for the states to consume.
    pub fn buffer_input(&mut self, action: InputAction, data: InputData) {
        self.input.push(action, data);
    }

    /// Consumes a buffered input.
    pub fn consume_buffered_input(&mut self, action: InputAction) -> bool {
        self.input.consume(action)
    }

    /// Consumes a buffered input and returns its payload.
    pub fn consume_buffered_input_with_data(&mut self, action: InputAction) -> Option<InputData> {
        self.input.consume_with_data(action)
    }

    /// Number of buffered inputs.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.input.len()
    }

    /// Takes the effects produced since the last drain.
    pub fn drain_effects(&mut self) -> Vec<StateEffect> {
        mem::take(&mut self.effects)
    }
}
