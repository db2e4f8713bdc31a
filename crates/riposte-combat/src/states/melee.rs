use glam::Vec3;

use super::{
    dodge_transition, face_movement, locomotion_exit, EnterParams, StateCx, StateEffect, StateId,
    StatePolicy, StateTraits, Transition,
};
use crate::entity::Body;
use crate::input::InputAction;
use crate::physics::Shape;
use crate::resolver::SwingId;
use crate::weapon::SwingProfile;

/// Height of the hitbox center above the feet.
const HITBOX_HEIGHT: f32 = 1.2;

/// The volume a swing with `profile` sweeps for a body in its current pose.
#[must_use]
pub fn swing_volume(body: &Body, profile: &SwingProfile) -> Shape {
    Shape::Sphere {
        center: body.position + body.forward() * profile.reach + Vec3::Y * HITBOX_HEIGHT,
        radius: profile.radius,
    }
}

/// Phase of a swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwingPhase {
    /// Before the hitbox opens
    Windup,
    /// Hitbox open
    Active,
    /// After the hitbox closes
    Recovery,
    /// Done
    Complete,
}

/// One step of a melee combo.
#[derive(Debug, Clone, PartialEq)]
pub struct MeleeAttack {
    step: u8,
    profile: SwingProfile,
    swing: Option<SwingId>,
    elapsed: f32,
    phase: SwingPhase,
}

impl MeleeAttack {
    /// Combo step `step` using `profile`.
    #[must_use]
    pub fn new(step: u8, profile: SwingProfile) -> Self {
        Self {
            step,
            profile,
            swing: None,
            elapsed: 0.0,
            phase: SwingPhase::Windup,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SwingPhase {
        self.phase
    }

    /// Combo step.
    #[must_use]
    pub fn step(&self) -> u8 {
        self.step
    }

    /// Swing id, assigned on entry.
    #[must_use]
    pub fn swing(&self) -> Option<SwingId> {
        self.swing
    }

    fn phase_at(&self, elapsed: f32) -> SwingPhase {
        let p = &self.profile;
        if elapsed < p.windup {
            SwingPhase::Windup
        } else if elapsed < p.windup + p.active {
            SwingPhase::Active
        } else if elapsed < p.total() {
            SwingPhase::Recovery
        } else {
            SwingPhase::Complete
        }
    }
}

impl StatePolicy for MeleeAttack {
    fn id(&self) -> StateId {
        StateId::MeleeAttack
    }

    fn traits(&self) -> StateTraits {
        StateTraits {
            can_be_interrupted: false,
            priority: 2,
            allows_movement: false,
            allows_rotation: self.phase == SwingPhase::Windup,
        }
    }

    fn on_enter(&mut self, _previous: StateId, cx: &mut StateCx<'_, '_>) {
        let swing = SwingId {
            owner: cx.actor.id,
            seq: cx.actor.next_swing_seq(),
        };
        self.swing = Some(swing);
        self.elapsed = 0.0;
        self.phase = SwingPhase::Windup;

        face_movement(cx.actor);
        cx.emit(StateEffect::SwingStarted {
            swing,
            combo_step: self.step,
        });
        cx.animate(format!("attack_{}", self.step));
    }

    fn on_physics_process(&mut self, dt: f32, cx: &mut StateCx<'_, '_>) {
        self.elapsed += dt;
        self.phase = self.phase_at(self.elapsed);

        match self.phase {
            SwingPhase::Windup => face_movement(cx.actor),
            SwingPhase::Active => {
                if let Some(swing) = self.swing {
                    let body = &cx.actor.body;
                    let forward = body.forward();
                    let origin = body.position;
                    cx.emit(StateEffect::MeleeSweep {
                        swing,
                        combo_step: self.step,
                        shape: swing_volume(body, &self.profile),
                        profile: self.profile,
                        origin,
                        forward,
                    });
                }
            }
            SwingPhase::Recovery => {
                if let Some(dash) = dodge_transition(cx) {
                    cx.request(dash);
                    return;
                }
                let next = self.step.saturating_add(1);
                if next < cx.actor.loadout.melee().combo_len() && cx.input.consume(InputAction::Attack) {
                    cx.request(Transition::with(
                        StateId::MeleeAttack,
                        EnterParams::Combo { step: next },
                    ));
                }
            }
            SwingPhase::Complete => {
                let exit = locomotion_exit(cx.actor);
                cx.request(exit);
            }
        }
    }

    fn on_exit(&mut self, _next: StateId, cx: &mut StateCx<'_, '_>) {
        if let Some(swing) = self.swing.take() {
            cx.emit(StateEffect::SwingEnded { swing });
        }
    }

    fn can_transition_to(&self, target: StateId) -> bool {
        match target {
            StateId::Stunned | StateId::Dead => true,
            StateId::Dash | StateId::MeleeAttack => {
                matches!(self.phase, SwingPhase::Recovery | SwingPhase::Complete)
            }
            StateId::Idle | StateId::Moving | StateId::Airborne => self.phase == SwingPhase::Complete,
            StateId::RangedAttack | StateId::Block => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::input::{InputBuffer, InputData};
    use crate::physics::FlatWorld;
    use crate::tuning::CombatTuning;
    use crate::weapon::{Loadout, MeleeCapable, MeleeWeapon, Weapon};

    fn sword_swing(step: u8) -> MeleeAttack {
        let sword = MeleeWeapon::sword();
        MeleeAttack::new(step, *sword.swing(step).expect("step"))
    }

    #[test]
    fn test_phases_and_sweeps() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor().with_loadout(Loadout::with_weapon(Weapon::Melee(MeleeWeapon::sword())));
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        let mut attack = sword_swing(0);
        attack.on_enter(StateId::Idle, &mut cx);
        assert!(attack.traits().allows_rotation);

        attack.on_physics_process(0.15, &mut cx);
        assert_eq!(attack.phase(), SwingPhase::Active);
        assert!(!attack.traits().allows_rotation);

        attack.on_physics_process(0.15, &mut cx);
        assert_eq!(attack.phase(), SwingPhase::Recovery);

        attack.on_physics_process(0.5, &mut cx);
        assert_eq!(attack.phase(), SwingPhase::Complete);
        assert_eq!(cx.pending().map(|t| t.target), Some(StateId::Idle));

        let sweeps = effects
            .iter()
            .filter(|e| matches!(e, StateEffect::MeleeSweep { .. }))
            .count();
        assert_eq!(sweeps, 1);
        assert!(matches!(effects[0], StateEffect::SwingStarted { combo_step: 0, .. }));
    }

    #[test]
    fn test_each_entry_gets_a_new_swing() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor();
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        let mut first = sword_swing(0);
        first.on_enter(StateId::Idle, &mut cx);
        let mut second = sword_swing(1);
        second.on_enter(StateId::MeleeAttack, &mut cx);

        assert_ne!(first.swing(), second.swing());

        first.on_exit(StateId::MeleeAttack, &mut cx);
        assert!(first.swing().is_none());
        assert!(effects.iter().any(|e| matches!(e, StateEffect::SwingEnded { .. })));
    }

    #[test]
    fn test_combo_continues_in_recovery() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor().with_loadout(Loadout::with_weapon(Weapon::Melee(MeleeWeapon::sword())));
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        let mut attack = sword_swing(0);
        attack.on_enter(StateId::Idle, &mut cx);
        attack.on_physics_process(0.3, &mut cx);
        assert_eq!(attack.phase(), SwingPhase::Recovery);

        cx.input.push(InputAction::Attack, InputData::None);
        attack.on_physics_process(0.01, &mut cx);
        assert_eq!(
            cx.pending(),
            Some(Transition::with(StateId::MeleeAttack, EnterParams::Combo { step: 1 }))
        );
        assert!(attack.can_transition_to(StateId::MeleeAttack));
    }

    #[test]
    fn test_combo_stops_at_last_step() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor().with_loadout(Loadout::with_weapon(Weapon::Melee(MeleeWeapon::sword())));
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        let mut finisher = sword_swing(2);
        finisher.on_enter(StateId::MeleeAttack, &mut cx);
        finisher.on_physics_process(0.35, &mut cx);
        assert_eq!(finisher.phase(), SwingPhase::Recovery);

        cx.input.push(InputAction::Attack, InputData::None);
        finisher.on_physics_process(0.01, &mut cx);
        assert!(cx.pending().is_none());
        assert!(cx.input.peek(InputAction::Attack));
    }

    #[test]
    fn test_windup_cannot_be_cancelled() {
        let attack = sword_swing(0);
        assert!(!attack.can_transition_to(StateId::Dash));
        assert!(!attack.can_transition_to(StateId::Idle));
        assert!(attack.can_transition_to(StateId::Stunned));
        assert!(attack.can_transition_to(StateId::Dead));
    }
}
