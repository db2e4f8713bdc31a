//! Action states.
//!
//! Every state is a small policy object implementing [`StatePolicy`]. The
//! machine holds exactly one of them inside the [`ActionState`] tagged union;
//! per-activation fields (elapsed time, combo step, swing id) live in the
//! variant and are rebuilt on every entry.

mod airborne;
mod block;
mod dash;
mod dead;
mod idle;
mod melee;
mod moving;
mod ranged;
mod stunned;

pub use airborne::{AirPhase, Airborne};
pub use block::Block;
pub use dash::Dash;
pub use dead::Dead;
pub use idle::Idle;
pub use melee::{swing_volume, MeleeAttack, SwingPhase};
pub use moving::Moving;
pub use ranged::{muzzle, RangedAttack};
pub use stunned::Stunned;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::entity::Actor;
use crate::events::Notification;
use crate::input::{InputAction, InputBuffer, InputData};
use crate::physics::{Environment, Shape};
use crate::resolver::SwingId;
use crate::tuning::CombatTuning;
use crate::weapon::{AttackKind, ProjectileProfile, SwingProfile};

/// State names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateId {
    /// Standing still
    Idle,
    /// Walking / running
    Moving,
    /// Jumping or falling
    Airborne,
    /// Dodge burst
    Dash,
    /// Melee combo step
    MeleeAttack,
    /// Ranged shot
    RangedAttack,
    /// Blocking
    Block,
    /// Hit reaction
    Stunned,
    /// Dead
    Dead,
}

impl StateId {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving => "moving",
            Self::Airborne => "airborne",
            Self::Dash => "dash",
            Self::MeleeAttack => "melee_attack",
            Self::RangedAttack => "ranged_attack",
            Self::Block => "block",
            Self::Stunned => "stunned",
            Self::Dead => "dead",
        }
    }

    /// Idle, Moving or Airborne.
    #[must_use]
    pub const fn is_locomotion(self) -> bool {
        matches!(self, Self::Idle | Self::Moving | Self::Airborne)
    }

    /// Melee or ranged attack.
    #[must_use]
    pub const fn is_attack(self) -> bool {
        matches!(self, Self::MeleeAttack | Self::RangedAttack)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static attributes of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTraits {
    /// Any transition out is legal
    pub can_be_interrupted: bool,
    /// Relative importance; higher states are harder to leave
    pub priority: i32,
    /// Locomotion input steers the body
    pub allows_movement: bool,
    /// The body may turn
    pub allows_rotation: bool,
}

/// Data handed to a state on entry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EnterParams {
    /// Nothing
    #[default]
    None,
    /// Leave the ground with this vertical speed
    Jump {
        /// Initial vertical speed
        velocity: f32,
    },
    /// Walked off a ledge or was launched
    Fall,
    /// Dash in a direction
    Dash {
        /// Ground-plane direction
        direction: Vec3,
    },
    /// Start this combo step
    Combo {
        /// Zero-based step
        step: u8,
    },
}

/// A requested state change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Target state
    pub target: StateId,
    /// Entry data
    pub params: EnterParams,
}

impl Transition {
    /// Transition without entry data.
    #[must_use]
    pub const fn to(target: StateId) -> Self {
        Self {
            target,
            params: EnterParams::None,
        }
    }

    /// Transition with entry data.
    #[must_use]
    pub const fn with(target: StateId, params: EnterParams) -> Self {
        Self { target, params }
    }
}

/// Side effects a state asks the simulation to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEffect {
    /// A swing began; its hit-dedup set starts empty.
    SwingStarted {
        /// Swing
        swing: SwingId,
        /// Combo step
        combo_step: u8,
    },
    /// The swing's hitbox is open this tick.
    MeleeSweep {
        /// Swing
        swing: SwingId,
        /// Combo step
        combo_step: u8,
        /// Hitbox
        shape: Shape,
        /// Swing data
        profile: SwingProfile,
        /// Attacker position, for the defender's frontal-arc check
        origin: Vec3,
        /// Attacker facing
        forward: Vec3,
    },
    /// The swing ended or was cancelled.
    SwingEnded {
        /// Swing
        swing: SwingId,
    },
    /// Spawn a projectile.
    FireProjectile {
        /// Spawn point
        origin: Vec3,
        /// Unit direction
        direction: Vec3,
        /// Projectile data
        profile: ProjectileProfile,
    },
    /// A locally detected wall jump, for replay on the server.
    WallJump {
        /// Wall normal used
        normal: Vec3,
    },
    /// Presentation notification.
    Notify(Notification),
}

/// World access shared by every state during one machine call.
pub struct MachineEnv<'w> {
    /// Gameplay constants
    pub tuning: &'w CombatTuning,
    /// Static geometry
    pub world: &'w dyn Environment,
    /// Simulation clock
    pub now: f64,
    /// The actor is driven by replayed network input on the server
    pub remote_driven: bool,
}

/// Per-call context handed to a state.
pub struct StateCx<'a, 'w> {
    /// World access
    pub env: &'a MachineEnv<'w>,
    /// The actor being driven
    pub actor: &'a mut Actor,
    /// Buffered discrete input
    pub input: &'a mut InputBuffer,
    effects: &'a mut Vec<StateEffect>,
    pending: Option<Transition>,
}

impl<'a, 'w> StateCx<'a, 'w> {
    pub(crate) fn new(
        env: &'a MachineEnv<'w>,
        actor: &'a mut Actor,
        input: &'a mut InputBuffer,
        effects: &'a mut Vec<StateEffect>,
    ) -> Self {
        Self {
            env,
            actor,
            input,
            effects,
            pending: None,
        }
    }

    /// Gameplay constants.
    #[must_use]
    pub fn tuning(&self) -> &'w CombatTuning {
        self.env.tuning
    }

    /// Requests a transition at the end of this tick. Only the first request
    /// per tick counts; later ones are ignored.
    pub fn request(&mut self, transition: Transition) -> bool {
        if let Some(first) = self.pending {
            debug!(
                entity = %self.actor.id,
                kept = %first.target,
                ignored = %transition.target,
                "duplicate transition request ignored"
            );
            return false;
        }
        self.pending = Some(transition);
        true
    }

    /// The request accepted this tick, if any.
    #[must_use]
    pub fn pending(&self) -> Option<Transition> {
        self.pending
    }

    pub(crate) fn take_pending(&mut self) -> Option<Transition> {
        self.pending.take()
    }

    /// Queues a side effect.
    pub fn emit(&mut self, effect: StateEffect) {
        self.effects.push(effect);
    }

    /// Queues a presentation notification.
    pub fn notify(&mut self, notification: Notification) {
        self.effects.push(StateEffect::Notify(notification));
    }

    /// Plays an animation clip on the actor.
    pub fn animate(&mut self, clip: impl Into<String>) {
        let entity = self.actor.id;
        self.notify(Notification::Animation {
            entity,
            clip: clip.into(),
        });
    }
}

/// Behavior contract of one action state.
pub trait StatePolicy {
    /// Name.
    fn id(&self) -> StateId;

    /// Static attributes.
    fn traits(&self) -> StateTraits;

    /// Runs once when the state becomes active.
    fn on_enter(&mut self, _previous: StateId, _cx: &mut StateCx<'_, '_>) {}

    /// Runs every simulation tick while active. May request at most one
    /// transition.
    fn on_physics_process(&mut self, dt: f32, cx: &mut StateCx<'_, '_>);

    /// Runs once when the state is replaced.
    fn on_exit(&mut self, _next: StateId, _cx: &mut StateCx<'_, '_>) {}

    /// Whether this state lets a non-interruptible exit to `target` happen.
    fn can_transition_to(&self, _target: StateId) -> bool {
        false
    }

    /// The state sets horizontal velocity itself.
    fn drives_velocity(&self) -> bool {
        false
    }

    /// The state applies its own gravity.
    fn drives_vertical(&self) -> bool {
        false
    }
}

/// The active state of one machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionState {
    /// Idle
    Idle(Idle),
    /// Moving
    Moving(Moving),
    /// Airborne
    Airborne(Airborne),
    /// Dash
    Dash(Dash),
    /// Melee attack
    MeleeAttack(MeleeAttack),
    /// Ranged attack
    RangedAttack(RangedAttack),
    /// Block
    Block(Block),
    /// Stunned
    Stunned(Stunned),
    /// Dead
    Dead(Dead),
}

impl Default for ActionState {
    fn default() -> Self {
        Self::Idle(Idle)
    }
}

impl ActionState {
    /// Builds the state a transition targets, or `None` when the actor cannot
    /// enter it right now. Refusal happens before any side effect.
    #[must_use]
    pub fn build(transition: &Transition, actor: &Actor, tuning: &CombatTuning) -> Option<Self> {
        let state = match transition.target {
            StateId::Idle => Self::Idle(Idle),
            StateId::Moving => Self::Moving(Moving),
            StateId::Airborne => Self::Airborne(Airborne::new(match transition.params {
                EnterParams::Jump { velocity } => Some(velocity),
                _ => None,
            })),
            StateId::Dash => {
                if actor.vitals.stamina < tuning.dash_stamina_cost {
                    debug!(entity = %actor.id, stamina = actor.vitals.stamina, "dash refused: stamina");
                    return None;
                }
                let direction = match transition.params {
                    EnterParams::Dash { direction } => direction,
                    _ => Vec3::ZERO,
                };
                Self::Dash(Dash::new(dash_direction(actor, direction)))
            }
            StateId::MeleeAttack => {
                let step = match transition.params {
                    EnterParams::Combo { step } => step,
                    _ => 0,
                };
                let profile = *actor.loadout.melee().swing(step)?;
                Self::MeleeAttack(MeleeAttack::new(step, profile))
            }
            StateId::RangedAttack => {
                let ranged = actor.loadout.ranged()?;
                Self::RangedAttack(RangedAttack::new(
                    ranged.windup(),
                    ranged.recovery(),
                    *ranged.projectile(),
                ))
            }
            StateId::Block => {
                if !actor.body.grounded {
                    return None;
                }
                Self::Block(Block)
            }
            StateId::Stunned => Self::Stunned(Stunned::default()),
            StateId::Dead => Self::Dead(Dead),
        };
        Some(state)
    }

    /// The state as a policy object.
    #[must_use]
    pub fn policy(&self) -> &dyn StatePolicy {
        match self {
            Self::Idle(s) => s,
            Self::Moving(s) => s,
            Self::Airborne(s) => s,
            Self::Dash(s) => s,
            Self::MeleeAttack(s) => s,
            Self::RangedAttack(s) => s,
            Self::Block(s) => s,
            Self::Stunned(s) => s,
            Self::Dead(s) => s,
        }
    }

    /// The state as a mutable policy object.
    pub fn policy_mut(&mut self) -> &mut dyn StatePolicy {
        match self {
            Self::Idle(s) => s,
            Self::Moving(s) => s,
            Self::Airborne(s) => s,
            Self::Dash(s) => s,
            Self::MeleeAttack(s) => s,
            Self::RangedAttack(s) => s,
            Self::Block(s) => s,
            Self::Stunned(s) => s,
            Self::Dead(s) => s,
        }
    }

    /// Name of the state.
    #[must_use]
    pub fn id(&self) -> StateId {
        self.policy().id()
    }
}

// === Shared helpers ===

pub(crate) fn move_toward(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let delta = target - current;
    let distance = delta.length();
    if distance <= max_delta || distance <= f32::EPSILON {
        target
    } else {
        current + delta / distance * max_delta
    }
}

/// Accelerates horizontal velocity toward the movement input.
pub(crate) fn ground_steer(actor: &mut Actor, tuning: &CombatTuning, dt: f32) {
    let speed = tuning.move_speed * actor.status.slow_factor;
    let desired = actor.controls.movement * speed;
    let current = actor.body.horizontal_velocity();
    let next = move_toward(current, desired, tuning.ground_acceleration * dt);
    actor.body.velocity.x = next.x;
    actor.body.velocity.z = next.z;
}

/// Removes a fraction of horizontal velocity.
pub(crate) fn apply_friction(actor: &mut Actor, friction: f32, dt: f32) {
    let keep = (1.0 - friction * dt).max(0.0);
    actor.body.velocity.x *= keep;
    actor.body.velocity.z *= keep;
}

pub(crate) fn face_movement(actor: &mut Actor) {
    let movement = actor.controls.movement;
    actor.body.face(movement);
}

pub(crate) fn has_movement(actor: &Actor) -> bool {
    actor.controls.movement.length_squared() > 1e-4
}

/// Where a finished action hands control back to.
pub(crate) fn locomotion_exit(actor: &Actor) -> Transition {
    if !actor.body.grounded {
        Transition::with(StateId::Airborne, EnterParams::Fall)
    } else if has_movement(actor) {
        Transition::to(StateId::Moving)
    } else {
        Transition::to(StateId::Idle)
    }
}

/// The attack state the held weapon starts.
pub(crate) fn attack_transition(actor: &Actor, step: u8) -> Transition {
    match actor.loadout.attack_kind() {
        AttackKind::Melee => Transition::with(StateId::MeleeAttack, EnterParams::Combo { step }),
        AttackKind::Ranged => Transition::to(StateId::RangedAttack),
    }
}

pub(crate) fn dash_direction(actor: &Actor, requested: Vec3) -> Vec3 {
    let flat = Vec3::new(requested.x, 0.0, requested.z);
    flat.try_normalize()
        .or_else(|| actor.controls.movement.try_normalize())
        .unwrap_or_else(|| actor.body.forward())
}

pub(crate) fn dodge_transition(cx: &mut StateCx<'_, '_>) -> Option<Transition> {
    let data = cx.input.consume_with_data(InputAction::Dodge)?;
    let direction = match data {
        InputData::Direction(d) => d,
        InputData::None | InputData::WallNormal(_) => Vec3::ZERO,
    };
    Some(Transition::with(StateId::Dash, EnterParams::Dash { direction }))
}

/// Grounded combat input in priority order: dodge, attack, block, jump.
/// Consumes only the input it acts on.
pub(crate) fn read_combat_input(cx: &mut StateCx<'_, '_>) -> Option<Transition> {
    if let Some(dash) = dodge_transition(cx) {
        return Some(dash);
    }
    if cx.input.consume(InputAction::Attack) {
        return Some(attack_transition(cx.actor, 0));
    }
    let pressed_block = cx.input.consume(InputAction::Block);
    if (pressed_block || cx.actor.controls.block_held) && cx.actor.body.grounded {
        return Some(Transition::to(StateId::Block));
    }
    if cx.actor.body.grounded && cx.input.consume(InputAction::Jump) {
        let velocity = cx.tuning().jump_velocity;
        return Some(Transition::with(StateId::Airborne, EnterParams::Jump { velocity }));
    }
    None
}
