//! Combatant data.
//!
//! An [`Entity`] is composed of an [`Actor`] (the typed component data the
//! states and the resolver work on) and the [`StateMachine`] that drives it.
//! The two are separate fields so the machine can borrow the actor mutably.

use glam::Vec3;
use riposte_common::EntityId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::block::BlockState;
use crate::machine::StateMachine;
use crate::physics::BodyExtents;
use crate::region::RegionTable;
use crate::timer::{ActivationId, TimerKind, Timers};
use crate::weapon::Loadout;

/// Position, orientation and motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    /// Feet position
    pub position: Vec3,
    /// Facing angle around +Y; zero faces +Z
    pub yaw: f32,
    /// Velocity
    pub velocity: Vec3,
    /// Whether the body is standing on something
    pub grounded: bool,
    /// Collision extents
    pub extents: BodyExtents,
}

impl Body {
    /// A grounded, resting body at `position`.
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            velocity: Vec3::ZERO,
            grounded: true,
            extents: BodyExtents {
                radius: 0.4,
                height: 1.8,
            },
        }
    }

    /// Unit facing vector on the ground plane.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    /// Turns to face `direction` on the ground plane. Zero vectors are ignored.
    pub fn face(&mut self, direction: Vec3) {
        let flat = Vec3::new(direction.x, 0.0, direction.z);
        if flat.length_squared() > 1e-6 {
            self.yaw = flat.x.atan2(flat.z);
        }
    }

    /// Horizontal part of the velocity.
    #[must_use]
    pub fn horizontal_velocity(&self) -> Vec3 {
        Vec3::new(self.velocity.x, 0.0, self.velocity.z)
    }

    /// Center of mass, halfway up the body.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        self.position + Vec3::Y * (self.extents.height * 0.5)
    }
}

/// Health, shields and stamina. All values stay within `0..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Current shields, drained before health
    pub shields: f32,
    /// Maximum shields
    pub max_shields: f32,
    /// Current stamina
    pub stamina: f32,
    /// Maximum stamina
    pub max_stamina: f32,
    /// Seconds until stamina starts regenerating again
    regen_delay: f32,
}

impl Default for Vitals {
    fn default() -> Self {
        Self::new(100.0, 0.0, 100.0)
    }
}

impl Vitals {
    /// Full vitals with the given maxima.
    #[must_use]
    pub fn new(max_health: f32, max_shields: f32, max_stamina: f32) -> Self {
        Self {
            health: max_health,
            max_health,
            shields: max_shields,
            max_shields,
            stamina: max_stamina,
            max_stamina,
            regen_delay: 0.0,
        }
    }

    /// Applies damage, shields first. Returns the amount actually removed.
    pub fn absorb(&mut self, amount: f32) -> f32 {
        let amount = amount.max(0.0);
        let to_shields = amount.min(self.shields);
        self.shields -= to_shields;
        let to_health = (amount - to_shields).min(self.health);
        self.health -= to_health;
        to_shields + to_health
    }

    /// Spends stamina if enough is available. Nothing changes otherwise.
    pub fn spend_stamina(&mut self, cost: f32, regen_delay: f32) -> bool {
        if self.stamina < cost {
            return false;
        }
        self.stamina -= cost;
        self.regen_delay = regen_delay;
        true
    }

    /// Adds stamina, capped at the maximum.
    pub fn grant_stamina(&mut self, amount: f32) {
        self.stamina = (self.stamina + amount.max(0.0)).min(self.max_stamina);
    }

    /// Regenerates stamina once the post-spend delay has elapsed.
    pub fn regenerate(&mut self, dt: f32, rate: f32) {
        if self.regen_delay > 0.0 {
            self.regen_delay = (self.regen_delay - dt).max(0.0);
            return;
        }
        self.stamina = (self.stamina + rate * dt).min(self.max_stamina);
    }

    /// Whether health reached zero.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Refills everything.
    pub fn restore(&mut self) {
        *self = Self::new(self.max_health, self.max_shields, self.max_stamina);
    }
}

/// A knockback launch waiting for the attacker's hitlag to end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingLaunch {
    /// The `Launch` timer activation this launch belongs to
    pub activation: ActivationId,
    /// Velocity to apply
    pub velocity: Vec3,
}

/// Hit reactions and debuffs currently affecting an actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    /// Hitlag / hitstun / launch / knockback / slow countdowns
    pub timers: Timers,
    /// Velocity saved while frozen in hitlag
    pub frozen_velocity: Option<Vec3>,
    /// Launch scheduled for the end of the attacker's hitlag
    pub pending_launch: Option<PendingLaunch>,
    /// Hits taken since the last time this actor was grounded and settled
    pub juggle: u32,
    /// Movement speed multiplier from leg hits
    pub slow_factor: f32,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            timers: Timers::new(),
            frozen_velocity: None,
            pending_launch: None,
            juggle: 0,
            slow_factor: 1.0,
        }
    }
}

impl Status {
    /// Frozen by hitlag.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.timers.is_active(TimerKind::Hitlag)
    }

    /// Cannot act.
    #[must_use]
    pub fn in_hitstun(&self) -> bool {
        self.timers.is_active(TimerKind::Hitstun)
    }

    /// A launch is scheduled or in flight.
    #[must_use]
    pub fn in_knockback(&self) -> bool {
        self.pending_launch.is_some() || self.timers.is_active(TimerKind::Knockback)
    }
}

/// Continuous controls for the current tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Controls {
    /// Desired ground-plane movement (length <= 1)
    pub movement: Vec3,
    /// Block button held
    pub block_held: bool,
}

/// Component data of one combatant.
#[derive(Debug, Clone)]
pub struct Actor {
    /// Owning entity
    pub id: EntityId,
    /// Motion
    pub body: Body,
    /// Health, shields, stamina
    pub vitals: Vitals,
    /// Hit reactions
    pub status: Status,
    /// Continuous controls
    pub controls: Controls,
    /// Held weapon
    pub loadout: Loadout,
    /// Hit region layout
    pub regions: Arc<RegionTable>,
    /// Present while blocking
    pub block: Option<BlockState>,
    swing_seq: u32,
}

impl Actor {
    /// A fresh actor standing at `position`.
    #[must_use]
    pub fn new(id: EntityId, position: Vec3, regions: Arc<RegionTable>) -> Self {
        Self {
            id,
            body: Body::at(position),
            vitals: Vitals::default(),
            status: Status::default(),
            controls: Controls::default(),
            loadout: Loadout::unarmed(),
            regions,
            block: None,
            swing_seq: 0,
        }
    }

    /// Sets vitals.
    #[must_use]
    pub fn with_vitals(mut self, vitals: Vitals) -> Self {
        self.vitals = vitals;
        self
    }

    /// Sets the loadout.
    #[must_use]
    pub fn with_loadout(mut self, loadout: Loadout) -> Self {
        self.loadout = loadout;
        self
    }

    /// Sets the initial facing.
    #[must_use]
    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.body.yaw = yaw;
        self
    }

    /// Mints the next swing sequence number for this actor.
    pub fn next_swing_seq(&mut self) -> u32 {
        self.swing_seq = self.swing_seq.wrapping_add(1);
        self.swing_seq
    }

    /// Being moved by a hit: in hitstun, in knockback, or airborne after
    /// being juggled.
    #[must_use]
    pub fn is_displaced(&self) -> bool {
        self.status.in_hitstun()
            || self.status.in_knockback()
            || (!self.body.grounded && self.status.juggle > 0)
    }

    /// Dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.vitals.is_dead()
    }

    /// Clears hit reactions, refills vitals and moves to `position`.
    pub fn reset(&mut self, position: Vec3) {
        let extents = self.body.extents;
        self.body = Body::at(position);
        self.body.extents = extents;
        self.vitals.restore();
        self.status = Status::default();
        self.controls = Controls::default();
        self.block = None;
    }
}

/// A combatant registered in an arena.
#[derive(Debug)]
pub struct Entity {
    /// Unique name, used as a fallback when ids disagree across roles
    pub name: String,
    /// Driven by a remote player's input rather than server AI
    pub player_controlled: bool,
    /// Action state machine
    pub machine: StateMachine,
    /// Component data
    pub actor: Actor,
}

impl Entity {
    /// Wraps an actor with a fresh state machine in the idle state.
    #[must_use]
    pub fn new(name: impl Into<String>, actor: Actor, input_capacity: usize) -> Self {
        Self {
            name: name.into(),
            player_controlled: false,
            machine: StateMachine::new(input_capacity),
            actor,
        }
    }

    /// Marks the entity as driven by a player.
    #[must_use]
    pub fn player(mut self) -> Self {
        self.player_controlled = true;
        self
    }

    /// Entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.actor.id
    }
}
