//! Fixed-step simulation for one network role.
//!
//! A [`Simulation`] owns the arena, the projectiles and the hit-dedup ledger,
//! and is the only code that routes a hit into the resolver. Per tick:
//! 1. every entity's hit timers advance (hitlag release, delayed launches,
//!    slow expiry) and its stamina regenerates,
//! 2. for every entity in id order, unless frozen in hitlag, the state
//!    machine runs and the body moves, then the effects its states produced
//!    are carried out in order,
//! 3. projectiles advance.
//!
//! The server then broadcasts; the client expires stale predictions. Timers
//! started by a hit first advance on the following tick, so a target's launch
//! and its attacker's release land on the same tick.

use ahash::{AHashMap, AHashSet};
use glam::Vec3;
use riposte_common::{EntityId, RiposteResult};
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::arena::{Arena, ArenaError};
use crate::choreography::{Choreography, HitTiming};
use crate::entity::{Actor, Entity, Vitals};
use crate::events::{Notification, NotificationBus};
use crate::input::InputFrame;
use crate::physics::{CollisionCategory, Environment, OverlapQuery, Shape};
use crate::prediction::{PredictedHit, PredictionLedger};
use crate::protocol::{decode_message, HitValidationRequest, Message, Outbound, Peer, Recipient};
use crate::region::RegionTable;
use crate::resolver::{Blast, HitEvent, HitOutcome, HitResolver, HitSource, SwingId};
use crate::states::{MachineEnv, StateEffect, StateId};
use crate::tuning::CombatTuning;
use crate::weapon::{Loadout, ProjectileProfile, SwingProfile};

/// Input buffer length per entity.
pub const INPUT_CAPACITY: usize = 8;

/// Which side of the network this simulation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Authoritative server
    Server,
    /// Client predicting `local`'s own actions
    Client {
        /// The locally controlled entity
        local: EntityId,
    },
}

impl Role {
    /// Whether this is the server.
    #[must_use]
    pub fn is_server(self) -> bool {
        matches!(self, Self::Server)
    }
}

/// How a detected hit is handled on this side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitMode {
    /// Resolve and apply; the server's own entities
    Authoritative,
    /// Resolve, apply and ask the server to confirm; the local player's hits
    Predicted,
    /// Ignore; the server waits for the owning client's claim
    AwaitValidation,
    /// Cosmetic only; hits this client does not own
    Observer,
}

/// Parameters for a new entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Spawn {
    /// Unique name
    pub name: String,
    /// Spawn point
    pub position: Vec3,
    /// Initial facing
    pub yaw: f32,
    /// Health, shields, stamina
    pub vitals: Vitals,
    /// Held weapon
    pub loadout: Loadout,
    /// Driven by a player
    pub player_controlled: bool,
}

impl Spawn {
    /// An unarmed AI entity at `position`.
    #[must_use]
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
            yaw: 0.0,
            vitals: Vitals::default(),
            loadout: Loadout::unarmed(),
            player_controlled: false,
        }
    }

    /// Sets the facing.
    #[must_use]
    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self
    }

    /// Sets the vitals.
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

    /// Marks the entity as player controlled.
    #[must_use]
    pub fn player(mut self) -> Self {
        self.player_controlled = true;
        self
    }
}

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    /// Id, also its dedup scope: the owner's id in the high bits, the owner's
    /// activation sequence in the low bits
    pub id: u64,
    /// Current owner, never hit by its own projectile
    pub owner: EntityId,
    /// Position
    pub position: Vec3,
    /// Velocity
    pub velocity: Vec3,
    /// Damage data
    pub profile: ProjectileProfile,
    /// Seconds in flight since spawn or reflection
    pub age: f32,
}

// === Hit Dedup ===

#[derive(Debug, Clone, Default)]
struct HitSet {
    targets: AHashSet<EntityId>,
    closed_at: Option<f64>,
    cancelled: bool,
}

/// What the ledger made of a client's hit claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    /// First hit of the source on the target; recorded
    Recorded,
    /// The source already hit the target
    Duplicate,
    /// The source was parried and can no longer hit anything
    Cancelled,
    /// The source's set was already pruned
    Expired,
}

/// Per-source sets of already-hit targets.
///
/// A set opens when its activation starts and is closed when the activation
/// ends. Closed sets are kept for a while so late validation requests still
/// dedup against them. Once pruned, the owner's newest pruned sequence is
/// remembered so the activation cannot be claimed again.
#[derive(Debug, Clone, Default)]
pub struct SwingLedger {
    sets: AHashMap<HitSource, HitSet>,
    pruned_through: AHashMap<EntityId, u32>,
}

impl SwingLedger {
    /// An empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `source`. Hits already recorded against it are kept.
    pub fn open(&mut self, source: HitSource) {
        let set = self.sets.entry(source).or_default();
        if !set.cancelled {
            set.closed_at = None;
        }
    }

    /// Marks `source` finished.
    pub fn close(&mut self, source: HitSource, now: f64) {
        if let Some(set) = self.sets.get_mut(&source) {
            set.closed_at.get_or_insert(now);
        }
    }

    /// Marks every combo step of `swing` finished.
    pub fn close_swing(&mut self, swing: SwingId, now: f64) {
        for (source, set) in &mut self.sets {
            if matches!(source, HitSource::Melee { swing: s, .. } if *s == swing) {
                set.closed_at.get_or_insert(now);
            }
        }
    }

    /// Ends `swing` after a parry. It hits nothing more, not even targets it
    /// has not touched yet.
    pub fn cancel_swing(&mut self, swing: SwingId, now: f64) {
        for (source, set) in &mut self.sets {
            if matches!(source, HitSource::Melee { swing: s, .. } if *s == swing) {
                set.cancelled = true;
                set.closed_at.get_or_insert(now);
            }
        }
    }

    /// Records a hit on `target`. False when `source` already hit it or was
    /// cancelled.
    pub fn try_hit(&mut self, source: HitSource, target: EntityId) -> bool {
        let set = self.sets.entry(source).or_default();
        !set.cancelled && set.targets.insert(target)
    }

    /// Records a claimed hit. A set created here starts closed at `now`, so
    /// it is pruned even if the activation is never seen locally.
    pub fn claim(&mut self, source: HitSource, target: EntityId, now: f64) -> ClaimStatus {
        if self.is_expired(source) {
            return ClaimStatus::Expired;
        }
        let set = self.sets.entry(source).or_insert_with(|| HitSet {
            closed_at: Some(now),
            ..HitSet::default()
        });
        if set.cancelled {
            ClaimStatus::Cancelled
        } else if set.targets.insert(target) {
            ClaimStatus::Recorded
        } else {
            ClaimStatus::Duplicate
        }
    }

    /// Whether `source` was parried.
    #[must_use]
    pub fn is_cancelled(&self, source: HitSource) -> bool {
        self.sets.get(&source).is_some_and(|set| set.cancelled)
    }

    /// Whether `source` has no set and belongs to an activation at or before
    /// one that was already pruned.
    #[must_use]
    pub fn is_expired(&self, source: HitSource) -> bool {
        if self.sets.contains_key(&source) {
            return false;
        }
        source
            .activation()
            .is_some_and(|(owner, seq)| self.pruned_through.get(&owner).is_some_and(|&last| seq <= last))
    }

    /// Whether `source` already hit `target`.
    #[must_use]
    pub fn contains(&self, source: HitSource, target: EntityId) -> bool {
        self.sets
            .get(&source)
            .is_some_and(|set| set.targets.contains(&target))
    }

    /// Whether `source` has an open set.
    #[must_use]
    pub fn is_open(&self, source: HitSource) -> bool {
        self.sets.get(&source).is_some_and(|set| set.closed_at.is_none())
    }

    /// Drops sets closed more than `retention` seconds ago.
    pub fn prune(&mut self, now: f64, retention: f32) {
        let retention = f64::from(retention);
        let pruned_through = &mut self.pruned_through;
        self.sets.retain(|source, set| {
            let keep = set.closed_at.map_or(true, |closed| now - closed <= retention);
            if !keep {
                if let Some((owner, seq)) = source.activation() {
                    let last = pruned_through.entry(owner).or_insert(seq);
                    *last = (*last).max(seq);
                }
            }
            keep
        });
    }

    /// Forgets an owner's pruned history, for a despawned entity.
    pub fn forget(&mut self, owner: EntityId) {
        self.pruned_through.remove(&owner);
    }

    /// Number of tracked sets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no sets are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

// === Simulation ===

/// One role's view of the fight.
pub struct Simulation<W: Environment> {
    pub(crate) tuning: CombatTuning,
    pub(crate) world: W,
    pub(crate) arena: Arena,
    pub(crate) role: Role,
    pub(crate) regions: Arc<RegionTable>,
    pub(crate) now: f64,
    pub(crate) ticks: u64,
    pub(crate) swings: SwingLedger,
    pub(crate) projectiles: Vec<Projectile>,
    pub(crate) next_blast: u64,
    pub(crate) bus: NotificationBus,
    pub(crate) outbound: Vec<Outbound>,
    pub(crate) predictions: PredictionLedger,
    pub(crate) next_sequence: u32,
    pub(crate) broadcast_clock: f32,
    pub(crate) synced: AHashMap<EntityId, StateId>,
}

impl<W: Environment> Simulation<W> {
    /// Creates an empty simulation. Fails on invalid tuning.
    pub fn new(role: Role, tuning: CombatTuning, world: W) -> RiposteResult<Self> {
        tuning.validate()?;
        let regions = Arc::new(RegionTable::humanoid(&tuning));
        info!(?role, tick_rate = tuning.tick_rate, "simulation created");
        Ok(Self {
            tuning,
            world,
            arena: Arena::new(),
            role,
            regions,
            now: 0.0,
            ticks: 0,
            swings: SwingLedger::new(),
            projectiles: Vec::new(),
            next_blast: 0,
            bus: NotificationBus::default(),
            outbound: Vec::new(),
            predictions: PredictionLedger::new(),
            next_sequence: 0,
            broadcast_clock: 0.0,
            synced: AHashMap::new(),
        })
    }

    // === Accessors ===

    /// Role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Gameplay constants.
    #[must_use]
    pub fn tuning(&self) -> &CombatTuning {
        &self.tuning
    }

    /// Static geometry.
    #[must_use]
    pub fn world(&self) -> &W {
        &self.world
    }

    /// Simulation clock in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Ticks run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Entity roster.
    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Entity by id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.arena.get(id)
    }

    /// Mutable entity by id.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.arena.get_mut(id)
    }

    /// Entity id by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.arena.find_by_name(name)
    }

    /// Projectiles in flight.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Hit-dedup ledger.
    #[must_use]
    pub fn swings(&self) -> &SwingLedger {
        &self.swings
    }

    /// Pending predicted hits (client).
    #[must_use]
    pub fn predictions(&self) -> &PredictionLedger {
        &self.predictions
    }

    /// Presentation notifications.
    #[must_use]
    pub fn notifications(&self) -> &NotificationBus {
        &self.bus
    }

    /// Takes the messages queued for the transport.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    // === Roster ===

    /// Adds an entity in the idle state.
    pub fn spawn(&mut self, spawn: Spawn) -> Result<EntityId, ArenaError> {
        let Spawn {
            name,
            position,
            yaw,
            vitals,
            loadout,
            player_controlled,
        } = spawn;
        let regions = Arc::clone(&self.regions);

        let id = self.arena.spawn(&name, |id| {
            let actor = Actor::new(id, position, regions)
                .with_yaw(yaw)
                .with_vitals(vitals)
                .with_loadout(loadout);
            let entity = Entity::new(name.clone(), actor, INPUT_CAPACITY);
            if player_controlled {
                entity.player()
            } else {
                entity
            }
        })?;

        info!(entity = %id, %name, player = player_controlled, "spawned");
        Ok(id)
    }

    /// Removes an entity.
    pub fn despawn(&mut self, id: EntityId) -> Result<Entity, ArenaError> {
        self.synced.remove(&id);
        self.swings.forget(id);
        self.arena.despawn(id)
    }

    /// Brings an entity back at `position`: full vitals, no hit reactions,
    /// idle. The only way out of the dead state.
    pub fn respawn(&mut self, id: EntityId, position: Vec3) -> Result<(), ArenaError> {
        let env = MachineEnv {
            tuning: &self.tuning,
            world: &self.world,
            now: self.now,
            remote_driven: false,
        };
        let entity = self.arena.get_mut(id).ok_or(ArenaError::NotFound(id))?;
        entity.actor.reset(position);
        entity
            .machine
            .change_state(&mut entity.actor, &env, StateId::Idle, true);
        info!(entity = %id, ?position, "respawned");
        Ok(())
    }

    // === Input ===

    /// Feeds one tick of input to an entity.
    ///
    /// On a client only the local entity accepts input, and the frame is also
    /// queued for replay on the server.
    pub fn submit_input(&mut self, id: EntityId, frame: InputFrame) -> bool {
        if let Role::Client { local } = self.role {
            if id != local {
                debug!(entity = %id, "input for a non-local entity ignored");
                return false;
            }
            self.outbound.push(Outbound {
                to: Recipient::Server,
                message: Message::InputReplay {
                    frame: frame.clone(),
                },
            });
        }
        self.apply_frame(id, &frame)
    }

    pub(crate) fn apply_frame(&mut self, id: EntityId, frame: &InputFrame) -> bool {
        let Some(entity) = self.arena.get_mut(id) else {
            debug!(entity = %id, "input for unknown entity dropped");
            return false;
        };
        entity.actor.controls.movement = frame.movement;
        entity.actor.controls.block_held = frame.block_held;
        for &(action, data) in &frame.actions {
            entity.machine.buffer_input(action, data);
        }
        true
    }

    // === Network ===

    /// Handles a message from `from`. Messages the role does not expect are
    /// ignored.
    pub fn handle_message(&mut self, from: Peer, message: Message) {
        match (self.role, message) {
            (Role::Server, Message::InputReplay { frame }) => self.replay_input(from, &frame),
            (Role::Server, Message::WallJumpReplay { wall_normal }) => {
                self.replay_wall_jump(from, wall_normal);
            }
            (Role::Server, Message::HitValidationRequest(request)) => {
                self.validate_hit(from, &request);
            }
            (
                Role::Client { .. },
                Message::HitValidationResult {
                    sequence,
                    target_id,
                    accepted,
                    final_damage,
                },
            ) => self.apply_validation_result(sequence, target_id, accepted, final_damage),
            (Role::Client { .. }, Message::EntityStateBroadcast(state)) => {
                self.apply_broadcast(&state);
            }
            (role, message) => {
                debug!(?role, ?from, kind = message.kind(), "unexpected message ignored");
            }
        }
    }

    /// Decodes a frame off the transport and handles the message in it.
    pub fn receive_frame(&mut self, from: Peer, frame: &[u8]) -> RiposteResult<()> {
        let message = decode_message(frame)?;
        self.handle_message(from, message);
        Ok(())
    }

    // === Tick ===

    /// Advances the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.ticks += 1;
        self.now += f64::from(dt);

        let ids = self.arena.ids();
        let choreography = Choreography::new(&self.tuning);
        for id in &ids {
            if let Some(entity) = self.arena.get_mut(*id) {
                choreography.tick(&mut entity.actor, dt);
                entity.actor.vitals.regenerate(dt, self.tuning.stamina_regen);
            }
        }
        for id in ids {
            self.step_entity(id, dt);
        }
        self.step_projectiles(dt);
        self.swings.prune(self.now, self.tuning.swing_retention);

        match self.role {
            Role::Server => self.broadcast_states(dt),
            Role::Client { .. } => self.expire_predictions(),
        }
    }

    fn step_entity(&mut self, id: EntityId, dt: f32) {
        let remote_driven = self.role.is_server();
        let Some(entity) = self.arena.get_mut(id) else {
            return;
        };

        if !entity.actor.status.is_frozen() {
            let env = MachineEnv {
                tuning: &self.tuning,
                world: &self.world,
                now: self.now,
                remote_driven: remote_driven && entity.player_controlled,
            };
            entity.machine.tick(&mut entity.actor, &env, dt);

            let body = &mut entity.actor.body;
            let moved = self
                .world
                .move_body(body.position, body.velocity, body.extents, dt);
            body.position = moved.position;
            body.velocity = moved.velocity;
            body.grounded = moved.grounded;
        }

        let effects = entity.machine.drain_effects();
        for effect in effects {
            self.process_effect(id, effect);
        }
    }

    fn process_effect(&mut self, owner: EntityId, effect: StateEffect) {
        match effect {
            StateEffect::SwingStarted { swing, combo_step } => {
                self.swings.open(HitSource::Melee { swing, combo_step });
            }
            StateEffect::MeleeSweep {
                swing,
                combo_step,
                shape,
                profile,
                origin,
                forward,
            } => {
                let source = HitSource::Melee { swing, combo_step };
                self.sweep(owner, source, &shape, &profile, origin, forward);
            }
            StateEffect::SwingEnded { swing } => self.swings.close_swing(swing, self.now),
            StateEffect::FireProjectile {
                origin,
                direction,
                profile,
            } => self.spawn_projectile(owner, origin, direction, profile),
            StateEffect::WallJump { normal } => {
                if matches!(self.role, Role::Client { local } if local == owner) {
                    self.outbound.push(Outbound {
                        to: Recipient::Server,
                        message: Message::WallJumpReplay { wall_normal: normal },
                    });
                }
            }
            StateEffect::Notify(notification) => self.bus.publish(notification),
        }
    }

    // === Hits ===

    pub(crate) fn hit_mode(&self, attacker: EntityId) -> HitMode {
        match self.role {
            Role::Server => {
                if self.arena.get(attacker).is_some_and(|e| e.player_controlled) {
                    HitMode::AwaitValidation
                } else {
                    HitMode::Authoritative
                }
            }
            Role::Client { local } => {
                if attacker == local {
                    HitMode::Predicted
                } else {
                    HitMode::Observer
                }
            }
        }
    }

    fn sweep(
        &mut self,
        attacker: EntityId,
        source: HitSource,
        shape: &Shape,
        profile: &SwingProfile,
        origin: Vec3,
        forward: Vec3,
    ) {
        let mode = self.hit_mode(attacker);
        if mode == HitMode::AwaitValidation || self.swings.is_cancelled(source) {
            return;
        }

        let t = &self.tuning;
        let direction = Vec3::new(forward.x, 0.0, forward.z).normalize_or_zero() + Vec3::Y * profile.lift;
        let hitstun = or_default(profile.hitstun, t.default_hitstun);
        let hitlag = or_default(profile.hitlag, t.default_hitlag);

        let overlaps = self
            .arena
            .overlapping(shape, CollisionCategory::Hurtbox, attacker);
        for overlap in overlaps {
            if !self.swings.try_hit(source, overlap.entity) {
                trace!(%attacker, target = %overlap.entity, "already hit by this swing");
                continue;
            }
            let mut event = HitEvent::new(attacker, overlap.entity, profile.damage, source)
                .with_origin(origin)
                .with_knockback(profile.knockback, direction)
                .with_timing(hitstun, hitlag)
                .with_damage_type(profile.damage_type);
            event.region = overlap.region;

            let parried = self
                .deliver_hit(event, mode, overlap.point)
                .is_some_and(|outcome| outcome.parried);
            if parried {
                break;
            }
        }
    }

    /// Routes one hit through the resolver according to `mode`.
    ///
    /// Missing or dead targets drop the hit silently.
    pub(crate) fn deliver_hit(&mut self, mut event: HitEvent, mode: HitMode, point: Vec3) -> Option<HitOutcome> {
        let Some(target) = self.arena.get(event.target) else {
            debug!(attacker = %event.attacker, target = %event.target, "hit dropped: target not found");
            return None;
        };
        if target.actor.is_dead() {
            debug!(target = %event.target, "hit dropped: target already dead");
            return None;
        }

        match mode {
            HitMode::AwaitValidation => return None,
            HitMode::Observer => {
                self.bus.publish(Notification::PredictedHit {
                    attacker: event.attacker,
                    target: event.target,
                    point,
                });
                return None;
            }
            HitMode::Authoritative | HitMode::Predicted => {}
        }

        let target_name = target.name.clone();
        let before = (target.actor.vitals.health, target.actor.vitals.shields);
        let outcome = HitResolver::new(&self.tuning).process_hit(&mut event, &target.actor, self.now);
        self.apply_outcome(&outcome);

        if outcome.parried {
            if let HitSource::Melee { swing, .. } = event.source {
                self.swings.cancel_swing(swing, self.now);
            }
        }

        if mode == HitMode::Predicted {
            let after = self
                .arena
                .get(event.target)
                .map_or(before, |e| (e.actor.vitals.health, e.actor.vitals.shields));
            self.record_prediction(&event, &outcome, target_name, before, after);
        }

        Some(outcome)
    }

    /// The single mutation path for hits: stats, timing, forced transitions
    /// and notifications.
    fn apply_outcome(&mut self, outcome: &HitOutcome) {
        let tuning = &self.tuning;
        let resolver = HitResolver::new(tuning);
        let choreography = Choreography::new(tuning);
        let env = MachineEnv {
            tuning,
            world: &self.world,
            now: self.now,
            remote_driven: false,
        };

        let Some(target) = self.arena.get_mut(outcome.target) else {
            return;
        };
        let applied = resolver.apply(&mut target.actor, outcome);
        choreography.strike_target(
            &mut target.actor,
            HitTiming {
                hitlag: outcome.hitlag,
                hitstun: outcome.hitstun,
                knockback: outcome.knockback,
            },
        );

        if applied.killed {
            target
                .machine
                .change_state(&mut target.actor, &env, StateId::Dead, true);
        } else if outcome.hitstun > 0.0 {
            target
                .machine
                .change_state(&mut target.actor, &env, StateId::Stunned, false);
        }

        if outcome.hitlag > 0.0 {
            if let Some(attacker) = self.arena.get_mut(outcome.attacker) {
                choreography.freeze_attacker(&mut attacker.actor, outcome.hitlag);
            }
        }

        debug!(
            attacker = %outcome.attacker,
            target = %outcome.target,
            region = outcome.region.as_deref().unwrap_or("-"),
            damage = outcome.final_damage,
            blocked = outcome.blocked,
            parried = outcome.parried,
            killed = applied.killed,
            "hit applied"
        );

        if outcome.parried {
            self.bus.publish(Notification::Parried {
                attacker: outcome.attacker,
                defender: outcome.target,
            });
            return;
        }

        self.bus.publish(Notification::Hit {
            attacker: outcome.attacker,
            target: outcome.target,
            category: outcome.category,
            damage: outcome.final_damage,
            blocked: outcome.blocked,
        });
        if outcome.final_damage > 0.0 {
            self.bus.publish(Notification::Vibrate {
                entity: outcome.target,
                duration: or_default(outcome.hitlag, tuning.default_hitlag),
            });
        }
        if outcome.critical {
            self.bus.publish(Notification::Critical {
                attacker: outcome.attacker,
                target: outcome.target,
            });
        }
        if let Some(weapon) = applied.dropped_weapon {
            self.bus.publish(Notification::WeaponDropped {
                entity: outcome.target,
                weapon,
            });
        }
        if let Some(slow) = outcome.slow {
            self.bus.publish(Notification::Slowed {
                entity: outcome.target,
                duration: slow.duration,
            });
        }
    }

    fn record_prediction(
        &mut self,
        event: &HitEvent,
        outcome: &HitOutcome,
        target_name: String,
        before: (f32, f32),
        after: (f32, f32),
    ) {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        self.predictions.record(PredictedHit {
            sequence,
            attacker: event.attacker,
            target: event.target,
            source: event.source,
            predicted_damage: outcome.final_damage,
            health_taken: (before.0 - after.0).max(0.0),
            shields_taken: (before.1 - after.1).max(0.0),
            predicted_at: self.now,
        });

        self.outbound.push(Outbound {
            to: Recipient::Server,
            message: Message::HitValidationRequest(HitValidationRequest {
                sequence,
                target_id: event.target,
                target_name,
                source: event.source,
                damage: outcome.final_damage,
                damage_type: event.damage_type,
                knockback_force: event.knockback_force,
                knockback_direction: event.knockback_direction,
                hitstun: event.hitstun,
                region: event.region.clone(),
                timestamp: self.now,
            }),
        });
        trace!(sequence, target = %event.target, "hit predicted");
    }

    // === Projectiles ===

    fn spawn_projectile(&mut self, owner: EntityId, origin: Vec3, direction: Vec3, profile: ProjectileProfile) {
        let Some(entity) = self.arena.get_mut(owner) else {
            return;
        };
        let seq = entity.actor.next_swing_seq();
        let id = (owner.raw() << 32) | u64::from(seq);

        self.swings.open(HitSource::Projectile { id });
        self.projectiles.push(Projectile {
            id,
            owner,
            position: origin,
            velocity: direction.normalize_or_zero() * profile.speed,
            profile,
            age: 0.0,
        });
        trace!(%owner, id, "projectile fired");
    }

    fn step_projectiles(&mut self, dt: f32) {
        let mut flying = std::mem::take(&mut self.projectiles);
        flying.retain_mut(|projectile| self.advance_projectile(projectile, dt));
        flying.append(&mut self.projectiles);
        self.projectiles = flying;
    }

    /// Moves one projectile. False once it is spent.
    fn advance_projectile(&mut self, p: &mut Projectile, dt: f32) -> bool {
        let source = HitSource::Projectile { id: p.id };
        p.age += dt;
        if p.age >= p.profile.lifetime {
            self.swings.close(source, self.now);
            return false;
        }

        let step = p.velocity * dt;
        if let Some(direction) = step.try_normalize() {
            if self
                .world
                .probe(p.position, direction, step.length() + p.profile.radius)
                .is_some()
            {
                trace!(id = p.id, "projectile hit geometry");
                self.swings.close(source, self.now);
                return false;
            }
        }
        let next = p.position + step;

        let shape = Shape::Sphere {
            center: next,
            radius: p.profile.radius,
        };
        let struck = self
            .arena
            .overlapping(&shape, CollisionCategory::Hurtbox, p.owner)
            .into_iter()
            .filter(|o| !self.swings.contains(source, o.entity))
            .min_by(|a, b| a.distance.total_cmp(&b.distance));
        let Some(overlap) = struck else {
            p.position = next;
            return true;
        };

        let mode = self.hit_mode(p.owner);
        if mode == HitMode::AwaitValidation {
            self.swings.close(source, self.now);
            return false;
        }
        self.swings.try_hit(source, overlap.entity);

        let t = &self.tuning;
        let mut event = HitEvent::new(p.owner, overlap.entity, p.profile.damage, source)
            .with_origin(p.position)
            .with_knockback(p.profile.knockback, p.velocity)
            .with_timing(
                or_default(p.profile.hitstun, t.default_hitstun),
                or_default(p.profile.hitlag, t.default_hitlag),
            )
            .with_damage_type(p.profile.damage_type);
        event.region = overlap.region;

        let reflected = self
            .deliver_hit(event, mode, overlap.point)
            .is_some_and(|outcome| outcome.reflect);
        if reflected {
            p.owner = overlap.entity;
            p.velocity = -p.velocity;
            p.age = 0.0;
            self.bus.publish(Notification::ProjectileReflected { by: overlap.entity });
            debug!(id = p.id, by = %overlap.entity, "projectile reflected");
            return true;
        }

        self.swings.close(source, self.now);
        false
    }

    // === Explosions ===

    /// Sets off an area blast. Every body in range is hit once; the source is
    /// never hit by its own blast. Returns the blast id.
    pub fn detonate(&mut self, mut blast: Blast) -> u64 {
        self.next_blast += 1;
        blast.id = self.next_blast;
        let source = HitSource::Explosion { id: blast.id };

        self.bus.publish(Notification::Explosion {
            center: blast.center,
            radius: blast.radius,
        });

        let mode = if self.role.is_server() {
            HitMode::Authoritative
        } else {
            HitMode::Observer
        };
        let events = HitResolver::new(&self.tuning).explosion_hits(&self.arena, &blast);
        debug!(id = blast.id, hits = events.len(), "explosion");

        self.swings.open(source);
        for event in events {
            if !self.swings.try_hit(source, event.target) {
                continue;
            }
            self.deliver_hit(event, mode, blast.center);
        }
        self.swings.close(source, self.now);
        blast.id
    }
}

pub(crate) fn or_default(value: f32, fallback: f32) -> f32 {
    if value > 0.0 {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputAction;
    use crate::physics::FlatWorld;
    use crate::weapon::{MeleeWeapon, RangedWeapon, Weapon};
    use proptest::prelude::*;
    use std::f32::consts::PI;

    const DT: f32 = 1.0 / 60.0;

    fn server() -> Simulation<FlatWorld> {
        Simulation::new(Role::Server, CombatTuning::default(), FlatWorld::new(0.0)).expect("valid tuning")
    }

    fn run(sim: &mut Simulation<FlatWorld>, ticks: usize) {
        for _ in 0..ticks {
            sim.tick(DT);
        }
    }

    /// An AI swordsman at the origin facing +Z, and a dummy in reach facing it.
    fn duel(sim: &mut Simulation<FlatWorld>) -> (EntityId, EntityId) {
        let attacker = sim
            .spawn(
                Spawn::new("attacker", Vec3::ZERO)
                    .with_loadout(Loadout::with_weapon(Weapon::Melee(MeleeWeapon::sword()))),
            )
            .expect("spawn");
        let dummy = sim
            .spawn(Spawn::new("dummy", Vec3::new(0.0, 0.0, 1.2)).with_yaw(PI))
            .expect("spawn");
        (attacker, dummy)
    }

    fn health(sim: &Simulation<FlatWorld>, id: EntityId) -> f32 {
        sim.entity(id).expect("entity").actor.vitals.health
    }

    #[test]
    fn test_swing_hits_once() {
        let mut sim = server();
        let (attacker, dummy) = duel(&mut sim);

        sim.submit_input(attacker, InputFrame::idle().with_action(InputAction::Attack));
        run(&mut sim, 60);

        let hits = sim
            .notifications()
            .drain()
            .into_iter()
            .filter(|n| matches!(n, Notification::Hit { target, .. } if *target == dummy))
            .count();
        assert_eq!(hits, 1);
        assert!(health(&sim, dummy) < 100.0);
    }

    #[test]
    fn test_hit_stuns_and_freezes() {
        let mut sim = server();
        let (attacker, dummy) = duel(&mut sim);

        sim.submit_input(attacker, InputFrame::idle().with_action(InputAction::Attack));
        let mut saw_freeze = false;
        for _ in 0..40 {
            sim.tick(DT);
            if sim.entity(dummy).expect("dummy").machine.current() == StateId::Stunned {
                saw_freeze |= sim.entity(attacker).expect("attacker").actor.status.is_frozen();
                break;
            }
        }
        assert!(saw_freeze);
        assert!(sim.entity(dummy).expect("dummy").actor.status.in_hitstun());
    }

    #[test]
    fn test_ledger_dedups_per_source() {
        let swing = SwingId {
            owner: EntityId::from_raw(1),
            seq: 1,
        };
        let first = HitSource::Melee { swing, combo_step: 0 };
        let second = HitSource::Melee { swing, combo_step: 1 };
        let target = EntityId::from_raw(2);

        let mut ledger = SwingLedger::new();
        ledger.open(first);
        assert!(ledger.try_hit(first, target));
        assert!(!ledger.try_hit(first, target));
        assert!(ledger.try_hit(second, target));

        // Validation may record a hit before the swing is seen to start.
        ledger.open(first);
        assert!(!ledger.try_hit(first, target));
    }

    proptest! {
        #[test]
        fn prop_one_hit_per_target_per_source(targets in proptest::collection::vec(0u64..6, 1..40)) {
            let source = HitSource::Melee { swing: SwingId { owner: EntityId::from_raw(100), seq: 0 }, combo_step: 0 };
            let mut ledger = SwingLedger::new();
            ledger.open(source);

            let applied = targets
                .iter()
                .filter(|&&raw| ledger.try_hit(source, EntityId::from_raw(raw)))
                .count();
            let distinct: AHashSet<u64> = targets.iter().copied().collect();
            prop_assert_eq!(applied, distinct.len());
        }
    }

    #[test]
    fn test_ledger_retains_closed_sets() {
        let source = HitSource::Projectile { id: 9 };
        let target = EntityId::from_raw(3);
        let mut ledger = SwingLedger::new();
        ledger.open(source);
        ledger.try_hit(source, target);
        ledger.close(source, 1.0);

        ledger.prune(2.0, 2.0);
        assert!(ledger.contains(source, target));
        assert!(!ledger.is_open(source));

        ledger.prune(3.5, 2.0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_ledger_claims_expire_and_stay_expired() {
        let owner = EntityId::from_raw(1);
        let target = EntityId::from_raw(2);
        let early = HitSource::Melee { swing: SwingId { owner, seq: 3 }, combo_step: 0 };
        let later = HitSource::Melee { swing: SwingId { owner, seq: 4 }, combo_step: 0 };

        let mut ledger = SwingLedger::new();
        assert_eq!(ledger.claim(early, target, 0.0), ClaimStatus::Recorded);
        assert!(!ledger.is_open(early));
        assert_eq!(ledger.claim(early, target, 0.5), ClaimStatus::Duplicate);

        ledger.prune(5.0, 2.0);
        assert!(ledger.is_empty());
        assert_eq!(ledger.claim(early, target, 5.0), ClaimStatus::Expired);
        assert_eq!(ledger.claim(later, target, 5.0), ClaimStatus::Recorded);

        ledger.cancel_swing(SwingId { owner, seq: 4 }, 5.0);
        assert!(!ledger.try_hit(later, EntityId::from_raw(3)));
        assert_eq!(ledger.claim(later, EntityId::from_raw(3), 5.0), ClaimStatus::Cancelled);
    }

    #[test]
    fn test_missing_target_is_dropped() {
        let mut sim = server();
        let (attacker, _) = duel(&mut sim);
        let ghost = EntityId::from_raw(99);
        let event = HitEvent::new(attacker, ghost, 30.0, HitSource::Explosion { id: 1 });

        assert!(sim.deliver_hit(event, HitMode::Authoritative, Vec3::ZERO).is_none());
    }

    #[test]
    fn test_lethal_hit_forces_dead() {
        let mut sim = server();
        let (attacker, dummy) = duel(&mut sim);
        sim.entity_mut(dummy).expect("dummy").actor.vitals.health = 5.0;

        sim.submit_input(attacker, InputFrame::idle().with_action(InputAction::Attack));
        run(&mut sim, 60);

        let entity = sim.entity(dummy).expect("dummy");
        assert_eq!(entity.machine.current(), StateId::Dead);
        assert!(entity.actor.vitals.health.abs() < f32::EPSILON);

        let deaths = sim
            .notifications()
            .drain()
            .into_iter()
            .filter(|n| matches!(n, Notification::Died { .. }))
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn test_respawn_leaves_dead() {
        let mut sim = server();
        let (_, dummy) = duel(&mut sim);
        let entity = sim.entity_mut(dummy).expect("dummy");
        entity.actor.vitals.health = 0.0;
        assert!(entity.actor.is_dead());

        sim.respawn(dummy, Vec3::new(3.0, 0.0, 3.0)).expect("respawn");
        let entity = sim.entity(dummy).expect("dummy");
        assert_eq!(entity.machine.current(), StateId::Idle);
        assert!((entity.actor.vitals.health - entity.actor.vitals.max_health).abs() < f32::EPSILON);
        assert_eq!(entity.actor.body.position, Vec3::new(3.0, 0.0, 3.0));

        assert_eq!(
            sim.respawn(EntityId::from_raw(42), Vec3::ZERO),
            Err(ArenaError::NotFound(EntityId::from_raw(42)))
        );
    }

    #[test]
    fn test_explosion_spares_source_and_falls_off() {
        let mut sim = server();
        let bomber = sim.spawn(Spawn::new("bomber", Vec3::ZERO)).expect("spawn");
        let near = sim.spawn(Spawn::new("near", Vec3::new(1.0, 0.0, 0.0))).expect("spawn");
        let far = sim.spawn(Spawn::new("far", Vec3::new(0.0, 0.0, 3.5))).expect("spawn");
        let outside = sim.spawn(Spawn::new("outside", Vec3::new(-9.0, 0.0, 0.0))).expect("spawn");

        sim.detonate(Blast {
            source: bomber,
            id: 0,
            center: Vec3::new(0.0, 0.9, 0.0),
            radius: 4.0,
            damage: 40.0,
            knockback: 10.0,
            lift: 0.5,
            hitstun: 0.4,
        });

        assert!((health(&sim, bomber) - 100.0).abs() < f32::EPSILON);
        assert!((health(&sim, outside) - 100.0).abs() < f32::EPSILON);
        let near_loss = 100.0 - health(&sim, near);
        let far_loss = 100.0 - health(&sim, far);
        assert!(near_loss > far_loss);
        assert!(far_loss > 0.0);
        assert!(sim.entity(near).expect("near").actor.status.in_knockback());
    }

    #[test]
    fn test_projectile_hits_and_is_spent() {
        let mut sim = server();
        let archer = sim
            .spawn(
                Spawn::new("archer", Vec3::ZERO)
                    .with_loadout(Loadout::with_weapon(Weapon::Ranged(RangedWeapon::crossbow()))),
            )
            .expect("spawn");
        let target = sim
            .spawn(Spawn::new("target", Vec3::new(0.0, 0.0, 6.0)).with_yaw(PI))
            .expect("spawn");

        sim.submit_input(archer, InputFrame::idle().with_action(InputAction::Attack));
        run(&mut sim, 60);

        assert!(health(&sim, target) < 100.0);
        assert!(sim.projectiles().is_empty());
    }

    #[test]
    fn test_client_ignores_remote_input() {
        let local = EntityId::from_raw(1);
        let mut sim = Simulation::new(Role::Client { local }, CombatTuning::default(), FlatWorld::new(0.0))
            .expect("valid tuning");
        let me = sim.spawn(Spawn::new("me", Vec3::ZERO).player()).expect("spawn");
        let other = sim.spawn(Spawn::new("other", Vec3::X * 5.0)).expect("spawn");
        assert_eq!(me, local);

        assert!(!sim.submit_input(other, InputFrame::idle().with_action(InputAction::Attack)));
        assert!(sim.submit_input(me, InputFrame::idle().with_movement(Vec3::X)));

        let outbound = sim.drain_outbound();
        assert_eq!(outbound.len(), 1);
        assert!(matches!(outbound[0].message, Message::InputReplay { .. }));
    }

    #[test]
    fn test_receive_frame_decodes_or_reports() {
        let mut sim = server();
        let (attacker, _) = duel(&mut sim);
        let frame = crate::protocol::encode_message(&Message::InputReplay {
            frame: InputFrame::idle().with_action(InputAction::Attack),
        })
        .expect("encode");

        assert!(matches!(
            sim.receive_frame(Peer::Client(attacker), b"NOPE\x01"),
            Err(riposte_common::RiposteError::Protocol(_))
        ));
        sim.receive_frame(Peer::Server, &frame).expect("valid frame");
        assert_eq!(sim.entity(attacker).expect("attacker").machine.buffered_len(), 0);
    }

    #[test]
    fn test_invalid_tuning_is_rejected() {
        let tuning = CombatTuning {
            tick_rate: -1.0,
            ..CombatTuning::default()
        };
        assert!(matches!(
            Simulation::new(Role::Server, tuning, FlatWorld::new(0.0)),
            Err(riposte_common::RiposteError::Config(_))
        ));
    }
}
