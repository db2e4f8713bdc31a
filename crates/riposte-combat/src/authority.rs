//! Server-side handling of client messages.
//!
//! Clients only claim that a hit landed. The server checks the claim against
//! its own state and, if it holds, resolves the hit from its own weapon data
//! through the same resolver the rest of the simulation uses.

use glam::Vec3;
use riposte_common::EntityId;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::entity::Entity;
use crate::input::{InputAction, InputData, InputFrame};
use crate::physics::{Environment, Shape};
use crate::protocol::{EntityStateBroadcast, HitValidationRequest, Message, Outbound, Peer, Recipient};
use crate::resolver::{HitEvent, HitSource};
use crate::simulation::{or_default, ClaimStatus, HitMode, Simulation};
use crate::states::{muzzle, swing_volume};

/// Why a hit claim was turned down.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationRejection {
    /// Sender is not a client with a live entity
    #[error("sender has no live entity")]
    Attacker,

    /// Claim is older than the validation window
    #[error("claim is {age:.3}s old")]
    Stale {
        /// Age in seconds
        age: f64,
    },

    /// Timestamp is not finite or lies too far ahead of the server clock
    #[error("unusable claim timestamp")]
    BadTimestamp,

    /// The activation's hit set was already pruned
    #[error("activation already expired")]
    Expired,

    /// Neither the id nor the name resolves
    #[error("unknown target {0}")]
    UnknownTarget(String),

    /// Attacker claimed to hit itself
    #[error("self hit")]
    SelfHit,

    /// Target is already dead
    #[error("target already dead")]
    TargetDead,

    /// The hit source belongs to someone else
    #[error("source not owned by the sender")]
    ForeignSource,

    /// The attacker holds nothing that could have dealt the hit
    #[error("no weapon profile for the claimed source")]
    NoProfile,

    /// Target was too far away
    #[error("target {distance:.2} away, limit {limit:.2}")]
    OutOfReach {
        /// Distance between the bodies
        distance: f32,
        /// Largest distance allowed
        limit: f32,
    },

    /// Static geometry stands between attacker and target
    #[error("line of sight blocked")]
    Occluded,

    /// The source already hit this target
    #[error("source already hit this target")]
    Duplicate,

    /// The source was parried
    #[error("source was parried")]
    Cancelled,

    /// Sources clients may not claim
    #[error("source cannot be claimed by a client")]
    Unsupported,
}

impl<W: Environment> Simulation<W> {
    // === Validation ===

    /// Checks a client's hit claim and resolves it if it holds. The verdict
    /// goes back to the sender either way.
    pub(crate) fn validate_hit(&mut self, from: Peer, request: &HitValidationRequest) {
        let Peer::Client(attacker) = from else {
            warn!(sequence = request.sequence, "hit claim not sent by a client");
            return;
        };

        let (target, final_damage, accepted) = match self.check_claim(attacker, request) {
            Ok((event, point)) => {
                let target = event.target;
                let outcome = self.deliver_hit(event, HitMode::Authoritative, point);
                let final_damage = outcome.as_ref().map_or(0.0, |o| o.final_damage);
                info!(
                    sequence = request.sequence,
                    %attacker,
                    %target,
                    claimed = request.damage,
                    final_damage,
                    "hit claim accepted"
                );
                (target, final_damage, outcome.is_some())
            }
            Err(rejection) => {
                info!(sequence = request.sequence, %attacker, target = %request.target_id, %rejection, "hit claim rejected");
                (request.target_id, 0.0, false)
            }
        };

        self.outbound.push(Outbound {
            to: Recipient::Client(attacker),
            message: Message::HitValidationResult {
                sequence: request.sequence,
                target_id: target,
                accepted,
                final_damage,
            },
        });
    }

    /// Rebuilds the claimed hit from server-held state.
    ///
    /// The claimed region is kept only if the server's own hit volume for the
    /// source reaches it; otherwise the resolver's fallback region applies.
    fn check_claim(
        &mut self,
        attacker: EntityId,
        request: &HitValidationRequest,
    ) -> Result<(HitEvent, Vec3), ValidationRejection> {
        let t = &self.tuning;

        if !request.timestamp.is_finite() {
            return Err(ValidationRejection::BadTimestamp);
        }
        let age = self.now - request.timestamp;
        let max_age = f64::from(t.max_validation_age);
        if age > max_age {
            return Err(ValidationRejection::Stale { age });
        }
        if age < -max_age {
            return Err(ValidationRejection::BadTimestamp);
        }
        if self.swings.is_expired(request.source) {
            return Err(ValidationRejection::Expired);
        }

        let shooter = self
            .arena
            .get(attacker)
            .filter(|e| !e.actor.is_dead())
            .ok_or(ValidationRejection::Attacker)?;

        let target_id = if self.arena.get(request.target_id).is_some() {
            request.target_id
        } else {
            self.arena
                .find_by_name(&request.target_name)
                .ok_or_else(|| ValidationRejection::UnknownTarget(request.target_name.clone()))?
        };
        if target_id == attacker {
            return Err(ValidationRejection::SelfHit);
        }
        let target = self
            .arena
            .get(target_id)
            .ok_or_else(|| ValidationRejection::UnknownTarget(request.target_name.clone()))?;
        if target.actor.is_dead() {
            return Err(ValidationRejection::TargetDead);
        }

        let from = shooter.actor.body.center();
        let to = target.actor.body.center();
        let distance = from.distance(to);
        let target_radius = target.actor.body.extents.radius;
        let claimed = request.region.as_deref();

        let (event, region) = match request.source {
            HitSource::Melee { swing, combo_step } => {
                if swing.owner != attacker {
                    return Err(ValidationRejection::ForeignSource);
                }
                let profile = *shooter
                    .actor
                    .loadout
                    .melee()
                    .swing(combo_step)
                    .ok_or(ValidationRejection::NoProfile)?;
                let limit = profile.reach + profile.radius + target_radius + t.validation_tolerance;
                if distance > limit {
                    return Err(ValidationRejection::OutOfReach { distance, limit });
                }

                let volume = match swing_volume(&shooter.actor.body, &profile) {
                    Shape::Sphere { center, radius } => Shape::Sphere {
                        center,
                        radius: radius + t.region_tolerance,
                    },
                    shape => shape,
                };
                let region = reached_region(target, claimed, |center, radius| volume.touches_sphere(center, radius));

                let forward = shooter.actor.body.forward();
                let direction = Vec3::new(forward.x, 0.0, forward.z).normalize_or_zero() + Vec3::Y * profile.lift;
                let event = HitEvent::new(attacker, target_id, profile.damage, request.source)
                    .with_origin(shooter.actor.body.position)
                    .with_knockback(profile.knockback, direction)
                    .with_timing(
                        or_default(profile.hitstun, t.default_hitstun),
                        or_default(profile.hitlag, t.default_hitlag),
                    )
                    .with_damage_type(profile.damage_type);
                (event, region)
            }
            HitSource::Projectile { id } => {
                if id >> 32 != attacker.raw() {
                    return Err(ValidationRejection::ForeignSource);
                }
                let profile = *shooter
                    .actor
                    .loadout
                    .ranged()
                    .ok_or(ValidationRejection::NoProfile)?
                    .projectile();
                let limit = profile.speed * profile.lifetime + target_radius + t.validation_tolerance;
                if distance > limit {
                    return Err(ValidationRejection::OutOfReach { distance, limit });
                }

                let (origin, aim) = muzzle(&shooter.actor.body);
                let slack = profile.radius + t.region_tolerance;
                let region = reached_region(target, claimed, |center, radius| {
                    let along = (center - origin).dot(aim).max(0.0);
                    (origin + aim * along).distance(center) <= radius + slack
                });

                let event = HitEvent::new(attacker, target_id, profile.damage, request.source)
                    .with_origin(from)
                    .with_knockback(profile.knockback, to - from)
                    .with_timing(
                        or_default(profile.hitstun, t.default_hitstun),
                        or_default(profile.hitlag, t.default_hitlag),
                    )
                    .with_damage_type(profile.damage_type);
                (event, region)
            }
            HitSource::Explosion { .. } => return Err(ValidationRejection::Unsupported),
        };

        if let Some(direction) = (to - from).try_normalize() {
            if self.world.probe(from, direction, distance).is_some() {
                return Err(ValidationRejection::Occluded);
            }
        }

        match self.swings.claim(request.source, target_id, self.now) {
            ClaimStatus::Recorded => {}
            ClaimStatus::Duplicate => return Err(ValidationRejection::Duplicate),
            ClaimStatus::Cancelled => return Err(ValidationRejection::Cancelled),
            ClaimStatus::Expired => return Err(ValidationRejection::Expired),
        }

        let mut event = event;
        event.region = region;
        Ok((event, to))
    }

    // === Replays ===

    pub(crate) fn replay_input(&mut self, from: Peer, frame: &InputFrame) {
        let Peer::Client(id) = from else {
            return;
        };
        if !self.arena.get(id).is_some_and(|e| e.player_controlled) {
            debug!(entity = %id, "input replay for an entity no client drives");
            return;
        }
        self.apply_frame(id, frame);
    }

    /// Buffers a client's wall jump with the normal it sent. The normal is
    /// not checked against geometry.
    pub(crate) fn replay_wall_jump(&mut self, from: Peer, wall_normal: Vec3) {
        let Peer::Client(id) = from else {
            return;
        };
        let Some(normal) = wall_normal.try_normalize() else {
            debug!(entity = %id, "wall jump replay without a normal");
            return;
        };
        let Some(entity) = self.arena.get_mut(id).filter(|e| e.player_controlled) else {
            debug!(entity = %id, "wall jump replay for an entity no client drives");
            return;
        };
        entity
            .machine
            .buffer_input(InputAction::WallJump, InputData::WallNormal(normal));
        trace!(entity = %id, ?normal, "wall jump replayed");
    }

    // === Broadcast ===

    /// Queues a snapshot of every entity once per broadcast interval.
    /// Entities still reeling from a hit are left out until the hit resolves.
    pub(crate) fn broadcast_states(&mut self, dt: f32) {
        let interval = self.tuning.broadcast_interval();
        self.broadcast_clock += dt;
        if self.broadcast_clock < interval {
            return;
        }
        self.broadcast_clock %= interval;

        for entity in self.arena.iter() {
            let actor = &entity.actor;
            if actor.status.in_hitstun() || actor.status.in_knockback() {
                trace!(entity = %actor.id, "broadcast suppressed during hit reaction");
                continue;
            }
            self.outbound.push(Outbound {
                to: Recipient::AllClients,
                message: Message::EntityStateBroadcast(EntityStateBroadcast {
                    entity_id: actor.id,
                    position: actor.body.position,
                    facing_yaw: actor.body.yaw,
                    velocity: actor.body.velocity,
                    health: actor.vitals.health,
                    max_health: actor.vitals.max_health,
                    shields: actor.vitals.shields,
                    state: entity.machine.current(),
                    is_dead: actor.is_dead(),
                }),
            });
        }
    }
}

/// The claimed region, if `reaches` accepts its volume on `target`.
fn reached_region<F>(target: &Entity, claimed: Option<&str>, reaches: F) -> Option<String>
where
    F: Fn(Vec3, f32) -> bool,
{
    let name = claimed?;
    let body = &target.actor.body;
    match target.actor.regions.get(name) {
        Some(region) if reaches(region.volume.world_center(body.position, body.yaw), region.volume.radius) => {
            Some(region.name.clone())
        }
        _ => {
            debug!(target = %target.id(), region = name, "claimed region out of reach, using fallback");
            None
        }
    }
}
