//! Client-side prediction and reconciliation.
//!
//! The local player's own hits are applied at once and recorded here until
//! the server answers. Snapshots of entities with pending hits keep showing
//! the predicted damage on top of the server's values, so a snapshot that
//! left the server before the hit was validated does not flicker the target
//! back to full health.

use ahash::AHashMap;
use glam::Vec3;
use riposte_common::EntityId;
use tracing::{debug, info, trace};

use crate::entity::Vitals;
use crate::physics::Environment;
use crate::protocol::EntityStateBroadcast;
use crate::resolver::HitSource;
use crate::simulation::{Role, Simulation};
use crate::states::{MachineEnv, StateId, Transition};

/// Damage difference under which a prediction counts as confirmed as-is.
const AGREEMENT_EPSILON: f32 = 1e-3;

/// A hit the client applied before the server confirmed it.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedHit {
    /// Client sequence number
    pub sequence: u32,
    /// Attacker (the local entity)
    pub attacker: EntityId,
    /// Target
    pub target: EntityId,
    /// What landed
    pub source: HitSource,
    /// Damage the resolver produced locally
    pub predicted_damage: f32,
    /// Health actually removed
    pub health_taken: f32,
    /// Shields actually removed
    pub shields_taken: f32,
    /// Client time of the hit
    pub predicted_at: f64,
}

impl PredictedHit {
    /// Total health and shields the prediction removed.
    #[must_use]
    pub fn taken(&self) -> f32 {
        self.health_taken + self.shields_taken
    }

    /// Gives back what this prediction removed.
    pub fn rollback(&self, vitals: &mut Vitals) {
        vitals.health = (vitals.health + self.health_taken).min(vitals.max_health);
        vitals.shields = (vitals.shields + self.shields_taken).min(vitals.max_shields);
    }
}

/// How a server verdict compares with the prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    /// The server applied the same damage
    Agreed,
    /// The server applied different damage, possibly none
    Corrected {
        /// Damage the client predicted
        predicted: f32,
        /// Damage the server applied
        authoritative: f32,
    },
}

/// Predicted hits waiting for a verdict.
#[derive(Debug, Clone, Default)]
pub struct PredictionLedger {
    pending: AHashMap<u32, PredictedHit>,
}

impl PredictionLedger {
    /// An empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a prediction.
    pub fn record(&mut self, hit: PredictedHit) {
        self.pending.insert(hit.sequence, hit);
    }

    /// Resolves a prediction with the server's verdict.
    ///
    /// Returns `None` for unknown or already resolved sequences.
    pub fn confirm(
        &mut self,
        sequence: u32,
        accepted: bool,
        final_damage: f32,
    ) -> Option<(PredictedHit, Reconciliation)> {
        let hit = self.pending.remove(&sequence)?;
        let authoritative = if accepted { final_damage } else { 0.0 };
        let verdict = if accepted && (authoritative - hit.predicted_damage).abs() <= AGREEMENT_EPSILON {
            Reconciliation::Agreed
        } else {
            Reconciliation::Corrected {
                predicted: hit.predicted_damage,
                authoritative,
            }
        };
        Some((hit, verdict))
    }

    /// Damage still pending against `target`.
    #[must_use]
    pub fn pending_damage(&self, target: EntityId) -> f32 {
        self.pending
            .values()
            .filter(|hit| hit.target == target)
            .map(PredictedHit::taken)
            .sum()
    }

    /// Layers pending predictions onto freshly received server vitals.
    pub fn on_broadcast(&self, target: EntityId, vitals: &mut Vitals) {
        let pending = self.pending_damage(target);
        if pending > 0.0 {
            vitals.absorb(pending);
        }
    }

    /// Drops predictions older than `timeout` seconds. The next snapshot of
    /// their targets is then taken as-is.
    pub fn expire(&mut self, now: f64, timeout: f32) -> Vec<PredictedHit> {
        let timeout = f64::from(timeout);
        let stale: Vec<u32> = self
            .pending
            .values()
            .filter(|hit| now - hit.predicted_at > timeout)
            .map(|hit| hit.sequence)
            .collect();
        let mut expired: Vec<PredictedHit> = stale
            .into_iter()
            .filter_map(|sequence| self.pending.remove(&sequence))
            .collect();
        expired.sort_by_key(|hit| hit.sequence);
        expired
    }

    /// Number of pending predictions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// A pending prediction by sequence.
    #[must_use]
    pub fn get(&self, sequence: u32) -> Option<&PredictedHit> {
        self.pending.get(&sequence)
    }
}

// === Client message handling ===

impl<W: Environment> Simulation<W> {
    pub(crate) fn apply_validation_result(
        &mut self,
        sequence: u32,
        target_id: EntityId,
        accepted: bool,
        final_damage: f32,
    ) {
        let Some((hit, verdict)) = self.predictions.confirm(sequence, accepted, final_damage) else {
            debug!(sequence, "verdict for unknown prediction ignored");
            return;
        };

        let Reconciliation::Corrected {
            predicted,
            authoritative,
        } = verdict
        else {
            trace!(sequence, target = %target_id, "prediction confirmed");
            return;
        };

        info!(sequence, target = %hit.target, predicted, authoritative, accepted, "prediction corrected");

        let env = MachineEnv {
            tuning: &self.tuning,
            world: &self.world,
            now: self.now,
            remote_driven: false,
        };
        let Some(entity) = self.arena.get_mut(hit.target) else {
            return;
        };
        let was_dead = entity.actor.is_dead();
        hit.rollback(&mut entity.actor.vitals);
        entity.actor.vitals.absorb(authoritative);

        if was_dead && !entity.actor.is_dead() {
            entity
                .machine
                .change_state(&mut entity.actor, &env, StateId::Idle, true);
        }
    }

    /// Adopts a server snapshot.
    ///
    /// The local entity keeps its own motion unless it drifted past the snap
    /// distance. Remote entities take the snapshot as-is, plus any damage
    /// this client predicted against them that the server has not answered.
    pub(crate) fn apply_broadcast(&mut self, state: &EntityStateBroadcast) {
        let Role::Client { local } = self.role else {
            return;
        };
        let id = state.entity_id;
        let is_local = id == local;
        let env = MachineEnv {
            tuning: &self.tuning,
            world: &self.world,
            now: self.now,
            remote_driven: false,
        };
        let Some(entity) = self.arena.get_mut(id) else {
            debug!(entity = %id, "snapshot for unknown entity ignored");
            return;
        };

        let current = entity.machine.current();
        if !state.is_dead && current == StateId::Dead {
            entity.actor.reset(state.position);
            entity
                .machine
                .change_state(&mut entity.actor, &env, StateId::Idle, true);
        }

        let vitals = &mut entity.actor.vitals;
        vitals.max_health = state.max_health.max(0.0);
        vitals.health = state.health.clamp(0.0, vitals.max_health);
        vitals.shields = state.shields.max(0.0);
        if !is_local {
            self.predictions.on_broadcast(id, vitals);
        }

        let body = &mut entity.actor.body;
        if is_local {
            let error = body.position.distance(state.position);
            if error > self.tuning.snap_distance {
                debug!(entity = %id, error, "local entity snapped to server position");
                body.position = state.position;
                body.velocity = state.velocity;
            }
        } else {
            body.position = state.position;
            body.velocity = state.velocity;
            body.yaw = state.facing_yaw;

            let controls = &mut entity.actor.controls;
            let planar = Vec3::new(state.velocity.x, 0.0, state.velocity.z);
            controls.movement = (planar / self.tuning.move_speed).clamp_length_max(1.0);
            controls.block_held = state.state == StateId::Block;
        }

        if state.is_dead {
            if entity.machine.current() != StateId::Dead {
                entity
                    .machine
                    .change_state(&mut entity.actor, &env, StateId::Dead, true);
            }
            return;
        }

        if !is_local {
            // Only a change on the server side starts a state here, so a
            // mirrored swing is not restarted by every snapshot.
            let changed = self.synced.insert(id, state.state) != Some(state.state);
            if changed && entity.machine.current() != state.state {
                let adopted = entity.machine.transition(
                    &mut entity.actor,
                    &env,
                    Transition::to(state.state),
                    true,
                );
                trace!(entity = %id, state = %state.state, adopted, "mirrored state");
            }
        }
    }

    pub(crate) fn expire_predictions(&mut self) {
        let expired = self
            .predictions
            .expire(self.now, self.tuning.prediction_timeout);
        for hit in expired {
            debug!(sequence = hit.sequence, target = %hit.target, "prediction expired without verdict");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SwingId;

    fn predicted(sequence: u32, target: u64, health_taken: f32, at: f64) -> PredictedHit {
        PredictedHit {
            sequence,
            attacker: EntityId::from_raw(1),
            target: EntityId::from_raw(target),
            source: HitSource::Melee {
                swing: SwingId {
                    owner: EntityId::from_raw(1),
                    seq: sequence,
                },
                combo_step: 0,
            },
            predicted_damage: health_taken,
            health_taken,
            shields_taken: 0.0,
            predicted_at: at,
        }
    }

    #[test]
    fn test_agreement() {
        let mut ledger = PredictionLedger::new();
        ledger.record(predicted(1, 2, 90.0, 0.0));

        let (_, verdict) = ledger.confirm(1, true, 90.0).expect("pending");
        assert_eq!(verdict, Reconciliation::Agreed);
        assert!(ledger.is_empty());
        assert!(ledger.confirm(1, true, 90.0).is_none());
    }

    #[test]
    fn test_rejection_is_a_correction_to_zero() {
        let mut ledger = PredictionLedger::new();
        ledger.record(predicted(4, 2, 90.0, 0.0));

        let (hit, verdict) = ledger.confirm(4, false, 55.0).expect("pending");
        assert_eq!(
            verdict,
            Reconciliation::Corrected {
                predicted: 90.0,
                authoritative: 0.0
            }
        );

        let mut vitals = Vitals::new(100.0, 0.0, 100.0);
        vitals.absorb(90.0);
        hit.rollback(&mut vitals);
        assert!((vitals.health - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_broadcast_keeps_pending_damage() {
        let mut ledger = PredictionLedger::new();
        ledger.record(predicted(1, 2, 30.0, 0.0));
        ledger.record(predicted(2, 2, 20.0, 0.0));
        ledger.record(predicted(3, 5, 70.0, 0.0));

        let mut vitals = Vitals::new(100.0, 0.0, 100.0);
        ledger.on_broadcast(EntityId::from_raw(2), &mut vitals);
        assert!((vitals.health - 50.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_expiry() {
        let mut ledger = PredictionLedger::new();
        ledger.record(predicted(1, 2, 10.0, 0.0));
        ledger.record(predicted(2, 2, 10.0, 0.8));

        let expired = ledger.expire(1.5, 1.0);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].sequence, 1);
        assert!(ledger.get(2).is_some());
        assert!((ledger.pending_damage(EntityId::from_raw(2)) - 10.0).abs() < f32::EPSILON);
    }
}
