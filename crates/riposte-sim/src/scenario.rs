//! The scripted duel.
//!
//! A player-controlled duelist with a sword, simulated on a predicting client
//! and replayed on the server, fights a server-driven sentinel that blocks and
//! counters on a schedule. Midway the sentinel sets off a blast. Both sides
//! spawn the same roster in the same order so entity ids agree.

use std::f32::consts::PI;

use anyhow::{Context, Result};
use glam::Vec3;
use riposte_combat::{
    Blast, CombatTuning, FlatWorld, InputAction, InputData, InputFrame, Loadout, MeleeWeapon, Message, Notification,
    Peer, Recipient, Role, Simulation, Spawn, StateId, Vitals, Weapon,
};
use riposte_common::EntityId;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::loopback::{Link, LinkStats};

/// Preferred fighting distance for the duelist.
const ENGAGE_DISTANCE: f32 = 1.3;

/// Seconds a dead entity waits before the server respawns it.
const RESPAWN_DELAY: f64 = 1.5;

/// Running counts of what happened.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Tally {
    /// Hits the client predicted for its own player
    pub predicted_hits: u32,
    /// Claims the server accepted
    pub accepted: u32,
    /// Claims the server rejected
    pub rejected: u32,
    /// Hits the server applied
    pub server_hits: u32,
    /// Parries on the server
    pub parries: u32,
    /// Deaths on the server
    pub deaths: u32,
    /// Respawns issued by the server
    pub respawns: u32,
}

/// One entity as a side sees it at the end of the run.
#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    /// Name
    pub name: String,
    /// Health
    pub health: f32,
    /// Active state
    pub state: StateId,
    /// Position
    pub position: [f32; 3],
}

/// End-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Ticks run
    pub ticks: u64,
    /// Simulated seconds
    pub seconds: f64,
    /// Event counts
    pub tally: Tally,
    /// Server view
    pub server: Vec<EntityReport>,
    /// Client view
    pub client: Vec<EntityReport>,
    /// Predictions still waiting for a verdict
    pub pending_predictions: usize,
    /// Largest health difference between the two views
    pub health_divergence: f32,
    /// Client to server traffic
    pub uplink: LinkStats,
    /// Server to client traffic
    pub downlink: LinkStats,
}

/// Server, client and the link between them.
pub struct Duel {
    server: Simulation<FlatWorld>,
    client: Simulation<FlatWorld>,
    uplink: Link,
    downlink: Link,
    duelist: EntityId,
    sentinel: EntityId,
    blast_tick: u64,
    died_at: Vec<(EntityId, f64)>,
    tally: Tally,
}

fn populate(sim: &mut Simulation<FlatWorld>) -> Result<(EntityId, EntityId)> {
    let duelist = sim
        .spawn(
            Spawn::new("duelist", Vec3::ZERO)
                .with_loadout(Loadout::with_weapon(Weapon::Melee(MeleeWeapon::sword())))
                .player(),
        )
        .context("spawning the duelist")?;
    let sentinel = sim
        .spawn(
            Spawn::new("sentinel", Vec3::new(0.0, 0.0, 3.0))
                .with_yaw(PI)
                .with_vitals(Vitals::new(250.0, 50.0, 100.0))
                .with_loadout(Loadout::with_weapon(Weapon::Melee(MeleeWeapon::sword()))),
        )
        .context("spawning the sentinel")?;
    Ok((duelist, sentinel))
}

impl Duel {
    /// Builds both sides from `tuning`.
    pub fn new(config: &SimConfig, tuning: CombatTuning) -> Result<Self> {
        let mut server = Simulation::new(Role::Server, tuning.clone(), FlatWorld::new(0.0))?;
        let (duelist, sentinel) = populate(&mut server)?;

        let mut client = Simulation::new(Role::Client { local: duelist }, tuning, FlatWorld::new(0.0))?;
        let (local, mirrored) = populate(&mut client)?;
        anyhow::ensure!(
            (local, mirrored) == (duelist, sentinel),
            "client roster diverged from the server"
        );

        let blast_tick = (f64::from(config.duration_secs) * 0.5 / f64::from(server.tuning().fixed_dt())) as u64;
        Ok(Self {
            server,
            client,
            uplink: Link::new(config.latency_ticks, config.snapshot_loss, config.seed),
            downlink: Link::new(config.latency_ticks, config.snapshot_loss, config.seed.rotate_left(17)),
            duelist,
            sentinel,
            blast_tick,
            died_at: Vec::new(),
            tally: Tally::default(),
        })
    }

    /// Runs one tick on both sides and moves messages across the link.
    pub fn step(&mut self) -> Result<()> {
        let tick = self.server.ticks();
        let dt = self.server.tuning().fixed_dt();

        let frame = self.duelist_input(tick);
        self.client.submit_input(self.duelist, frame);
        self.client.tick(dt);
        for out in self.client.drain_outbound() {
            self.uplink.send(tick, Peer::Client(self.duelist), &out.message)?;
        }

        for (from, frame) in self.uplink.receive(tick) {
            self.server.receive_frame(from, &frame)?;
        }
        let frame = self.sentinel_input(tick);
        self.server.submit_input(self.sentinel, frame);
        if tick == self.blast_tick {
            self.detonate();
        }
        self.server.tick(dt);
        self.respawn_dead()?;

        for out in self.server.drain_outbound() {
            if matches!(out.to, Recipient::Server) {
                continue;
            }
            if let Message::HitValidationResult { accepted, .. } = out.message {
                if accepted {
                    self.tally.accepted += 1;
                } else {
                    self.tally.rejected += 1;
                }
            }
            self.downlink.send(tick, Peer::Server, &out.message)?;
        }
        for (from, frame) in self.downlink.receive(tick) {
            self.client.receive_frame(from, &frame)?;
        }

        self.count_notifications();
        Ok(())
    }

    /// Walk in, swing on a rhythm, dodge out now and then.
    fn duelist_input(&self, tick: u64) -> InputFrame {
        let Some(me) = self.client.entity(self.duelist) else {
            return InputFrame::idle();
        };
        let Some(foe) = self.client.entity(self.sentinel) else {
            return InputFrame::idle();
        };

        let offset = foe.actor.body.position - me.actor.body.position;
        let flat = Vec3::new(offset.x, 0.0, offset.z);
        let mut frame = if flat.length() > ENGAGE_DISTANCE {
            InputFrame::idle().with_movement(flat.normalize_or_zero())
        } else {
            InputFrame::idle()
        };

        if tick % 180 == 170 {
            frame = frame.with_action_data(InputAction::Dodge, InputData::Direction(-flat.normalize_or_zero()));
        } else if tick % 30 == 0 && flat.length() <= ENGAGE_DISTANCE + 0.4 {
            frame = frame.with_action(InputAction::Attack);
        }
        frame
    }

    /// Guard up for a second out of every three, counter-attack otherwise.
    fn sentinel_input(&self, tick: u64) -> InputFrame {
        let phase = tick % 180;
        if (60..120).contains(&phase) {
            InputFrame::idle().holding_block()
        } else if phase % 50 == 0 {
            InputFrame::idle().with_action(InputAction::Attack)
        } else {
            InputFrame::idle()
        }
    }

    fn detonate(&mut self) {
        let Some(duelist) = self.server.entity(self.duelist) else {
            return;
        };
        let center = duelist.actor.body.center() + Vec3::new(0.5, 0.0, 0.0);
        let id = self.server.detonate(Blast {
            source: self.sentinel,
            id: 0,
            center,
            radius: 3.0,
            damage: 45.0,
            knockback: 8.0,
            lift: 0.6,
            hitstun: 0.4,
        });
        info!(id, ?center, "sentinel blast");
    }

    fn respawn_dead(&mut self) -> Result<()> {
        let now = self.server.now();
        for id in [self.duelist, self.sentinel] {
            let dead = self.server.entity(id).is_some_and(|e| e.actor.is_dead());
            let known = self.died_at.iter().position(|(e, _)| *e == id);
            match (dead, known) {
                (true, None) => self.died_at.push((id, now)),
                (true, Some(i)) if now - self.died_at[i].1 >= RESPAWN_DELAY => {
                    self.died_at.remove(i);
                    let spawn_at = if id == self.duelist {
                        Vec3::ZERO
                    } else {
                        Vec3::new(0.0, 0.0, 3.0)
                    };
                    self.server.respawn(id, spawn_at)?;
                    self.tally.respawns += 1;
                    info!(entity = %id, "respawned");
                }
                (false, Some(i)) => {
                    self.died_at.remove(i);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn count_notifications(&mut self) {
        for n in self.server.notifications().drain() {
            match n {
                Notification::Hit { .. } => self.tally.server_hits += 1,
                Notification::Parried { attacker, defender } => {
                    self.tally.parries += 1;
                    info!(%attacker, %defender, "parry");
                }
                Notification::Died { entity } => {
                    self.tally.deaths += 1;
                    info!(%entity, "died");
                }
                _ => {}
            }
        }
        for n in self.client.notifications().drain() {
            if let Notification::Hit { attacker, target, damage, .. } = n {
                if attacker == self.duelist {
                    self.tally.predicted_hits += 1;
                    debug!(%target, damage, "client predicted hit");
                }
            }
        }
    }

    /// Summarises both views.
    #[must_use]
    pub fn summary(&self) -> Summary {
        let report = |sim: &Simulation<FlatWorld>| -> Vec<EntityReport> {
            sim.arena()
                .iter()
                .map(|e| EntityReport {
                    name: e.name.clone(),
                    health: e.actor.vitals.health,
                    state: e.machine.current(),
                    position: e.actor.body.position.to_array(),
                })
                .collect()
        };

        let health_divergence = [self.duelist, self.sentinel]
            .into_iter()
            .filter_map(|id| {
                let server = self.server.entity(id)?.actor.vitals.health;
                let client = self.client.entity(id)?.actor.vitals.health;
                Some((server - client).abs())
            })
            .fold(0.0, f32::max);

        Summary {
            ticks: self.server.ticks(),
            seconds: self.server.now(),
            tally: self.tally,
            server: report(&self.server),
            client: report(&self.client),
            pending_predictions: self.client.predictions().len(),
            health_divergence,
            uplink: self.uplink.stats(),
            downlink: self.downlink.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(config: &SimConfig, seconds: f32) -> Summary {
        let tuning = CombatTuning::default();
        let ticks = (seconds * tuning.tick_rate) as usize;
        let mut duel = Duel::new(config, tuning).expect("duel");
        for _ in 0..ticks {
            duel.step().expect("step");
        }
        duel.summary()
    }

    #[test]
    fn test_duel_exchanges_blows() {
        let summary = run(&SimConfig::default(), 4.0);
        assert!(summary.tally.predicted_hits > 0);
        assert!(summary.tally.accepted + summary.tally.rejected > 0);
        assert!(summary.uplink.delivered > 0);
        assert_eq!(summary.server.len(), 2);
    }

    #[test]
    fn test_perfect_link_converges() {
        let config = SimConfig {
            latency_ticks: 0,
            snapshot_loss: 0.0,
            ..SimConfig::default()
        };
        let summary = run(&config, 3.0);
        assert_eq!(summary.downlink.dropped, 0);
        assert!(summary.pending_predictions <= 1);
    }
}
