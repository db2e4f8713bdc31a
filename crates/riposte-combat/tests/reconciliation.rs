//! A server and a predicting client, linked by hand, one message hop per
//! tick in each direction.

use std::f32::consts::PI;

use glam::Vec3;
use riposte_combat::prelude::*;
use riposte_common::EntityId;

const DT: f32 = 1.0 / 60.0;

struct Match {
    server: Simulation<FlatWorld>,
    client: Simulation<FlatWorld>,
    duelist: EntityId,
    sentinel: EntityId,
}

fn populate(sim: &mut Simulation<FlatWorld>) -> (EntityId, EntityId) {
    let duelist = sim
        .spawn(
            Spawn::new("duelist", Vec3::ZERO)
                .with_loadout(Loadout::with_weapon(Weapon::Melee(MeleeWeapon::sword())))
                .player(),
        )
        .expect("spawn");
    let sentinel = sim
        .spawn(
            Spawn::new("sentinel", Vec3::new(0.0, 0.0, 1.2))
                .with_yaw(PI)
                .with_vitals(Vitals::new(200.0, 0.0, 100.0)),
        )
        .expect("spawn");
    (duelist, sentinel)
}

impl Match {
    fn new(tuning: CombatTuning) -> Self {
        let mut server = Simulation::new(Role::Server, tuning.clone(), FlatWorld::new(0.0)).expect("tuning");
        let (duelist, sentinel) = populate(&mut server);
        let mut client = Simulation::new(Role::Client { local: duelist }, tuning, FlatWorld::new(0.0))
            .expect("tuning");
        let (local, mirrored) = populate(&mut client);
        assert_eq!((local, mirrored), (duelist, sentinel));
        Self {
            server,
            client,
            duelist,
            sentinel,
        }
    }

    /// Client tick, client -> server, server tick, server -> client.
    fn step(&mut self) -> Vec<Message> {
        self.client.tick(DT);
        for out in self.client.drain_outbound() {
            assert_eq!(out.to, Recipient::Server);
            self.server.handle_message(Peer::Client(self.duelist), out.message);
        }

        self.server.tick(DT);
        let mut delivered = Vec::new();
        for out in self.server.drain_outbound() {
            let for_us = match out.to {
                Recipient::AllClients => true,
                Recipient::Client(id) => id == self.duelist,
                Recipient::Server => false,
            };
            if for_us {
                delivered.push(out.message.clone());
                self.client.handle_message(Peer::Server, out.message);
            }
        }
        delivered
    }

    fn attack(&mut self) {
        self.client
            .submit_input(self.duelist, InputFrame::idle().with_action(InputAction::Attack));
    }

    fn health(sim: &Simulation<FlatWorld>, id: EntityId) -> f32 {
        sim.entity(id).expect("entity").actor.vitals.health
    }
}

fn verdict(messages: &[Message]) -> Option<(bool, f32)> {
    messages.iter().find_map(|m| match m {
        Message::HitValidationResult {
            accepted,
            final_damage,
            ..
        } => Some((*accepted, *final_damage)),
        _ => None,
    })
}

#[test]
fn test_agreed_hit_needs_no_correction() {
    let mut m = Match::new(CombatTuning::default());
    m.attack();

    let mut result = None;
    let mut predicted_health = None;
    for _ in 0..60 {
        let messages = m.step();
        if predicted_health.is_none() && Match::health(&m.client, m.sentinel) < 200.0 {
            predicted_health = Some(Match::health(&m.client, m.sentinel));
        }
        if let Some(v) = verdict(&messages) {
            result = Some(v);
            break;
        }
    }

    let (accepted, final_damage) = result.expect("the server should answer the claim");
    let predicted_health = predicted_health.expect("the client should predict the hit");
    assert!(accepted);
    assert!((200.0 - predicted_health - final_damage).abs() < 1e-3);
    assert!(m.client.predictions().is_empty());
    assert!((Match::health(&m.client, m.sentinel) - predicted_health).abs() < 1e-3);

    // Once the hit reaction resolves the server resumes broadcasting the
    // sentinel, and both sides agree.
    for _ in 0..60 {
        m.step();
    }
    let server_health = Match::health(&m.server, m.sentinel);
    assert!((server_health - predicted_health).abs() < 1e-3);
    assert!((Match::health(&m.client, m.sentinel) - server_health).abs() < 1e-3);
}

#[test]
fn test_rejected_hit_is_rolled_back() {
    // Rare broadcasts, so the client swings at where it last saw the sentinel.
    let tuning = CombatTuning {
        broadcast_rate: 2.0,
        ..CombatTuning::default()
    };
    let mut m = Match::new(tuning);
    m.server
        .entity_mut(m.sentinel)
        .expect("sentinel")
        .actor
        .body
        .position = Vec3::new(0.0, 0.0, 8.0);
    m.attack();

    let mut result = None;
    for _ in 0..25 {
        let messages = m.step();
        if let Some(v) = verdict(&messages) {
            result = Some(v);
            break;
        }
    }

    let sentinel = m.sentinel;
    let predicted = m
        .client
        .notifications()
        .drain()
        .into_iter()
        .any(|n| matches!(n, Notification::Hit { target, .. } if target == sentinel));
    assert!(predicted, "the client should predict the hit");
    assert_eq!(result, Some((false, 0.0)));
    assert!((Match::health(&m.client, m.sentinel) - 200.0).abs() < f32::EPSILON);
    assert!((Match::health(&m.server, m.sentinel) - 200.0).abs() < f32::EPSILON);
    assert!(m.client.predictions().is_empty());

    // The next snapshot moves the sentinel to where the server has it.
    for _ in 0..40 {
        m.step();
    }
    let seen = m.client.entity(m.sentinel).expect("sentinel").actor.body.position;
    assert!((seen.z - 8.0).abs() < 0.5);
}

#[test]
fn test_unanswered_prediction_expires() {
    let mut m = Match::new(CombatTuning::default());
    m.attack();

    // Swallow everything the client sends after its input.
    m.client.tick(DT);
    for out in m.client.drain_outbound() {
        m.server.handle_message(Peer::Client(m.duelist), out.message);
    }
    let mut pending = 0;
    for _ in 0..30 {
        m.client.tick(DT);
        m.client.drain_outbound();
        pending = pending.max(m.client.predictions().len());
    }
    assert_eq!(pending, 1);

    for _ in 0..70 {
        m.client.tick(DT);
    }
    assert!(m.client.predictions().is_empty());
}
