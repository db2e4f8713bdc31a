//! In-process transport with latency and snapshot loss.
//!
//! Messages are encoded on send and delivered as raw frames; decoding is the
//! receiving simulation's job. Snapshots are unreliable and may be dropped;
//! everything else always arrives, in order.

use std::collections::VecDeque;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use riposte_combat::{encode_message, Message, Peer};
use serde::Serialize;
use tracing::trace;

/// A frame in flight.
#[derive(Debug)]
struct Packet {
    deliver_at: u64,
    from: Peer,
    frame: Vec<u8>,
}

/// Counters for one direction of a link.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LinkStats {
    /// Messages handed to the link
    pub sent: u64,
    /// Messages delivered
    pub delivered: u64,
    /// Snapshots lost
    pub dropped: u64,
    /// Encoded bytes handed to the link
    pub bytes: u64,
}

/// One direction of a lossy, latent connection.
#[derive(Debug)]
pub struct Link {
    tx: Sender<Packet>,
    rx: Receiver<Packet>,
    in_flight: VecDeque<Packet>,
    latency: u64,
    snapshot_loss: f32,
    rng: fastrand::Rng,
    stats: LinkStats,
}

impl Link {
    /// Creates a link delaying every message by `latency` ticks.
    #[must_use]
    pub fn new(latency: u32, snapshot_loss: f32, seed: u64) -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            in_flight: VecDeque::new(),
            latency: u64::from(latency),
            snapshot_loss: snapshot_loss.clamp(0.0, 1.0),
            rng: fastrand::Rng::with_seed(seed),
            stats: LinkStats::default(),
        }
    }

    /// Encodes and sends `message` at tick `now`.
    pub fn send(&mut self, now: u64, from: Peer, message: &Message) -> Result<()> {
        self.stats.sent += 1;
        if matches!(message, Message::EntityStateBroadcast(_)) && self.rng.f32() < self.snapshot_loss {
            self.stats.dropped += 1;
            trace!(kind = message.kind(), "snapshot lost");
            return Ok(());
        }

        let frame = encode_message(message)?;
        self.stats.bytes += frame.len() as u64;
        self.tx.send(Packet {
            deliver_at: now + self.latency,
            from,
            frame,
        })?;
        Ok(())
    }

    /// Frames due at tick `now`, with their senders.
    pub fn receive(&mut self, now: u64) -> Vec<(Peer, Vec<u8>)> {
        self.in_flight.extend(self.rx.try_iter());

        let mut due = Vec::new();
        while self.in_flight.front().is_some_and(|p| p.deliver_at <= now) {
            let Some(packet) = self.in_flight.pop_front() else {
                break;
            };
            due.push((packet.from, packet.frame));
        }
        self.stats.delivered += due.len() as u64;
        due
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> LinkStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use riposte_combat::{decode_message, EntityStateBroadcast, StateId};
    use riposte_common::EntityId;

    fn snapshot() -> Message {
        Message::EntityStateBroadcast(EntityStateBroadcast {
            entity_id: EntityId::from_raw(1),
            position: Vec3::ZERO,
            facing_yaw: 0.0,
            velocity: Vec3::ZERO,
            health: 100.0,
            max_health: 100.0,
            shields: 0.0,
            state: StateId::Idle,
            is_dead: false,
        })
    }

    fn decoded(frames: Vec<(Peer, Vec<u8>)>) -> Vec<(Peer, Message)> {
        frames
            .into_iter()
            .map(|(from, frame)| (from, decode_message(&frame).expect("decode")))
            .collect()
    }

    #[test]
    fn test_messages_arrive_after_latency_in_order() {
        let mut link = Link::new(3, 0.0, 1);
        let wall = Message::WallJumpReplay { wall_normal: Vec3::X };
        link.send(0, Peer::Server, &snapshot()).expect("send");
        link.send(1, Peer::Server, &wall).expect("send");

        assert!(link.receive(2).is_empty());
        let first = decoded(link.receive(3));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].1, snapshot());
        let second = decoded(link.receive(10));
        assert_eq!(second, vec![(Peer::Server, wall)]);
        assert_eq!(link.stats().delivered, 2);
    }

    #[test]
    fn test_only_snapshots_are_lost() {
        let mut link = Link::new(0, 1.0, 7);
        let replay = Message::WallJumpReplay { wall_normal: Vec3::Z };
        link.send(0, Peer::Client(EntityId::from_raw(1)), &snapshot()).expect("send");
        link.send(0, Peer::Client(EntityId::from_raw(1)), &replay).expect("send");

        let got = decoded(link.receive(0));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].1, replay);
        assert_eq!(link.stats().dropped, 1);
    }
}
