//! Network messages and their wire format.
//!
//! A frame is the 4-byte magic, one version byte, then the bincode payload.
//! Frames are capped at [`MAX_FRAME_LEN`]; length prefixes inside the payload
//! are checked against the cap before anything is allocated.
//! Transport (reliability, ordering, connections) lives elsewhere.

use bincode::Options;
use glam::Vec3;
use riposte_common::EntityId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::InputFrame;
use crate::resolver::HitSource;
use crate::states::StateId;
use crate::weapon::DamageType;

/// Frame magic.
pub const MAGIC: [u8; 4] = *b"RPST";

/// Wire format version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest frame accepted or produced.
pub const MAX_FRAME_LEN: usize = 16 * 1024;

const HEADER_LEN: usize = MAGIC.len() + 1;

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit((MAX_FRAME_LEN - HEADER_LEN) as u64)
}

/// Codec errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame shorter than its header
    #[error("frame too short: {0} bytes")]
    Truncated(usize),

    /// Frame longer than the cap
    #[error("frame too long: {0} bytes (limit {MAX_FRAME_LEN})")]
    Oversized(usize),

    /// Magic bytes did not match
    #[error("bad frame magic")]
    BadMagic,

    /// Frame written by another protocol version
    #[error("unsupported protocol version {found} (expected {PROTOCOL_VERSION})")]
    UnsupportedVersion {
        /// Version byte found
        found: u8,
    },

    /// Payload could not be encoded or decoded
    #[error("payload codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl From<ProtocolError> for riposte_common::RiposteError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// A client's claim that its own attack landed.
///
/// Identifies the hit; the server recomputes how much it is worth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitValidationRequest {
    /// Client-side sequence number, echoed in the result
    pub sequence: u32,
    /// Target id as the client knows it
    pub target_id: EntityId,
    /// Target name, used when the id does not resolve
    pub target_name: String,
    /// What landed
    pub source: HitSource,
    /// Damage the client predicted (informational)
    pub damage: f32,
    /// Damage type
    pub damage_type: DamageType,
    /// Knockback speed
    pub knockback_force: f32,
    /// Knockback direction
    pub knockback_direction: Vec3,
    /// Hitstun the client applied
    pub hitstun: f32,
    /// Region struck
    pub region: Option<String>,
    /// Client simulation time of the hit
    pub timestamp: f64,
}

/// Periodic authoritative snapshot of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStateBroadcast {
    /// Entity
    pub entity_id: EntityId,
    /// Position
    pub position: Vec3,
    /// Facing
    pub facing_yaw: f32,
    /// Velocity
    pub velocity: Vec3,
    /// Health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Shields
    pub shields: f32,
    /// Active state
    pub state: StateId,
    /// Dead
    pub is_dead: bool,
}

/// Messages exchanged between server and clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Client to server: validate a predicted hit
    HitValidationRequest(HitValidationRequest),
    /// Server to client: verdict on a validation request
    HitValidationResult {
        /// Sequence from the request
        sequence: u32,
        /// Target the server resolved
        target_id: EntityId,
        /// Whether the hit counted
        accepted: bool,
        /// Damage the server applied
        final_damage: f32,
    },
    /// Server to clients: entity snapshot
    EntityStateBroadcast(EntityStateBroadcast),
    /// Client to server: a wall jump, trusted as sent
    WallJumpReplay {
        /// Wall normal the client used
        wall_normal: Vec3,
    },
    /// Client to server: one tick of input
    InputReplay {
        /// Input for the tick
        frame: InputFrame,
    },
}

impl Message {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HitValidationRequest(_) => "hit_validation_request",
            Self::HitValidationResult { .. } => "hit_validation_result",
            Self::EntityStateBroadcast(_) => "entity_state_broadcast",
            Self::WallJumpReplay { .. } => "wall_jump_replay",
            Self::InputReplay { .. } => "input_replay",
        }
    }
}

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peer {
    /// The server
    Server,
    /// The client controlling this entity
    Client(EntityId),
}

/// Where an outbound message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// The server
    Server,
    /// One client
    Client(EntityId),
    /// Every connected client
    AllClients,
}

/// A message waiting for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    /// Destination
    pub to: Recipient,
    /// Message
    pub message: Message,
}

/// Encodes a message into a frame.
pub fn encode_message(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let payload = codec().serialize(message)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&MAGIC);
    frame.push(PROTOCOL_VERSION);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes a frame.
pub fn decode_message(frame: &[u8]) -> Result<Message, ProtocolError> {
    if frame.len() < HEADER_LEN {
        return Err(ProtocolError::Truncated(frame.len()));
    }
    if frame.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::Oversized(frame.len()));
    }
    let (header, payload) = frame.split_at(HEADER_LEN);
    if header[..MAGIC.len()] != MAGIC {
        return Err(ProtocolError::BadMagic);
    }
    let version = header[MAGIC.len()];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion { found: version });
    }
    Ok(codec().deserialize(payload)?)
}
