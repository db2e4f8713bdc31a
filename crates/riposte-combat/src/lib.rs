//! # Riposte Combat
//!
//! Server-authoritative combat core for a networked action game.
//!
//! This crate provides:
//! - Entity components, the arena that owns them, and hurtbox queries
//! - Action states (idle, moving, airborne, dash, melee, ranged, block,
//!   stunned, dead) driven by a per-entity state machine with an input buffer
//! - Bone-region hit resolution with block, parry and explosion falloff
//! - Hit timing: attacker hitlag, target hitstun, delayed knockback
//! - A fixed-step [`Simulation`] for either network role
//! - Client prediction of the local player's hits and server validation
//! - The wire protocol between server and clients
//!
//! ## Authority
//!
//! The server owns every health value. A client applies its own player's hits
//! at once, records them as predictions and asks the server to validate them.
//! The server recomputes each hit from its own state; the client rolls back
//! whatever the server does not confirm.
//!
//! ## Tick Order
//!
//! Each tick, hit timers advance and stamina regenerates for every entity.
//! Then, in id order, each state machine runs unless its entity is frozen in
//! hitlag, and the effects its states produced (swings, projectiles,
//! notifications) are carried out. Projectiles follow, then broadcasts or
//! prediction expiry.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod arena;
pub mod authority;
pub mod block;
pub mod choreography;
pub mod entity;
pub mod events;
pub mod input;
pub mod machine;
pub mod physics;
pub mod prediction;
pub mod protocol;
pub mod region;
pub mod resolver;
pub mod simulation;
pub mod states;
pub mod timer;
pub mod tuning;
pub mod weapon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::arena::*;
    pub use crate::authority::*;
    pub use crate::block::*;
    pub use crate::choreography::*;
    pub use crate::entity::*;
    pub use crate::events::*;
    pub use crate::input::*;
    pub use crate::machine::*;
    pub use crate::physics::*;
    pub use crate::prediction::*;
    pub use crate::protocol::*;
    pub use crate::region::*;
    pub use crate::resolver::*;
    pub use crate::simulation::*;
    pub use crate::states::*;
    pub use crate::timer::*;
    pub use crate::tuning::*;
    pub use crate::weapon::*;
}

pub use prelude::*;
