//! Fire-and-forget notifications for animation, VFX and SFX sinks.
//!
//! Nothing the core emits here is ever read back by the core.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use glam::Vec3;
use riposte_common::EntityId;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::region::RegionCategory;
use crate::states::StateId;

/// A semantic event for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// An entity changed state.
    StateChanged {
        /// Entity
        entity: EntityId,
        /// Previous state
        from: StateId,
        /// New state
        to: StateId,
    },
    /// Play an animation clip.
    Animation {
        /// Entity
        entity: EntityId,
        /// Clip name
        clip: String,
    },
    /// Set visual opacity.
    Opacity {
        /// Entity
        entity: EntityId,
        /// Opacity 0.0 - 1.0
        alpha: f32,
    },
    /// A hit was applied.
    Hit {
        /// Attacker
        attacker: EntityId,
        /// Target
        target: EntityId,
        /// Region category struck, if any
        category: Option<RegionCategory>,
        /// Damage dealt
        damage: f32,
        /// Whether a block reduced it
        blocked: bool,
    },
    /// An unblocked head hit above the critical threshold.
    Critical {
        /// Attacker
        attacker: EntityId,
        /// Target
        target: EntityId,
    },
    /// A hit was parried.
    Parried {
        /// Attacker whose hit was parried
        attacker: EntityId,
        /// Defender
        defender: EntityId,
    },
    /// Cosmetic hit effect for a hit this side does not own.
    PredictedHit {
        /// Attacker
        attacker: EntityId,
        /// Target
        target: EntityId,
        /// Contact point
        point: Vec3,
    },
    /// A weapon was knocked loose.
    WeaponDropped {
        /// Entity disarmed
        entity: EntityId,
        /// Weapon name
        weapon: String,
    },
    /// A leg hit slowed an entity.
    Slowed {
        /// Entity
        entity: EntityId,
        /// Duration in seconds
        duration: f32,
    },
    /// An entity died.
    Died {
        /// Entity
        entity: EntityId,
    },
    /// An explosion went off.
    Explosion {
        /// Epicenter
        center: Vec3,
        /// Radius
        radius: f32,
    },
    /// A parried projectile was sent back.
    ProjectileReflected {
        /// New owner
        by: EntityId,
    },
    /// Shake a hit entity for impact feel.
    Vibrate {
        /// Entity
        entity: EntityId,
        /// Duration in seconds
        duration: f32,
    },
}

/// Bounded notification channel.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: Sender<Notification>,
    receiver: Receiver<Notification>,
    capacity: usize,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl NotificationBus {
    /// Creates a bus holding at most `capacity` undrained notifications.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes without blocking. When full, the notification is dropped.
    pub fn publish(&self, notification: Notification) {
        if let Err(TrySendError::Full(dropped)) = self.sender.try_send(notification) {
            warn!(?dropped, "notification bus full, dropping");
        }
    }

    /// Drains all pending notifications.
    pub fn drain(&self) -> Vec<Notification> {
        self.receiver.try_iter().collect()
    }

    /// Number of pending notifications.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// A receiver handle for presentation threads.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<Notification> {
        self.receiver.clone()
    }
}
