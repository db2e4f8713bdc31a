//! Suspension timers with activation ids.
//!
//! Hitlag, hitstun, delayed launches and limb slows are modelled as explicit
//! countdowns rather than awaited sleeps. Every `start` mints a fresh
//! [`ActivationId`]; anything scheduled against an older activation checks
//! [`Timers::is_current`] before acting and becomes a no-op once superseded.

use serde::{Deserialize, Serialize};

/// Monotonically increasing id of one timer activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivationId(u64);

impl ActivationId {
    /// Returns the raw id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The suspensions an actor can be under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// Attacker freeze after landing a hit.
    Hitlag,
    /// Target cannot act.
    Hitstun,
    /// Delay between a hit and the target's knockback launch.
    Launch,
    /// Launch is still in flight.
    Knockback,
    /// Leg-hit movement slow.
    Slow,
}

impl TimerKind {
    /// All kinds, in expiry order.
    pub const ALL: [Self; 5] = [
        Self::Hitlag,
        Self::Hitstun,
        Self::Launch,
        Self::Knockback,
        Self::Slow,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Hitlag => 0,
            Self::Hitstun => 1,
            Self::Launch => 2,
            Self::Knockback => 3,
            Self::Slow => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    activation: ActivationId,
    remaining: f32,
}

/// A timer that ran out during [`Timers::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired {
    /// Which timer
    pub kind: TimerKind,
    /// The activation that ran out
    pub activation: ActivationId,
}

/// One countdown slot per [`TimerKind`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timers {
    slots: [Option<Slot>; 5],
    next_activation: u64,
}

impl Timers {
    /// Creates an empty timer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) a timer. A running timer of the same kind is
    /// replaced rather than extended.
    pub fn start(&mut self, kind: TimerKind, duration: f32) -> ActivationId {
        self.next_activation += 1;
        let activation = ActivationId(self.next_activation);
        self.slots[kind.index()] = Some(Slot {
            activation,
            remaining: duration.max(0.0),
        });
        activation
    }

    /// Stops a timer without reporting it as expired.
    pub fn cancel(&mut self, kind: TimerKind) {
        self.slots[kind.index()] = None;
    }

    /// Stops every timer.
    pub fn clear(&mut self) {
        self.slots = [None; 5];
    }

    /// Whether a timer of this kind is running.
    #[must_use]
    pub fn is_active(&self, kind: TimerKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Seconds left on a timer, zero when idle.
    #[must_use]
    pub fn remaining(&self, kind: TimerKind) -> f32 {
        self.slots[kind.index()].map_or(0.0, |s| s.remaining)
    }

    /// Whether `activation` is still the live activation for `kind`.
    #[must_use]
    pub fn is_current(&self, kind: TimerKind, activation: ActivationId) -> bool {
        self.slots[kind.index()].is_some_and(|s| s.activation == activation)
    }

    /// The live activation for `kind`, if any.
    #[must_use]
    pub fn activation(&self, kind: TimerKind) -> Option<ActivationId> {
        self.slots[kind.index()].map(|s| s.activation)
    }

    /// Counts every running timer down and returns the ones that ran out.
    pub fn advance(&mut self, dt: f32) -> Vec<Expired> {
        let mut expired = Vec::new();

        for kind in TimerKind::ALL {
            let slot = &mut self.slots[kind.index()];
            if let Some(s) = slot {
                s.remaining -= dt;
                if s.remaining <= 0.0 {
                    expired.push(Expired {
                        kind,
                        activation: s.activation,
                    });
                    *slot = None;
                }
            }
        }

        expired
    }
}
