//! Buffered combat input.
//!
//! The input layer pushes discrete action events into a small FIFO each tick;
//! whichever action state reads an event first consumes it, so one key press
//! can never drive two transitions. Locally controlled actors and actors driven
//! by replayed network input share the same buffer.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;

/// Default buffer capacity.
pub const DEFAULT_CAPACITY: usize = 8;

/// Discrete combat actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputAction {
    /// Attack with the equipped weapon
    Attack,
    /// Dodge (dash)
    Dodge,
    /// Jump
    Jump,
    /// Wall jump, usually carrying the wall normal
    WallJump,
    /// Raise a block
    Block,
}

/// Payload attached to a buffered action.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum InputData {
    /// No payload
    #[default]
    None,
    /// A direction (dash direction, aim)
    Direction(Vec3),
    /// The normal of the wall being jumped off
    WallNormal(Vec3),
}

/// An action waiting to be consumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedInput {
    /// The action
    pub action: InputAction,
    /// Its payload
    pub data: InputData,
    /// Ticks spent in the buffer
    pub age: u32,
}

/// Small FIFO of pending actions.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    entries: VecDeque<BufferedInput>,
    capacity: usize,
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InputBuffer {
    /// Creates a buffer holding at most `capacity` actions.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Pushes an action. When full, the oldest action is dropped.
    pub fn push(&mut self, action: InputAction, data: InputData) {
        if self.entries.len() >= self.capacity {
            if let Some(dropped) = self.entries.pop_front() {
                trace!(action = ?dropped.action, "input buffer full, dropping oldest");
            }
        }
        self.entries.push_back(BufferedInput {
            action,
            data,
            age: 0,
        });
    }

    /// Consumes the oldest pending `action`. Returns whether one was found.
    pub fn consume(&mut self, action: InputAction) -> bool {
        self.consume_with_data(action).is_some()
    }

    /// Consumes the oldest pending `action` and returns its payload.
    pub fn consume_with_data(&mut self, action: InputAction) -> Option<InputData> {
        let index = self.entries.iter().position(|e| e.action == action)?;
        self.entries.remove(index).map(|e| e.data)
    }

    /// Whether an `action` is pending, without consuming it.
    #[must_use]
    pub fn peek(&self, action: InputAction) -> bool {
        self.entries.iter().any(|e| e.action == action)
    }

    /// Ages every entry by one tick and drops those older than `max_age`.
    pub fn age_out(&mut self, max_age: u32) {
        for entry in &mut self.entries {
            entry.age += 1;
        }
        self.entries.retain(|e| e.age <= max_age);
    }

    /// Drops every pending action.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the input layer produced for one tick.
///
/// This is both what a local controller submits and what the server replays
/// for a remote player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Desired movement direction on the ground plane (length <= 1)
    pub movement: Vec3,
    /// Whether the block button is held
    pub block_held: bool,
    /// Actions pressed this tick
    pub actions: Vec<(InputAction, InputData)>,
}

impl InputFrame {
    /// An empty frame.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// Sets the movement vector, flattened onto the ground plane.
    #[must_use]
    pub fn with_movement(mut self, movement: Vec3) -> Self {
        self.movement = Vec3::new(movement.x, 0.0, movement.z).clamp_length_max(1.0);
        self
    }

    /// Adds a pressed action.
    #[must_use]
    pub fn with_action(mut self, action: InputAction) -> Self {
        self.actions.push((action, InputData::None));
        self
    }

    /// Adds a pressed action with a payload.
    #[must_use]
    pub fn with_action_data(mut self, action: InputAction, data: InputData) -> Self {
        self.actions.push((action, data));
        self
    }

    /// Holds the block button.
    #[must_use]
    pub fn holding_block(mut self) -> Self {
        self.block_held = true;
        self
    }
}
