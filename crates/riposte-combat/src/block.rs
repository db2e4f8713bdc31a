//! Active block state.

use serde::{Deserialize, Serialize};

/// Present on an entity only while it is in the block state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockState {
    /// Simulation time the block was raised
    pub raised_at: f64,
    /// Parry window length (seconds)
    pub parry_window: f32,
}

impl BlockState {
    /// Raises a block at `now`.
    #[must_use]
    pub fn raise(now: f64, parry_window: f32) -> Self {
        Self {
            raised_at: now,
            parry_window,
        }
    }

    /// Whether a hit arriving at `now` lands inside the parry window.
    #[must_use]
    pub fn in_parry_window(&self, now: f64) -> bool {
        let held = now - self.raised_at;
        held >= 0.0 && held < f64::from(self.parry_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parry_window_edges() {
        let block = BlockState::raise(10.0, 0.2);
        assert!(block.in_parry_window(10.0));
        assert!(block.in_parry_window(10.15));
        assert!(!block.in_parry_window(10.25));
        assert!(!block.in_parry_window(9.9));
    }
}
