//! Fixed-step clock.
//!
//! Host frames arrive at whatever rate; the simulation only ever advances in
//! whole ticks of the tuned step.

/// Most ticks one frame may produce.
const MAX_TICKS_PER_FRAME: u32 = 10;

/// Turns variable frame time into fixed simulation ticks.
#[derive(Debug, Clone)]
pub struct FixedStep {
    /// Fixed tick length in seconds
    dt: f32,
    /// Frame time not yet consumed by a tick
    accumulator: f32,
    /// Longest frame accepted, to avoid a spiral of death
    max_frame: f32,
    /// Ticks produced so far
    ticks: u64,
}

impl FixedStep {
    /// Creates a clock ticking every `dt` seconds.
    #[must_use]
    pub fn new(dt: f32) -> Self {
        let dt = dt.max(0.001);
        Self {
            dt,
            accumulator: 0.0,
            max_frame: 0.25,
            ticks: 0,
        }
    }

    /// Ticks produced so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Accumulates one frame and returns how many ticks to run.
    pub fn accumulate(&mut self, frame: f32) -> u32 {
        self.accumulator += frame.clamp(0.0, self.max_frame);
        let mut count = 0;

        while self.accumulator >= self.dt && count < MAX_TICKS_PER_FRAME {
            self.accumulator -= self.dt;
            count += 1;
        }

        // Still behind: drop the backlog rather than chase it.
        if self.accumulator > self.dt * 2.0 {
            self.accumulator = 0.0;
        }

        self.ticks += u64::from(count);
        count
    }
}
