//! Driver configuration.
//!
//! Everything about the run that is not a gameplay constant: how long to
//! simulate, how bad the simulated network is, where the tuning lives.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "riposte.toml";

/// Driver configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Run ===
    /// Simulated seconds to run
    pub duration_secs: f32,
    /// Host frame rate feeding the fixed-step clock
    pub frame_rate: u32,
    /// Tuning file (None = built-in defaults)
    pub tuning_path: Option<PathBuf>,

    // === Network ===
    /// One-way latency in ticks
    pub latency_ticks: u32,
    /// Fraction of state snapshots lost in transit (0.0 - 1.0)
    pub snapshot_loss: f32,
    /// Seed for the loss roll
    pub seed: u64,

    // === Output ===
    /// Print the end-of-run summary as JSON
    pub json_summary: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration_secs: 6.0,
            frame_rate: 144,
            tuning_path: None,

            latency_ticks: 4,
            snapshot_loss: 0.1,
            seed: 0x5EED,

            json_summary: true,
        }
    }
}

impl SimConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str::<Self>(&contents) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config.sanitized()
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamps values into usable ranges.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.duration_secs = self.duration_secs.max(0.0);
        self.frame_rate = self.frame_rate.max(1);
        self.snapshot_loss = self.snapshot_loss.clamp(0.0, 1.0);
        self
    }
}
