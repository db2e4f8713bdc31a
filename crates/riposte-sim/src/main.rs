//! # Riposte Sim
//!
//! Headless duel between an authoritative server and a predicting client.
//!
//! Loads `riposte.toml` (or the path given as the first argument), builds
//! both simulations over a latent, lossy loopback link, runs the scripted
//! duel and prints a summary.
//!
//! `riposte-sim --write-config [path]` writes the default configuration and
//! exits.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod loopback;
mod scenario;
mod timing;

use anyhow::{Context, Result};
use riposte_combat::CombatTuning;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{SimConfig, CONFIG_FILE};
use crate::scenario::Duel;
use crate::timing::FixedStep;

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("riposte=info".parse()?))
        .init();

    info!("Riposte sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(flag) if flag == "--write-config" => {
            let path = args.next().unwrap_or_else(|| CONFIG_FILE.to_owned());
            SimConfig::default()
                .save_to(&path)
                .with_context(|| format!("writing default config to {path}"))?;
            return Ok(());
        }
        Some(path) => SimConfig::load_from(path),
        None => SimConfig::load(),
    };
    let tuning = match &config.tuning_path {
        Some(path) => CombatTuning::load_from(path)
            .with_context(|| format!("loading tuning from {}", path.display()))?,
        None => CombatTuning::default(),
    };

    let mut clock = FixedStep::new(tuning.fixed_dt());
    let frame = 1.0 / config.frame_rate.max(1) as f32;
    let frames = (config.duration_secs / frame).ceil() as u64;

    let mut duel = Duel::new(&config, tuning)?;
    for _ in 0..frames {
        for _ in 0..clock.accumulate(frame) {
            duel.step()?;
        }
    }

    let summary = duel.summary();
    info!(
        ticks = clock.ticks(),
        hits = summary.tally.server_hits,
        accepted = summary.tally.accepted,
        rejected = summary.tally.rejected,
        divergence = summary.health_divergence,
        "Duel finished"
    );
    if config.json_summary {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    info!("Riposte sim shutdown complete");
    Ok(())
}
