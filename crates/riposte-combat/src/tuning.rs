//! Combat tuning.
//!
//! Every gameplay constant used by the resolver, the choreography and the
//! action states lives here. Server and client must load identical tuning or
//! their hit outcomes diverge.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading or validating tuning.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Tuning file could not be read or written
    #[error("tuning io error: {0}")]
    Io(#[from] io::Error),

    /// Tuning file is not valid TOML for this schema
    #[error("tuning parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Tuning could not be serialized
    #[error("tuning serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is outside its allowed range
    #[error("invalid tuning value for `{field}`: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl From<ConfigError> for riposte_common::RiposteError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Gameplay constants shared by server and client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    // === Hit Regions ===
    /// Damage multiplier for head hits
    pub head_multiplier: f32,
    /// Damage multiplier for torso hits (also the fallback for unknown regions)
    pub torso_multiplier: f32,
    /// Damage multiplier for leg hits
    pub leg_multiplier: f32,
    /// Damage multiplier for arm hits
    pub arm_multiplier: f32,
    /// Damage multiplier for hand hits
    pub hand_multiplier: f32,
    /// Minimum head multiplier for an unblocked head hit to count as critical
    pub critical_threshold: f32,

    // === Blocking ===
    /// Fraction of damage removed by a successful block (0.0 - 1.0)
    pub block_reduction: f32,
    /// Minimum dot(target forward, direction to attacker) for a block to apply
    pub block_arc_dot: f32,
    /// Parry window length after raising a block (seconds)
    pub parry_window: f32,
    /// Stamina granted to a defender on a successful parry
    pub parry_stamina_reward: f32,

    // === Side Effects ===
    /// Weapon drop chance per point of final damage on arm/hand hits
    pub weapon_drop_chance_per_damage: f32,
    /// Upper bound on the weapon drop chance
    pub weapon_drop_max_chance: f32,
    /// Movement speed multiplier applied by leg hits
    pub leg_slow_factor: f32,
    /// Duration of the leg-hit slow (seconds)
    pub leg_slow_duration: f32,

    // === Hit Timing ===
    /// Attacker freeze applied when a hit context carries none (seconds)
    pub default_hitlag: f32,
    /// Hitstun applied when a hit context carries none (seconds)
    pub default_hitstun: f32,
    /// How long a launch counts as an in-flight physical effect (seconds)
    pub knockback_duration: f32,
    /// Ground friction while a launch is in flight
    pub knockback_friction: f32,
    /// Multiplier applied per successive hit on an already displaced target
    pub juggle_decay: f32,
    /// Maximum knockback speed
    pub max_knockback: f32,

    // === Movement ===
    /// Ground movement speed
    pub move_speed: f32,
    /// Ground acceleration toward the desired velocity
    pub ground_acceleration: f32,
    /// Ground friction (velocity fraction removed per second)
    pub ground_friction: f32,
    /// Initial vertical velocity of a jump
    pub jump_velocity: f32,
    /// Gravity acceleration (positive = down)
    pub gravity: f32,
    /// Gravity multiplier while sliding down a wall
    pub wall_slide_gravity_scale: f32,
    /// Reach of the four lateral wall probes
    pub wall_probe_distance: f32,
    /// Horizontal speed of a wall jump
    pub wall_jump_horizontal: f32,
    /// Vertical speed of a wall jump
    pub wall_jump_vertical: f32,
    /// Air steering acceleration
    pub air_control: f32,
    /// Air steering penalty per unit of speed ratio (0.0 - 1.0)
    pub air_control_penalty: f32,
    /// Minimum time airborne before a landing is accepted (seconds)
    pub min_airborne_time: f32,

    // === Dash ===
    /// Dash speed
    pub dash_speed: f32,
    /// Dash duration (seconds)
    pub dash_duration: f32,
    /// Stamina consumed by one dash
    pub dash_stamina_cost: f32,

    // === Stamina ===
    /// Stamina regenerated per second
    pub stamina_regen: f32,
    /// Delay after spending stamina before regeneration resumes (seconds)
    pub stamina_regen_delay: f32,

    // === Explosions ===
    /// Damage fraction at the edge of an explosion radius
    pub explosion_min_falloff: f32,

    // === Input ===
    /// Ticks a buffered input survives before it is discarded
    pub input_buffer_ticks: u32,

    // === Network ===
    /// Seconds a predicted hit waits for a server verdict
    pub prediction_timeout: f32,
    /// State broadcasts per second
    pub broadcast_rate: f32,
    /// Extra reach allowed when the server re-validates a client hit
    pub validation_tolerance: f32,
    /// Slack around the server's own hit volume when checking a claimed region
    pub region_tolerance: f32,
    /// Oldest validation request the server still accepts (seconds)
    pub max_validation_age: f32,
    /// Position error above which the local actor snaps to the server
    pub snap_distance: f32,
    /// How long a closed swing keeps its hit set for late validations (seconds)
    pub swing_retention: f32,

    // === Simulation ===
    /// Fixed simulation ticks per second
    pub tick_rate: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            // Regions
            head_multiplier: 3.0,
            torso_multiplier: 1.0,
            leg_multiplier: 0.8,
            arm_multiplier: 0.6,
            hand_multiplier: 0.4,
            critical_threshold: 2.0,

            // Blocking
            block_reduction: 0.7,
            block_arc_dot: -0.2,
            parry_window: 0.18,
            parry_stamina_reward: 20.0,

            // Side effects
            weapon_drop_chance_per_damage: 0.01,
            weapon_drop_max_chance: 0.35,
            leg_slow_factor: 0.6,
            leg_slow_duration: 1.5,

            // Hit timing
            default_hitlag: 0.08,
            default_hitstun: 0.3,
            knockback_duration: 0.35,
            knockback_friction: 3.0,
            juggle_decay: 0.6,
            max_knockback: 25.0,

            // Movement
            move_speed: 6.0,
            ground_acceleration: 50.0,
            ground_friction: 12.0,
            jump_velocity: 8.0,
            gravity: 22.0,
            wall_slide_gravity_scale: 0.35,
            wall_probe_distance: 0.6,
            wall_jump_horizontal: 6.5,
            wall_jump_vertical: 8.0,
            air_control: 12.0,
            air_control_penalty: 0.6,
            min_airborne_time: 0.1,

            // Dash
            dash_speed: 16.0,
            dash_duration: 0.18,
            dash_stamina_cost: 25.0,

            // Stamina
            stamina_regen: 22.0,
            stamina_regen_delay: 0.75,

            // Explosions
            explosion_min_falloff: 0.25,

            // Input
            input_buffer_ticks: 8,

            // Network
            prediction_timeout: 1.0,
            broadcast_rate: 20.0,
            validation_tolerance: 1.5,
            region_tolerance: 0.25,
            max_validation_age: 1.0,
            snap_distance: 1.25,
            swing_retention: 2.0,

            // Simulation
            tick_rate: 60.0,
        }
    }
}

impl CombatTuning {
    /// Load tuning from a TOML file.
    ///
    /// A missing file yields the defaults; a malformed or out-of-range file is
    /// an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Tuning file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let tuning: Self = toml::from_str(&contents)?;
        tuning.validate()?;

        info!("Loaded tuning from {}", path.display());
        Ok(tuning)
    }

    /// Save tuning to a TOML file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        info!("Saved tuning to {}", path.display());
        Ok(())
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [
            ("block_reduction", self.block_reduction),
            ("air_control_penalty", self.air_control_penalty),
            ("explosion_min_falloff", self.explosion_min_falloff),
            ("weapon_drop_max_chance", self.weapon_drop_max_chance),
            ("leg_slow_factor", self.leg_slow_factor),
            ("juggle_decay", self.juggle_decay),
        ];
        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("{value} is outside 0.0..=1.0")));
            }
        }

        let non_negative = [
            ("head_multiplier", self.head_multiplier),
            ("torso_multiplier", self.torso_multiplier),
            ("leg_multiplier", self.leg_multiplier),
            ("arm_multiplier", self.arm_multiplier),
            ("hand_multiplier", self.hand_multiplier),
            ("parry_window", self.parry_window),
            ("parry_stamina_reward", self.parry_stamina_reward),
            ("leg_slow_duration", self.leg_slow_duration),
            ("default_hitlag", self.default_hitlag),
            ("default_hitstun", self.default_hitstun),
            ("knockback_duration", self.knockback_duration),
            ("min_airborne_time", self.min_airborne_time),
            ("dash_duration", self.dash_duration),
            ("dash_stamina_cost", self.dash_stamina_cost),
            ("prediction_timeout", self.prediction_timeout),
            ("swing_retention", self.swing_retention),
            ("validation_tolerance", self.validation_tolerance),
            ("region_tolerance", self.region_tolerance),
        ];
        for (field, value) in non_negative {
            if value < 0.0 || !value.is_finite() {
                return Err(invalid(field, format!("{value} must be a finite non-negative number")));
            }
        }

        let positive = [
            ("gravity", self.gravity),
            ("move_speed", self.move_speed),
            ("broadcast_rate", self.broadcast_rate),
            ("tick_rate", self.tick_rate),
        ];
        for (field, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(invalid(field, format!("{value} must be positive")));
            }
        }

        if !(-1.0..=1.0).contains(&self.block_arc_dot) {
            return Err(invalid(
                "block_arc_dot",
                format!("{} is not a valid cosine", self.block_arc_dot),
            ));
        }

        Ok(())
    }

    /// Fixed simulation step in seconds.
    #[must_use]
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate
    }

    /// Seconds between two state broadcasts.
    #[must_use]
    pub fn broadcast_interval(&self) -> f32 {
        1.0 / self.broadcast_rate
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
