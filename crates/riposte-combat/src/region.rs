//! Bone-region hit volumes.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::tuning::CombatTuning;

/// Broad body-part category of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionCategory {
    /// Head
    Head,
    /// Torso
    Torso,
    /// Upper arm / forearm
    Arm,
    /// Hand
    Hand,
    /// Thigh or shin
    Leg,
}

impl RegionCategory {
    /// Whether a hit here can knock the weapon loose.
    #[must_use]
    pub const fn can_disarm(self) -> bool {
        matches!(self, Self::Arm | Self::Hand)
    }
}

/// Sphere attached to the body in local space (x = right, y = up, z = forward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionVolume {
    /// Offset from the feet
    pub offset: Vec3,
    /// Radius
    pub radius: f32,
}

impl RegionVolume {
    /// World-space center for a body at `position` facing `yaw`.
    #[must_use]
    pub fn world_center(&self, position: Vec3, yaw: f32) -> Vec3 {
        position + Quat::from_rotation_y(yaw) * self.offset
    }
}

/// A named sub-volume of a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRegion {
    /// Region name reported by the collider
    pub name: String,
    /// Category
    pub category: RegionCategory,
    /// Damage multiplier
    pub multiplier: f32,
    /// Whether a block can cover this region
    pub blockable: bool,
    /// Collision volume
    pub volume: RegionVolume,
}

/// Immutable region configuration shared by every entity with the same body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTable {
    regions: Vec<HitRegion>,
    fallback: usize,
}

impl RegionTable {
    /// Builds a table. Unknown names resolve to the first torso region, or
    /// the first region when there is no torso.
    #[must_use]
    pub fn new(regions: Vec<HitRegion>) -> Self {
        let fallback = regions
            .iter()
            .position(|r| r.category == RegionCategory::Torso)
            .unwrap_or(0);
        Self { regions, fallback }
    }

    /// The standard humanoid layout.
    #[must_use]
    pub fn humanoid(tuning: &CombatTuning) -> Self {
        let region = |name: &str, category, multiplier, blockable, offset: Vec3, radius| HitRegion {
            name: name.to_owned(),
            category,
            multiplier,
            blockable,
            volume: RegionVolume { offset, radius },
        };

        use RegionCategory::{Arm, Hand, Head, Leg, Torso};
        Self::new(vec![
            region("head", Head, tuning.head_multiplier, true, Vec3::new(0.0, 1.65, 0.0), 0.15),
            region("torso", Torso, tuning.torso_multiplier, true, Vec3::new(0.0, 1.25, 0.0), 0.3),
            region("arm_l", Arm, tuning.arm_multiplier, true, Vec3::new(-0.32, 1.3, 0.0), 0.12),
            region("arm_r", Arm, tuning.arm_multiplier, true, Vec3::new(0.32, 1.3, 0.0), 0.12),
            region("hand_l", Hand, tuning.hand_multiplier, true, Vec3::new(-0.35, 0.95, 0.1), 0.08),
            region("hand_r", Hand, tuning.hand_multiplier, true, Vec3::new(0.35, 0.95, 0.1), 0.08),
            region("thigh_l", Leg, tuning.leg_multiplier, true, Vec3::new(-0.12, 0.75, 0.0), 0.15),
            region("thigh_r", Leg, tuning.leg_multiplier, true, Vec3::new(0.12, 0.75, 0.0), 0.15),
            // Below the knee: never blockable.
            region("shin_l", Leg, tuning.leg_multiplier, false, Vec3::new(-0.12, 0.3, 0.0), 0.12),
            region("shin_r", Leg, tuning.leg_multiplier, false, Vec3::new(0.12, 0.3, 0.0), 0.12),
        ])
    }

    /// Looks a region up by name, falling back to the torso for unknown or
    /// missing names. Returns `None` only for an empty table.
    #[must_use]
    pub fn lookup(&self, name: Option<&str>) -> Option<&HitRegion> {
        name.and_then(|n| self.regions.iter().find(|r| r.name == n))
            .or_else(|| self.regions.get(self.fallback))
    }

    /// Exact lookup without fallback.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HitRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Every region.
    pub fn iter(&self) -> impl Iterator<Item = &HitRegion> {
        self.regions.iter()
    }

    /// The touched region whose volume is nearest, as scored by `touches`
    /// (`None` means not touched).
    pub fn nearest_touched<F>(&self, position: Vec3, yaw: f32, touches: F) -> Option<(&HitRegion, Vec3)>
    where
        F: Fn(Vec3, f32) -> Option<f32>,
    {
        self.regions
            .iter()
            .filter_map(|r| {
                let center = r.volume.world_center(position, yaw);
                touches(center, r.volume.radius).map(|d| (r, center, d))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(r, c, _)| (r, c))
    }
}
