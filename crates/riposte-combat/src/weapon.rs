//! Weapons and loadouts.
//!
//! Weapons are a tagged union. The attack dispatcher matches on the kind and
//! reaches melee or ranged behavior through the [`MeleeCapable`] and
//! [`RangedCapable`] capability traits instead of probing for methods.

use serde::{Deserialize, Serialize};

/// Damage type tag carried through hits and validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DamageType {
    /// Bare hands
    Unarmed,
    /// Edged weapons
    #[default]
    Slash,
    /// Maces, shield bashes
    Blunt,
    /// Thrusts and bolts
    Pierce,
    /// Area blasts
    Explosive,
}

/// One step of a melee combo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingProfile {
    /// Wind-up before the hitbox opens (seconds)
    pub windup: f32,
    /// Hitbox open time (seconds)
    pub active: f32,
    /// Recovery after the hitbox closes (seconds)
    pub recovery: f32,
    /// Base damage
    pub damage: f32,
    /// Horizontal knockback speed
    pub knockback: f32,
    /// Vertical knockback speed
    pub lift: f32,
    /// Hitstun applied to the target (seconds)
    pub hitstun: f32,
    /// Hitlag applied to the attacker (seconds)
    pub hitlag: f32,
    /// Distance from the attacker to the hitbox center
    pub reach: f32,
    /// Hitbox radius
    pub radius: f32,
    /// Damage type
    pub damage_type: DamageType,
}

impl SwingProfile {
    /// Total swing length.
    #[must_use]
    pub fn total(&self) -> f32 {
        self.windup + self.active + self.recovery
    }
}

/// A projectile fired by a ranged weapon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileProfile {
    /// Travel speed
    pub speed: f32,
    /// Base damage
    pub damage: f32,
    /// Knockback speed
    pub knockback: f32,
    /// Hitstun applied to the target (seconds)
    pub hitstun: f32,
    /// Hitlag applied to the shooter (seconds)
    pub hitlag: f32,
    /// Collision radius
    pub radius: f32,
    /// Seconds before the projectile despawns
    pub lifetime: f32,
    /// Damage type
    pub damage_type: DamageType,
}

/// A melee weapon: a name and its combo chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeleeWeapon {
    /// Display name
    pub name: String,
    /// Combo steps in order
    pub combo: Vec<SwingProfile>,
}

impl MeleeWeapon {
    /// Bare hands: a two-hit jab / cross.
    #[must_use]
    pub fn fists() -> Self {
        let jab = SwingProfile {
            windup: 0.06,
            active: 0.08,
            recovery: 0.15,
            damage: 8.0,
            knockback: 3.0,
            lift: 0.0,
            hitstun: 0.2,
            hitlag: 0.05,
            reach: 0.8,
            radius: 0.35,
            damage_type: DamageType::Unarmed,
        };
        Self {
            name: "fists".to_owned(),
            combo: vec![
                jab,
                SwingProfile {
                    windup: 0.08,
                    active: 0.1,
                    recovery: 0.2,
                    damage: 12.0,
                    knockback: 5.0,
                    ..jab
                },
            ],
        }
    }

    /// A one-handed sword with a three-step combo ending in a launcher.
    #[must_use]
    pub fn sword() -> Self {
        let slash = SwingProfile {
            windup: 0.12,
            active: 0.12,
            recovery: 0.25,
            damage: 30.0,
            knockback: 6.0,
            lift: 0.0,
            hitstun: 0.3,
            hitlag: 0.08,
            reach: 1.1,
            radius: 0.55,
            damage_type: DamageType::Slash,
        };
        Self {
            name: "sword".to_owned(),
            combo: vec![
                slash,
                SwingProfile {
                    windup: 0.1,
                    damage: 26.0,
                    ..slash
                },
                SwingProfile {
                    windup: 0.18,
                    active: 0.14,
                    recovery: 0.4,
                    damage: 42.0,
                    knockback: 12.0,
                    lift: 4.0,
                    hitstun: 0.45,
                    hitlag: 0.12,
                    ..slash
                },
            ],
        }
    }
}

/// A ranged weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangedWeapon {
    /// Display name
    pub name: String,
    /// Draw time before the shot leaves (seconds)
    pub windup: f32,
    /// Time after the shot before the shooter can act (seconds)
    pub recovery: f32,
    /// Projectile fired
    pub projectile: ProjectileProfile,
}

impl RangedWeapon {
    /// A crossbow firing fast, heavy bolts.
    #[must_use]
    pub fn crossbow() -> Self {
        Self {
            name: "crossbow".to_owned(),
            windup: 0.25,
            recovery: 0.5,
            projectile: ProjectileProfile {
                speed: 35.0,
                damage: 35.0,
                knockback: 4.0,
                hitstun: 0.25,
                hitlag: 0.05,
                radius: 0.1,
                lifetime: 2.0,
                damage_type: DamageType::Pierce,
            },
        }
    }
}

/// Melee capability.
pub trait MeleeCapable {
    /// Combo steps in order.
    fn combo(&self) -> &[SwingProfile];

    /// The profile of combo step `step`, if the combo is that long.
    fn swing(&self, step: u8) -> Option<&SwingProfile> {
        self.combo().get(usize::from(step))
    }

    /// Number of combo steps.
    fn combo_len(&self) -> u8 {
        u8::try_from(self.combo().len()).unwrap_or(u8::MAX)
    }
}

/// Ranged capability.
pub trait RangedCapable {
    /// Draw time.
    fn windup(&self) -> f32;
    /// Recovery time.
    fn recovery(&self) -> f32;
    /// Projectile fired.
    fn projectile(&self) -> &ProjectileProfile;
}

impl MeleeCapable for MeleeWeapon {
    fn combo(&self) -> &[SwingProfile] {
        &self.combo
    }
}

impl RangedCapable for RangedWeapon {
    fn windup(&self) -> f32 {
        self.windup
    }

    fn recovery(&self) -> f32 {
        self.recovery
    }

    fn projectile(&self) -> &ProjectileProfile {
        &self.projectile
    }
}

/// Any held weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Weapon {
    /// Melee weapon
    Melee(MeleeWeapon),
    /// Ranged weapon
    Ranged(RangedWeapon),
}

impl Weapon {
    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Melee(w) => &w.name,
            Self::Ranged(w) => &w.name,
        }
    }
}

/// Which attack state an attack request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    /// Melee combo
    Melee,
    /// Ranged fire
    Ranged,
}

/// What an entity is holding. Without a weapon it fights with its fists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loadout {
    /// Held weapon, `None` when disarmed or unarmed
    pub weapon: Option<Weapon>,
    fists: MeleeWeapon,
}

impl Default for Loadout {
    fn default() -> Self {
        Self::unarmed()
    }
}

impl Loadout {
    /// Empty hands.
    #[must_use]
    pub fn unarmed() -> Self {
        Self {
            weapon: None,
            fists: MeleeWeapon::fists(),
        }
    }

    /// Holding `weapon`.
    #[must_use]
    pub fn with_weapon(weapon: Weapon) -> Self {
        Self {
            weapon: Some(weapon),
            ..Self::unarmed()
        }
    }

    /// The attack an attack request should start.
    #[must_use]
    pub fn attack_kind(&self) -> AttackKind {
        match self.weapon {
            Some(Weapon::Ranged(_)) => AttackKind::Ranged,
            Some(Weapon::Melee(_)) | None => AttackKind::Melee,
        }
    }

    /// Melee capability: the held melee weapon, or fists.
    #[must_use]
    pub fn melee(&self) -> &dyn MeleeCapable {
        match &self.weapon {
            Some(Weapon::Melee(w)) => w,
            Some(Weapon::Ranged(_)) | None => &self.fists,
        }
    }

    /// Ranged capability, if a ranged weapon is held.
    #[must_use]
    pub fn ranged(&self) -> Option<&dyn RangedCapable> {
        match &self.weapon {
            Some(Weapon::Ranged(w)) => Some(w),
            Some(Weapon::Melee(_)) | None => None,
        }
    }

    /// Drops the held weapon, returning it.
    pub fn drop_weapon(&mut self) -> Option<Weapon> {
        self.weapon.take()
    }

    /// Whether a weapon is held.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.weapon.is_some()
    }
}
