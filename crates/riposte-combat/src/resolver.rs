//! Hit resolution.
//!
//! [`HitResolver::process_hit`] turns a raw collision into a final outcome
//! without touching the target; [`HitResolver::apply`] is the only code that
//! writes a target's health, shields, stamina reward, slow or weapon. Both
//! server and client run the same resolver with the same tuning, so a
//! predicted outcome and the authoritative one agree whenever their inputs do.

use glam::Vec3;
use riposte_common::EntityId;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::entity::Actor;
use crate::physics::{CollisionCategory, OverlapQuery, Shape};
use crate::region::RegionCategory;
use crate::timer::TimerKind;
use crate::tuning::CombatTuning;
use crate::weapon::DamageType;

/// One execution of an attack state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwingId {
    /// Attacker
    pub owner: EntityId,
    /// Per-attacker sequence number
    pub seq: u32,
}

/// What produced a hit. Also the dedup scope: one target is hit at most once
/// per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitSource {
    /// A melee swing
    Melee {
        /// Swing
        swing: SwingId,
        /// Combo step the swing belongs to
        combo_step: u8,
    },
    /// A projectile
    Projectile {
        /// Projectile id
        id: u64,
    },
    /// An explosion
    Explosion {
        /// Explosion id
        id: u64,
    },
}

impl HitSource {
    fn seed_bits(self) -> u64 {
        match self {
            Self::Melee { swing, combo_step } => {
                (swing.owner.raw() << 32) ^ (u64::from(swing.seq) << 8) ^ u64::from(combo_step)
            }
            Self::Projectile { id } => id ^ 0x5052_4f4a_0000_0000,
            Self::Explosion { id } => id ^ 0x4558_504c_0000_0000,
        }
    }

    /// Whether this is an area hit.
    #[must_use]
    pub fn is_explosion(self) -> bool {
        matches!(self, Self::Explosion { .. })
    }

    /// Owner and per-owner activation sequence. Explosions have none.
    #[must_use]
    pub fn activation(self) -> Option<(EntityId, u32)> {
        match self {
            Self::Melee { swing, .. } => Some((swing.owner, swing.seq)),
            Self::Projectile { id } => Some((EntityId::from_raw(id >> 32), id as u32)),
            Self::Explosion { .. } => None,
        }
    }
}

/// An attempted damage application.
#[derive(Debug, Clone, PartialEq)]
pub struct HitEvent {
    /// Attacker
    pub attacker: EntityId,
    /// Target
    pub target: EntityId,
    /// Where the attack came from, for the frontal-arc check
    pub origin: Vec3,
    /// Damage before region and block adjustments
    pub base_damage: f32,
    /// Damage type tag
    pub damage_type: DamageType,
    /// Knockback speed
    pub knockback_force: f32,
    /// Knockback direction
    pub knockback_direction: Vec3,
    /// Hitstun on the target (seconds)
    pub hitstun: f32,
    /// Hitlag on the attacker (seconds)
    pub hitlag: f32,
    /// Region reported by the collider
    pub region: Option<String>,
    /// Whether a parry window can upgrade this hit
    pub parryable: bool,
    /// Dedup scope
    pub source: HitSource,

    /// Output: a block reduced the hit
    pub was_blocked: bool,
    /// Output: a parry nullified the hit
    pub was_parried: bool,
    /// Output: damage after multipliers and block
    pub final_damage: f32,
}

impl HitEvent {
    /// A hit with no knockback or stun. Fill the rest with the `with_*` builders.
    #[must_use]
    pub fn new(attacker: EntityId, target: EntityId, base_damage: f32, source: HitSource) -> Self {
        Self {
            attacker,
            target,
            origin: Vec3::ZERO,
            base_damage,
            damage_type: DamageType::default(),
            knockback_force: 0.0,
            knockback_direction: Vec3::ZERO,
            hitstun: 0.0,
            hitlag: 0.0,
            region: None,
            parryable: true,
            source,
            was_blocked: false,
            was_parried: false,
            final_damage: 0.0,
        }
    }

    /// Sets the attack origin.
    #[must_use]
    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the region name.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets knockback.
    #[must_use]
    pub fn with_knockback(mut self, force: f32, direction: Vec3) -> Self {
        self.knockback_force = force;
        self.knockback_direction = direction;
        self
    }

    /// Sets hitstun and hitlag.
    #[must_use]
    pub fn with_timing(mut self, hitstun: f32, hitlag: f32) -> Self {
        self.hitstun = hitstun;
        self.hitlag = hitlag;
        self
    }

    /// Sets the damage type.
    #[must_use]
    pub fn with_damage_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = damage_type;
        self
    }

    /// Knockback velocity carried by the hit.
    #[must_use]
    pub fn knockback_velocity(&self) -> Vec3 {
        self.knockback_direction.normalize_or_zero() * self.knockback_force
    }
}

/// Leg-hit slow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slow {
    /// Speed multiplier
    pub factor: f32,
    /// Duration (seconds)
    pub duration: f32,
}

/// The full result of resolving one hit.
#[derive(Debug, Clone, PartialEq)]
pub struct HitOutcome {
    /// Target
    pub target: EntityId,
    /// Attacker
    pub attacker: EntityId,
    /// Region actually used
    pub region: Option<String>,
    /// Category of that region
    pub category: Option<RegionCategory>,
    /// Multiplier applied
    pub multiplier: f32,
    /// Damage to apply
    pub final_damage: f32,
    /// Reduced by a block
    pub blocked: bool,
    /// Nullified by a parry
    pub parried: bool,
    /// Unblocked head hit above the critical threshold
    pub critical: bool,
    /// Knocks the target's weapon loose
    pub disarm: bool,
    /// Leg-hit slow
    pub slow: Option<Slow>,
    /// Knockback velocity for the target
    pub knockback: Vec3,
    /// Hitstun for the target
    pub hitstun: f32,
    /// Hitlag for the attacker
    pub hitlag: f32,
    /// Stamina granted to the defender
    pub parry_reward: f32,
    /// A parried projectile is sent back
    pub reflect: bool,
}

/// What [`HitResolver::apply`] changed.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedHit {
    /// Health and shields actually removed
    pub damage_taken: f32,
    /// Name of the weapon knocked loose
    pub dropped_weapon: Option<String>,
    /// The target died from this hit
    pub killed: bool,
}

/// An area blast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blast {
    /// Entity responsible, never hit by its own blast
    pub source: EntityId,
    /// Dedup id
    pub id: u64,
    /// Epicenter
    pub center: Vec3,
    /// Radius
    pub radius: f32,
    /// Damage at the epicenter
    pub damage: f32,
    /// Knockback at the epicenter
    pub knockback: f32,
    /// Extra upward push, as a fraction of the knockback direction
    pub lift: f32,
    /// Hitstun at the epicenter
    pub hitstun: f32,
}

/// Damage fraction at `distance` from an epicenter: 1.0 at the center,
/// falling linearly toward `min_fraction` at the radius, zero at or beyond it.
#[must_use]
pub fn explosion_falloff(distance: f32, radius: f32, min_fraction: f32) -> f32 {
    if radius <= 0.0 || distance >= radius {
        return 0.0;
    }
    let t = (distance.max(0.0) / radius).clamp(0.0, 1.0);
    1.0 - (1.0 - min_fraction) * t
}

fn write_back(event: &mut HitEvent, outcome: &HitOutcome) {
    event.was_blocked = outcome.blocked;
    event.was_parried = outcome.parried;
    event.final_damage = outcome.final_damage;
}

/// Region, block and parry adjudication.
#[derive(Debug, Clone, Copy)]
pub struct HitResolver<'a> {
    tuning: &'a CombatTuning,
}

impl<'a> HitResolver<'a> {
    /// Creates a resolver over `tuning`.
    #[must_use]
    pub fn new(tuning: &'a CombatTuning) -> Self {
        Self { tuning }
    }

    /// Whether `origin` lies inside the target's frontal arc.
    #[must_use]
    pub fn in_frontal_arc(&self, target: &Actor, origin: Vec3) -> bool {
        let to_attacker = origin - target.body.position;
        let flat = Vec3::new(to_attacker.x, 0.0, to_attacker.z);
        match flat.try_normalize() {
            Some(dir) => target.body.forward().dot(dir) > self.tuning.block_arc_dot,
            None => true,
        }
    }

    /// Resolves a hit against `target` at simulation time `now`.
    ///
    /// Fills the event's output fields and returns the outcome. The target is
    /// not modified.
    pub fn process_hit(&self, event: &mut HitEvent, target: &Actor, now: f64) -> HitOutcome {
        let t = self.tuning;
        let knockback = event.knockback_velocity();

        let mut outcome = HitOutcome {
            target: event.target,
            attacker: event.attacker,
            region: None,
            category: None,
            multiplier: 1.0,
            final_damage: event.base_damage.max(0.0),
            blocked: false,
            parried: false,
            critical: false,
            disarm: false,
            slow: None,
            knockback,
            hitstun: event.hitstun,
            hitlag: event.hitlag,
            parry_reward: 0.0,
            reflect: false,
        };

        if event.source.is_explosion() {
            // Area damage already carries its falloff and ignores regions and blocks.
            write_back(event, &outcome);
            return outcome;
        }

        let (blockable, category, multiplier) = match target.regions.lookup(event.region.as_deref()) {
            Some(region) => {
                outcome.region = Some(region.name.clone());
                (region.blockable, Some(region.category), region.multiplier)
            }
            None => (true, None, t.torso_multiplier),
        };
        outcome.category = category;
        outcome.multiplier = multiplier;
        let scaled = event.base_damage.max(0.0) * multiplier;
        outcome.final_damage = scaled;

        let covering_block = target
            .block
            .filter(|_| blockable && self.in_frontal_arc(target, event.origin));

        if let Some(block) = covering_block {
            if event.parryable && block.in_parry_window(now) {
                outcome.parried = true;
                outcome.final_damage = 0.0;
                outcome.knockback = Vec3::ZERO;
                outcome.hitstun = 0.0;
                outcome.hitlag = 0.0;
                outcome.parry_reward = t.parry_stamina_reward;
                outcome.reflect = matches!(event.source, HitSource::Projectile { .. });
                debug!(attacker = %event.attacker, defender = %event.target, "hit parried");
            } else {
                let kept = 1.0 - t.block_reduction;
                outcome.blocked = true;
                outcome.final_damage = scaled * kept;
                outcome.knockback = knockback * kept;
                outcome.hitstun = 0.0;
                trace!(target = %event.target, damage = outcome.final_damage, "hit blocked");
            }
        }

        let landed = !outcome.parried && outcome.final_damage > 0.0;

        outcome.critical = !outcome.blocked
            && !outcome.parried
            && category == Some(RegionCategory::Head)
            && multiplier >= t.critical_threshold;

        if landed && category.is_some_and(RegionCategory::can_disarm) && target.loadout.is_armed() {
            let chance = (outcome.final_damage * t.weapon_drop_chance_per_damage)
                .min(t.weapon_drop_max_chance);
            let seed = event.source.seed_bits() ^ event.target.raw().wrapping_mul(0x9E37_79B9_7F4A_7C15);
            let roll = fastrand::Rng::with_seed(seed).f32();
            outcome.disarm = roll < chance;
        }

        if landed && category == Some(RegionCategory::Leg) {
            outcome.slow = Some(Slow {
                factor: t.leg_slow_factor,
                duration: t.leg_slow_duration,
            });
        }

        write_back(event, &outcome);
        outcome
    }

    /// Applies an outcome's stat effects to the target.
    ///
    /// Knockback and hitstun are left to the choreography, which needs the
    /// attacker's hitlag to order them.
    pub fn apply(&self, target: &mut Actor, outcome: &HitOutcome) -> AppliedHit {
        let was_dead = target.is_dead();
        let damage_taken = target.vitals.absorb(outcome.final_damage);

        if outcome.parry_reward > 0.0 {
            target.vitals.grant_stamina(outcome.parry_reward);
        }

        if let Some(slow) = outcome.slow {
            // Refresh, never stack.
            target.status.slow_factor = slow.factor;
            target.status.timers.start(TimerKind::Slow, slow.duration);
        }

        let dropped_weapon = if outcome.disarm {
            target.loadout.drop_weapon().map(|w| w.name().to_owned())
        } else {
            None
        };

        AppliedHit {
            damage_taken,
            dropped_weapon,
            killed: !was_dead && target.is_dead(),
        }
    }

    /// Builds one hit per body inside the blast, excluding the source.
    pub fn explosion_hits<Q: OverlapQuery + ?Sized>(&self, world: &Q, blast: &Blast) -> Vec<HitEvent> {
        let shape = Shape::Sphere {
            center: blast.center,
            radius: blast.radius,
        };
        let mut seen = Vec::new();

        world
            .overlapping(&shape, CollisionCategory::Body, blast.source)
            .into_iter()
            .filter_map(|overlap| {
                if seen.contains(&overlap.entity) {
                    return None;
                }
                seen.push(overlap.entity);

                let fraction = explosion_falloff(overlap.distance, blast.radius, self.tuning.explosion_min_falloff);
                if fraction <= 0.0 {
                    return None;
                }
                let away = (overlap.point - blast.center).normalize_or_zero();
                let direction = Vec3::new(away.x, 0.0, away.z).normalize_or_zero() + Vec3::Y * blast.lift;

                let mut event = HitEvent::new(
                    blast.source,
                    overlap.entity,
                    blast.damage * fraction,
                    HitSource::Explosion { id: blast.id },
                )
                .with_origin(blast.center)
                .with_knockback(blast.knockback * fraction, direction)
                .with_timing(blast.hitstun * fraction, 0.0)
                .with_damage_type(DamageType::Explosive);
                event.parryable = false;
                Some(event)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockState;
    use crate::region::RegionTable;
    use crate::weapon::{Loadout, MeleeWeapon, Weapon};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn target(tuning: &CombatTuning) -> Actor {
        // Faces +Z.
        Actor::new(
            EntityId::from_raw(2),
            Vec3::ZERO,
            Arc::new(RegionTable::humanoid(tuning)),
        )
    }

    fn melee(region: &str, damage: f32, origin: Vec3) -> HitEvent {
        HitEvent::new(
            EntityId::from_raw(1),
            EntityId::from_raw(2),
            damage,
            HitSource::Melee {
                swing: SwingId {
                    owner: EntityId::from_raw(1),
                    seq: 1,
                },
                combo_step: 0,
            },
        )
        .with_origin(origin)
        .with_region(region)
        .with_knockback(6.0, Vec3::NEG_Z)
        .with_timing(0.3, 0.08)
    }

    const FRONT: Vec3 = Vec3::new(0.0, 0.0, 1.5);
    const BEHIND: Vec3 = Vec3::new(0.0, 0.0, -1.5);

    #[test]
    fn test_unblocked_head_hit() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let mut event = melee("head", 30.0, FRONT);

        let outcome = resolver.process_hit(&mut event, &target(&tuning), 0.0);

        assert!((outcome.final_damage - 90.0).abs() < 1e-4);
        assert!((event.final_damage - 90.0).abs() < 1e-4);
        assert!(outcome.critical);
        assert!(!event.was_blocked);
    }

    #[test]
    fn test_blocked_leg_hit() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let mut defender = target(&tuning);
        defender.block = Some(BlockState::raise(0.0, tuning.parry_window));
        let mut event = melee("thigh_l", 30.0, FRONT);

        let outcome = resolver.process_hit(&mut event, &defender, 1.0);

        assert!((outcome.final_damage - 7.2).abs() < 1e-4);
        assert!(event.was_blocked);
        assert!(!event.was_parried);
        assert!(outcome.hitstun.abs() < f32::EPSILON);
        assert!(!outcome.critical);
    }

    #[test]
    fn test_block_ignored_from_behind() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let mut defender = target(&tuning);
        defender.block = Some(BlockState::raise(0.0, tuning.parry_window));
        let mut event = melee("torso", 30.0, BEHIND);

        let outcome = resolver.process_hit(&mut event, &defender, 1.0);

        assert!(!outcome.blocked);
        assert!((outcome.final_damage - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_block_covers_the_sides() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let mut defender = target(&tuning);
        defender.block = Some(BlockState::raise(0.0, tuning.parry_window));
        let mut event = melee("torso", 30.0, Vec3::new(1.5, 0.0, 0.0));

        assert!(resolver.process_hit(&mut event, &defender, 1.0).blocked);
    }

    #[test]
    fn test_shin_is_never_blocked() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let mut defender = target(&tuning);
        defender.block = Some(BlockState::raise(0.0, tuning.parry_window));
        let mut event = melee("shin_r", 30.0, FRONT);

        let outcome = resolver.process_hit(&mut event, &defender, 1.0);

        assert!(!outcome.blocked);
        assert!((outcome.final_damage - 24.0).abs() < 1e-4);
        assert!(outcome.slow.is_some());
    }

    #[test]
    fn test_parry_inside_window() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let mut defender = target(&tuning);
        defender.block = Some(BlockState::raise(1.0, tuning.parry_window));

        let mut early = melee("torso", 30.0, FRONT);
        let parried = resolver.process_hit(&mut early, &defender, 1.05);
        assert!(parried.parried);
        assert!(early.was_parried);
        assert!(parried.final_damage.abs() < f32::EPSILON);
        assert!(parried.parry_reward > 0.0);
        assert!(!parried.reflect);

        let mut late = melee("torso", 30.0, FRONT);
        let blocked = resolver.process_hit(&mut late, &defender, 1.5);
        assert!(!blocked.parried);
        assert!(blocked.blocked);
        assert!((blocked.final_damage - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_parried_projectile_reflects() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let mut defender = target(&tuning);
        defender.block = Some(BlockState::raise(0.0, tuning.parry_window));
        let mut event = HitEvent::new(
            EntityId::from_raw(1),
            EntityId::from_raw(2),
            35.0,
            HitSource::Projectile { id: 9 },
        )
        .with_origin(FRONT)
        .with_region("torso");

        let outcome = resolver.process_hit(&mut event, &defender, 0.05);
        assert!(outcome.parried);
        assert!(outcome.reflect);
    }

    #[test]
    fn test_unknown_region_uses_torso() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let mut event = melee("antenna", 30.0, FRONT);

        let outcome = resolver.process_hit(&mut event, &target(&tuning), 0.0);

        assert_eq!(outcome.region.as_deref(), Some("torso"));
        assert!((outcome.final_damage - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_apply_sets_slow_and_refreshes() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let mut defender = target(&tuning);

        let mut event = melee("thigh_r", 10.0, FRONT);
        let outcome = resolver.process_hit(&mut event, &defender, 0.0);
        resolver.apply(&mut defender, &outcome);
        defender.status.timers.advance(1.0);
        resolver.apply(&mut defender, &outcome);

        assert!((defender.status.slow_factor - tuning.leg_slow_factor).abs() < f32::EPSILON);
        assert!((defender.status.timers.remaining(TimerKind::Slow) - tuning.leg_slow_duration).abs() < 1e-5);
    }

    #[test]
    fn test_guaranteed_disarm_drops_weapon() {
        let tuning = CombatTuning {
            weapon_drop_chance_per_damage: 1.0,
            weapon_drop_max_chance: 1.0,
            ..CombatTuning::default()
        };
        let resolver = HitResolver::new(&tuning);
        let mut defender = target(&tuning).with_loadout(Loadout::with_weapon(Weapon::Melee(MeleeWeapon::sword())));

        let mut event = melee("hand_r", 20.0, FRONT);
        let outcome = resolver.process_hit(&mut event, &defender, 0.0);
        assert!(outcome.disarm);

        let applied = resolver.apply(&mut defender, &outcome);
        assert_eq!(applied.dropped_weapon.as_deref(), Some("sword"));
        assert!(!defender.loadout.is_armed());
    }

    #[test]
    fn test_disarm_never_rolls_when_unarmed() {
        let tuning = CombatTuning {
            weapon_drop_chance_per_damage: 1.0,
            weapon_drop_max_chance: 1.0,
            ..CombatTuning::default()
        };
        let resolver = HitResolver::new(&tuning);
        let mut event = melee("arm_l", 20.0, FRONT);
        assert!(!resolver.process_hit(&mut event, &target(&tuning), 0.0).disarm);
    }

    #[test]
    fn test_disarm_roll_is_deterministic() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let defender = target(&tuning).with_loadout(Loadout::with_weapon(Weapon::Melee(MeleeWeapon::sword())));

        let first = resolver.process_hit(&mut melee("hand_l", 30.0, FRONT), &defender, 0.0);
        let second = resolver.process_hit(&mut melee("hand_l", 30.0, FRONT), &defender, 0.0);
        assert_eq!(first.disarm, second.disarm);
    }

    #[test]
    fn test_lethal_hit_reports_kill_once() {
        let tuning = CombatTuning::default();
        let resolver = HitResolver::new(&tuning);
        let mut defender = target(&tuning);

        let outcome = resolver.process_hit(&mut melee("head", 50.0, FRONT), &defender, 0.0);
        assert!(resolver.apply(&mut defender, &outcome).killed);
        assert!(!resolver.apply(&mut defender, &outcome).killed);
        assert!(defender.vitals.health.abs() < f32::EPSILON);
    }

    #[test]
    fn test_falloff_endpoints() {
        assert!((explosion_falloff(0.0, 5.0, 0.25) - 1.0).abs() < f32::EPSILON);
        assert!((explosion_falloff(2.5, 5.0, 0.25) - 0.625).abs() < 1e-6);
        assert!(explosion_falloff(5.0, 5.0, 0.25).abs() < f32::EPSILON);
        assert!(explosion_falloff(7.0, 5.0, 0.25).abs() < f32::EPSILON);
        assert!((explosion_falloff(4.999_9, 5.0, 0.25) - 0.25).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn prop_falloff_is_monotonic(a in 0.0f32..20.0, b in 0.0f32..20.0, radius in 0.5f32..10.0, min in 0.0f32..1.0) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(explosion_falloff(near, radius, min) >= explosion_falloff(far, radius, min));
        }

        #[test]
        fn prop_block_reduction(base in 1.0f32..200.0, reduction in 0.0f32..1.0) {
            let tuning = CombatTuning { block_reduction: reduction, ..CombatTuning::default() };
            let resolver = HitResolver::new(&tuning);
            let mut defender = target(&tuning);
            defender.block = Some(BlockState::raise(0.0, tuning.parry_window));

            let outcome = resolver.process_hit(&mut melee("arm_r", base, FRONT), &defender, 10.0);
            let expected = base * tuning.arm_multiplier * (1.0 - reduction);
            prop_assert!((outcome.final_damage - expected).abs() <= expected.abs() * 1e-5 + 1e-5);

            let unblocked = resolver.process_hit(&mut melee("arm_r", base, BEHIND), &defender, 10.0);
            prop_assert!((unblocked.final_damage - base * tuning.arm_multiplier).abs() < 1e-3);
        }
    }
}
