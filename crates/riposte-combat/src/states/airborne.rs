use glam::Vec3;
use tracing::debug;

use super::{
    attack_transition, dodge_transition, locomotion_exit, move_toward, StateCx, StateEffect,
    StateId, StatePolicy, StateTraits,
};
use crate::input::{InputAction, InputData};

/// Vertical sub-phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirPhase {
    /// Moving up
    Rising,
    /// Moving down
    Falling,
}

const PROBE_DIRECTIONS: [Vec3; 4] = [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z];

/// Jumping, falling or launched.
#[derive(Debug, Clone, PartialEq)]
pub struct Airborne {
    jump_velocity: Option<f32>,
    elapsed: f32,
    phase: AirPhase,
    wall_normal: Option<Vec3>,
}

impl Airborne {
    /// Enters the air with an optional jump impulse.
    #[must_use]
    pub fn new(jump_velocity: Option<f32>) -> Self {
        Self {
            jump_velocity,
            elapsed: 0.0,
            phase: AirPhase::Falling,
            wall_normal: None,
        }
    }

    /// Current sub-phase.
    #[must_use]
    pub fn phase(&self) -> AirPhase {
        self.phase
    }

    /// Normal of the wall in contact, if any.
    #[must_use]
    pub fn wall_normal(&self) -> Option<Vec3> {
        self.wall_normal
    }

    fn probe_walls(cx: &StateCx<'_, '_>) -> Option<Vec3> {
        let body = &cx.actor.body;
        let reach = body.extents.radius + cx.env.tuning.wall_probe_distance;
        PROBE_DIRECTIONS
            .iter()
            .filter_map(|&dir| cx.env.world.probe(body.center(), dir, reach))
            .filter(|c| c.normal.y.abs() < 0.5)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .map(|c| c.normal)
    }

    fn wall_jump(&mut self, normal: Vec3, cx: &mut StateCx<'_, '_>) {
        let t = cx.tuning();
        let away = Vec3::new(normal.x, 0.0, normal.z).normalize_or_zero();
        cx.actor.body.velocity = away * t.wall_jump_horizontal + Vec3::Y * t.wall_jump_vertical;
        cx.actor.body.face(away);
        self.phase = AirPhase::Rising;
        self.wall_normal = None;
        cx.animate("wall_jump");
    }

    fn air_control(cx: &mut StateCx<'_, '_>, dt: f32) {
        let t = cx.tuning();
        let movement = cx.actor.controls.movement;
        if movement.length_squared() <= 1e-4 {
            // Launch momentum is never decayed without input.
            return;
        }

        let speed = t.move_speed * cx.actor.status.slow_factor;
        let current = cx.actor.body.horizontal_velocity();
        let speed_ratio = (current.length() / t.move_speed).min(2.0);
        let alignment = current
            .try_normalize()
            .map_or(1.0, |dir| dir.dot(movement.normalize_or_zero()));
        let against = (1.0 - alignment) * 0.5;
        let penalty = (t.air_control_penalty * speed_ratio * (1.0 + against)).clamp(0.0, 1.0);

        let desired = movement * speed.max(current.length());
        let next = move_toward(current, desired, t.air_control * (1.0 - penalty) * dt);
        cx.actor.body.velocity.x = next.x;
        cx.actor.body.velocity.z = next.z;
    }
}

impl StatePolicy for Airborne {
    fn id(&self) -> StateId {
        StateId::Airborne
    }

    fn traits(&self) -> StateTraits {
        StateTraits {
            can_be_interrupted: false,
            priority: 1,
            allows_movement: true,
            allows_rotation: true,
        }
    }

    fn on_enter(&mut self, _previous: StateId, cx: &mut StateCx<'_, '_>) {
        self.elapsed = 0.0;
        if let Some(velocity) = self.jump_velocity {
            cx.actor.body.velocity.y = velocity;
            cx.actor.body.grounded = false;
            self.phase = AirPhase::Rising;
            cx.animate("jump");
        } else {
            self.phase = AirPhase::Falling;
            cx.animate("fall");
        }
    }

    fn on_physics_process(&mut self, dt: f32, cx: &mut StateCx<'_, '_>) {
        let t = cx.tuning();
        self.elapsed += dt;
        self.wall_normal = Self::probe_walls(cx);

        let vy = cx.actor.body.velocity.y;
        self.phase = if vy > 0.0 {
            AirPhase::Rising
        } else {
            AirPhase::Falling
        };

        let sliding = self.wall_normal.is_some() && self.phase == AirPhase::Falling;
        let gravity_scale = if sliding { t.wall_slide_gravity_scale } else { 1.0 };
        cx.actor.body.velocity.y -= t.gravity * gravity_scale * dt;

        // A replayed wall jump carries its own normal and is trusted as is.
        if let Some(data) = cx.input.consume_with_data(InputAction::WallJump) {
            let normal = match data {
                InputData::WallNormal(n) => Some(n),
                InputData::None | InputData::Direction(_) => self.wall_normal,
            };
            if let Some(normal) = normal {
                if cx.env.remote_driven {
                    cx.input.consume(InputAction::Jump);
                }
                self.wall_jump(normal, cx);
                return;
            }
            debug!(entity = %cx.actor.id, "wall jump without a wall ignored");
        }

        if !cx.env.remote_driven {
            if let Some(normal) = self.wall_normal {
                if cx.input.consume(InputAction::Jump) {
                    self.wall_jump(normal, cx);
                    cx.emit(StateEffect::WallJump { normal });
                    return;
                }
            }
        }

        if let Some(dash) = dodge_transition(cx) {
            cx.request(dash);
            return;
        }
        if cx.input.consume(InputAction::Attack) {
            let attack = attack_transition(cx.actor, 0);
            cx.request(attack);
            return;
        }

        Self::air_control(cx, dt);

        let landed = cx.actor.body.grounded && cx.actor.body.velocity.y <= 0.0;
        if landed && self.elapsed >= t.min_airborne_time {
            cx.actor.body.velocity.y = 0.0;
            let exit = locomotion_exit(cx.actor);
            cx.request(exit);
        }
    }

    fn can_transition_to(&self, target: StateId) -> bool {
        matches!(
            target,
            StateId::Idle
                | StateId::Moving
                | StateId::Airborne
                | StateId::Dash
                | StateId::MeleeAttack
                | StateId::RangedAttack
                | StateId::Stunned
                | StateId::Dead
        )
    }

    fn drives_vertical(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::input::InputBuffer;
    use crate::physics::{Aabb, FlatWorld};
    use crate::states::MachineEnv;
    use crate::tuning::CombatTuning;

    fn wall_world() -> FlatWorld {
        // Wall face at x = 1.0, facing -X.
        FlatWorld::new(0.0).with_wall(Aabb::new(Vec3::new(1.0, 0.0, -5.0), Vec3::new(2.0, 6.0, 5.0)))
    }

    #[test]
    fn test_jump_sets_vertical_velocity() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor();
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        let mut state = Airborne::new(Some(8.0));
        state.on_enter(StateId::Idle, &mut cx);

        assert!((cx.actor.body.velocity.y - 8.0).abs() < f32::EPSILON);
        assert!(!cx.actor.body.grounded);
        assert_eq!(state.phase(), AirPhase::Rising);
    }

    #[test]
    fn test_landing_waits_for_min_airtime() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor();
        actor.body.grounded = true;
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        let mut state = Airborne::new(None);
        state.on_physics_process(tuning.min_airborne_time * 0.5, &mut cx);
        assert!(cx.pending().is_none());

        state.on_physics_process(tuning.min_airborne_time, &mut cx);
        assert_eq!(cx.pending().map(|t| t.target), Some(StateId::Idle));
    }

    #[test]
    fn test_momentum_preserved_without_input() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor();
        actor.body.grounded = false;
        actor.body.position.y = 5.0;
        actor.body.velocity = Vec3::new(10.0, 0.0, 0.0);
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        Airborne::new(None).on_physics_process(0.1, &mut cx);
        assert!((cx.actor.body.velocity.x - 10.0).abs() < f32::EPSILON);
        assert!(cx.actor.body.velocity.y < 0.0);
    }

    #[test]
    fn test_steering_against_momentum_is_weaker() {
        let tuning = CombatTuning::default();
        let world = FlatWorld::new(0.0);
        let env = env(&tuning, &world, 0.0);

        let steer = |movement: Vec3| {
            let mut actor = actor();
            actor.body.grounded = false;
            actor.body.position.y = 5.0;
            actor.body.velocity = Vec3::new(4.0, 0.0, 0.0);
            actor.controls.movement = movement;
            let mut input = InputBuffer::default();
            let mut effects = Vec::new();
            let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);
            Airborne::new(None).on_physics_process(0.05, &mut cx);
            (cx.actor.body.horizontal_velocity() - Vec3::new(4.0, 0.0, 0.0)).length()
        };

        let with = steer(Vec3::new(0.0, 0.0, 1.0));
        let against = steer(Vec3::new(-1.0, 0.0, 0.0));
        assert!(against < with);
    }

    #[test]
    fn test_wall_slide_reduces_gravity() {
        let tuning = CombatTuning::default();
        let world = wall_world();
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor();
        actor.body.grounded = false;
        actor.body.position = Vec3::new(0.5, 3.0, 0.0);
        actor.body.velocity = Vec3::new(0.0, -1.0, 0.0);
        let mut input = InputBuffer::default();
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        let mut state = Airborne::new(None);
        state.on_physics_process(0.1, &mut cx);

        assert_eq!(state.wall_normal(), Some(Vec3::NEG_X));
        let expected = -1.0 - tuning.gravity * tuning.wall_slide_gravity_scale * 0.1;
        assert!((cx.actor.body.velocity.y - expected).abs() < 1e-5);
    }

    #[test]
    fn test_local_wall_jump_emits_replay() {
        let tuning = CombatTuning::default();
        let world = wall_world();
        let env = env(&tuning, &world, 0.0);
        let mut actor = actor();
        actor.body.grounded = false;
        actor.body.position = Vec3::new(0.5, 3.0, 0.0);
        actor.body.velocity = Vec3::new(0.0, -1.0, 0.0);
        let mut input = InputBuffer::default();
        input.push(InputAction::Jump, InputData::None);
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        Airborne::new(None).on_physics_process(1.0 / 60.0, &mut cx);

        assert!(cx.actor.body.velocity.x < 0.0);
        assert!(cx.actor.body.velocity.y > 0.0);
        assert!(effects.contains(&StateEffect::WallJump { normal: Vec3::NEG_X }));
    }

    #[test]
    fn test_replayed_wall_jump_trusts_normal() {
        let tuning = CombatTuning::default();
        // No walls at all: the server does not re-check geometry.
        let world = FlatWorld::new(0.0);
        let env = MachineEnv {
            tuning: &tuning,
            world: &world,
            now: 0.0,
            remote_driven: true,
        };
        let mut actor = actor();
        actor.body.grounded = false;
        actor.body.position.y = 3.0;
        let mut input = InputBuffer::default();
        input.push(InputAction::Jump, InputData::None);
        input.push(InputAction::WallJump, InputData::WallNormal(Vec3::Z));
        let mut effects = Vec::new();
        let mut cx = StateCx::new(&env, &mut actor, &mut input, &mut effects);

        Airborne::new(None).on_physics_process(1.0 / 60.0, &mut cx);

        assert!((cx.actor.body.velocity.z - tuning.wall_jump_horizontal).abs() < 1e-5);
        assert!(cx.input.is_empty());
        assert!(!effects.iter().any(|e| matches!(e, StateEffect::WallJump { .. })));
    }
}
