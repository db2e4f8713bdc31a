//! Physics and collision seam.
//!
//! Combat never owns a broad phase. It asks an [`Environment`] to move bodies
//! and probe for walls, and an [`OverlapQuery`] for the hurtboxes or bodies
//! touching a shape. [`FlatWorld`] is a small concrete environment (a ground
//! plane plus box obstacles) used by the simulation driver and the tests.

use glam::Vec3;
use riposte_common::EntityId;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Creates a new AABB from two corners.
    #[must_use]
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates an AABB from center and half-extents.
    #[must_use]
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Checks if this AABB overlaps with another.
    #[must_use]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmplt(other.max).all() && self.max.cmpgt(other.min).all()
    }

    /// Closest point inside the box to `point`.
    #[must_use]
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }

    /// Distance along a ray to the box, using the slab method.
    #[must_use]
    pub fn ray_distance(&self, origin: Vec3, direction: Vec3) -> Option<(f32, Vec3)> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < f32::EPSILON {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inv;
            let mut t1 = (self.max[axis] - o) * inv;
            let mut n = Vec3::ZERO;
            n[axis] = -d.signum();
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            if t0 > t_min {
                t_min = t0;
                normal = n;
            }
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        if t_max < 0.0 {
            return None;
        }
        Some((t_min.max(0.0), normal))
    }
}

/// A ray hit against static geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Hit point
    pub point: Vec3,
    /// Surface normal at the hit point
    pub normal: Vec3,
    /// Distance from the probe origin
    pub distance: f32,
}

/// Result of moving a body through the environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveResult {
    /// Resolved feet position
    pub position: Vec3,
    /// Velocity with blocked components removed
    pub velocity: Vec3,
    /// Whether the body ended the move on the ground
    pub grounded: bool,
}

/// Capsule-ish body extents used for movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyExtents {
    /// Horizontal radius
    pub radius: f32,
    /// Height from feet to crown
    pub height: f32,
}

/// Static-geometry queries consumed by the action states.
pub trait Environment {
    /// Moves a body by `velocity * dt`, respecting obstacles.
    fn move_body(&self, position: Vec3, velocity: Vec3, extents: BodyExtents, dt: f32)
        -> MoveResult;

    /// Casts a ray against static geometry.
    fn probe(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<Contact>;

    /// Whether a body standing at `position` touches the ground.
    fn ground_contact(&self, position: Vec3) -> bool;
}

/// Ground plane with box obstacles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatWorld {
    /// Height of the ground plane
    pub ground_y: f32,
    /// Solid obstacles
    pub walls: Vec<Aabb>,
}

const GROUND_EPSILON: f32 = 0.01;

impl FlatWorld {
    /// Creates a world with only a ground plane at `ground_y`.
    #[must_use]
    pub fn new(ground_y: f32) -> Self {
        Self {
            ground_y,
            walls: Vec::new(),
        }
    }

    /// Adds an obstacle.
    #[must_use]
    pub fn with_wall(mut self, wall: Aabb) -> Self {
        self.walls.push(wall);
        self
    }

    fn body_box(position: Vec3, extents: BodyExtents) -> Aabb {
        Aabb::new(
            position - Vec3::new(extents.radius, 0.0, extents.radius),
            position + Vec3::new(extents.radius, extents.height, extents.radius),
        )
    }

    fn blocked(&self, position: Vec3, extents: BodyExtents) -> bool {
        let body = Self::body_box(position, extents);
        self.walls.iter().any(|w| w.overlaps(&body))
    }
}

impl Environment for FlatWorld {
    fn move_body(
        &self,
        position: Vec3,
        velocity: Vec3,
        extents: BodyExtents,
        dt: f32,
    ) -> MoveResult {
        let mut pos = position;
        let mut vel = velocity;

        // Resolve one axis at a time so bodies slide along walls.
        for axis in [0usize, 2] {
            let mut next = pos;
            next[axis] += vel[axis] * dt;
            if self.blocked(next, extents) {
                vel[axis] = 0.0;
            } else {
                pos = next;
            }
        }

        let mut next = pos;
        next.y += vel.y * dt;
        let mut grounded = false;
        if next.y <= self.ground_y + GROUND_EPSILON && vel.y <= 0.0 {
            next.y = self.ground_y;
            vel.y = 0.0;
            grounded = true;
        } else if self.blocked(next, extents) {
            if vel.y < 0.0 {
                grounded = true;
            }
            vel.y = 0.0;
            next.y = pos.y;
        }
        pos = next;

        MoveResult {
            position: pos,
            velocity: vel,
            grounded,
        }
    }

    fn probe(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<Contact> {
        let dir = direction.try_normalize()?;
        let mut best: Option<Contact> = None;

        for wall in &self.walls {
            if let Some((distance, normal)) = wall.ray_distance(origin, dir) {
                if distance <= max_distance && best.map_or(true, |b| distance < b.distance) {
                    best = Some(Contact {
                        point: origin + dir * distance,
                        normal,
                        distance,
                    });
                }
            }
        }

        if dir.y < -f32::EPSILON {
            let distance = (origin.y - self.ground_y) / -dir.y;
            if (0.0..=max_distance).contains(&distance)
                && best.map_or(true, |b| distance < b.distance)
            {
                best = Some(Contact {
                    point: origin + dir * distance,
                    normal: Vec3::Y,
                    distance,
                });
            }
        }

        best
    }

    fn ground_contact(&self, position: Vec3) -> bool {
        position.y <= self.ground_y + GROUND_EPSILON
            || self.walls.iter().any(|w| {
                let below = position - Vec3::Y * GROUND_EPSILON * 2.0;
                w.closest_point(below).distance(below) < GROUND_EPSILON
            })
    }
}

/// Collision categories for overlap queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionCategory {
    /// Per-region hit volumes of living combatants
    Hurtbox,
    /// Whole bodies, alive or not (explosions)
    Body,
}

/// Query volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Sphere
    Sphere {
        /// Center
        center: Vec3,
        /// Radius
        radius: f32,
    },
    /// Axis-aligned box
    Aabb(Aabb),
}

impl Shape {
    /// Whether the shape touches a sphere.
    #[must_use]
    pub fn touches_sphere(&self, center: Vec3, radius: f32) -> bool {
        match *self {
            Shape::Sphere {
                center: c,
                radius: r,
            } => c.distance_squared(center) <= (r + radius) * (r + radius),
            Shape::Aabb(aabb) => aabb.closest_point(center).distance_squared(center) <= radius * radius,
        }
    }

    /// Reference point of the shape.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        match *self {
            Shape::Sphere { center, .. } => center,
            Shape::Aabb(aabb) => (aabb.min + aabb.max) * 0.5,
        }
    }
}

/// One body touching a query shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap {
    /// Entity hit
    pub entity: EntityId,
    /// Hit region name, for hurtbox queries
    pub region: Option<String>,
    /// Contact point
    pub point: Vec3,
    /// Distance from the shape's center to the contact point
    pub distance: f32,
}

/// "Return all bodies overlapping shape S on collision category C."
pub trait OverlapQuery {
    /// Overlaps in a stable order, never including `exclude`.
    fn overlapping(&self, shape: &Shape, category: CollisionCategory, exclude: EntityId)
        -> Vec<Overlap>;
}
