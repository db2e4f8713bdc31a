//! Entity registry owned by the simulation.
//!
//! Entities register and deregister through the arena; nothing else keeps a
//! roster. Ids are handed out sequentially, so two arenas fed the same spawn
//! order agree on every id.

use ahash::AHashMap;
use glam::Vec3;
use riposte_common::EntityId;
use thiserror::Error;
use tracing::debug;

use crate::entity::Entity;
use crate::physics::{CollisionCategory, Overlap, OverlapQuery, Shape};

/// Errors raised by the arena.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    /// Another entity already uses this name
    #[error("entity name `{0}` is already taken")]
    DuplicateName(String),
    /// The id is not registered
    #[error("entity {0} not found")]
    NotFound(EntityId),
}

impl From<ArenaError> for riposte_common::RiposteError {
    fn from(err: ArenaError) -> Self {
        Self::Arena(err.to_string())
    }
}

/// Owner of every live entity.
#[derive(Debug, Default)]
pub struct Arena {
    entities: Vec<Entity>,
    index: AHashMap<EntityId, usize>,
    names: AHashMap<String, EntityId>,
    next_id: u64,
}

impl Arena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next spawn will receive.
    #[must_use]
    pub fn peek_next_id(&self) -> EntityId {
        EntityId::from_raw(self.next_id + 1)
    }

    /// Registers an entity built by `build` with a freshly minted id.
    pub fn spawn<F>(&mut self, name: &str, build: F) -> Result<EntityId, ArenaError>
    where
        F: FnOnce(EntityId) -> Entity,
    {
        if self.names.contains_key(name) {
            return Err(ArenaError::DuplicateName(name.to_owned()));
        }

        self.next_id += 1;
        let id = EntityId::from_raw(self.next_id);
        let mut entity = build(id);
        entity.actor.id = id;
        entity.name = name.to_owned();

        self.index.insert(id, self.entities.len());
        self.names.insert(name.to_owned(), id);
        self.entities.push(entity);

        debug!(%id, name, "spawned entity");
        Ok(id)
    }

    /// Removes an entity.
    pub fn despawn(&mut self, id: EntityId) -> Result<Entity, ArenaError> {
        let slot = self.index.remove(&id).ok_or(ArenaError::NotFound(id))?;
        let entity = self.entities.swap_remove(slot);
        if let Some(moved) = self.entities.get(slot) {
            self.index.insert(moved.id(), slot);
        }
        self.names.remove(&entity.name);

        debug!(%id, name = %entity.name, "despawned entity");
        Ok(entity)
    }

    /// Looks an entity up by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&i| &self.entities[i])
    }

    /// Looks an entity up by id, mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = *self.index.get(&id)?;
        self.entities.get_mut(slot)
    }

    /// Looks an entity up by its unique name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    /// Ids of entities whose center lies within `radius` of `center`, sorted.
    #[must_use]
    pub fn within_radius(&self, center: Vec3, radius: f32) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .entities
            .iter()
            .filter(|e| e.actor.body.center().distance(center) <= radius)
            .map(Entity::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// All ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates over entities in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }
}

impl OverlapQuery for Arena {
    fn overlapping(
        &self,
        shape: &Shape,
        category: CollisionCategory,
        exclude: EntityId,
    ) -> Vec<Overlap> {
        let origin = shape.center();
        let mut hits: Vec<Overlap> = self
            .entities
            .iter()
            .filter(|e| e.id() != exclude)
            .filter_map(|e| {
                let body = &e.actor.body;
                match category {
                    CollisionCategory::Hurtbox => {
                        if e.actor.is_dead() {
                            return None;
                        }
                        let (region, point) = e.actor.regions.nearest_touched(
                            body.position,
                            body.yaw,
                            |center, radius| {
                                shape
                                    .touches_sphere(center, radius)
                                    .then(|| center.distance(origin))
                            },
                        )?;
                        Some(Overlap {
                            entity: e.id(),
                            region: Some(region.name.clone()),
                            point,
                            distance: point.distance(origin),
                        })
                    }
                    CollisionCategory::Body => {
                        let center = body.center();
                        let radius = body.extents.radius.max(body.extents.height * 0.5);
                        shape.touches_sphere(center, radius).then(|| Overlap {
                            entity: e.id(),
                            region: None,
                            point: center,
                            distance: center.distance(origin),
                        })
                    }
                }
            })
            .collect();
        hits.sort_by_key(|o| o.entity);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Actor;
    use crate::region::RegionTable;
    use crate::tuning::CombatTuning;
    use std::sync::Arc;

    fn spawn_at(arena: &mut Arena, name: &str, position: Vec3) -> EntityId {
        let regions = Arc::new(RegionTable::humanoid(&CombatTuning::default()));
        arena
            .spawn(name, |id| Entity::new(name, Actor::new(id, position, regions), 8))
            .expect("spawn")
    }

    #[test]
    fn test_sequential_ids() {
        let mut arena = Arena::new();
        let a = spawn_at(&mut arena, "a", Vec3::ZERO);
        let b = spawn_at(&mut arena, "b", Vec3::X);

        assert_eq!(a.raw(), 1);
        assert_eq!(b.raw(), 2);
        assert_eq!(arena.peek_next_id().raw(), 3);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut arena = Arena::new();
        spawn_at(&mut arena, "a", Vec3::ZERO);
        let regions = Arc::new(RegionTable::humanoid(&CombatTuning::default()));
        let result = arena.spawn("a", |id| Entity::new("a", Actor::new(id, Vec3::ZERO, regions), 8));
        assert_eq!(result, Err(ArenaError::DuplicateName("a".to_owned())));
    }

    #[test]
    fn test_despawn_keeps_index_consistent() {
        let mut arena = Arena::new();
        let a = spawn_at(&mut arena, "a", Vec3::ZERO);
        let b = spawn_at(&mut arena, "b", Vec3::X);
        let c = spawn_at(&mut arena, "c", Vec3::Z);

        arena.despawn(a).expect("despawn");
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(c).map(|e| e.name.as_str()), Some("c"));
        assert_eq!(arena.get(b).map(|e| e.name.as_str()), Some("b"));
        assert_eq!(arena.find_by_name("a"), None);
        assert_eq!(arena.despawn(a).err(), Some(ArenaError::NotFound(a)));
        assert_eq!(arena.ids(), vec![b, c]);
    }

    #[test]
    fn test_within_radius() {
        let mut arena = Arena::new();
        let near = spawn_at(&mut arena, "near", Vec3::new(1.0, 0.0, 0.0));
        spawn_at(&mut arena, "far", Vec3::new(20.0, 0.0, 0.0));

        assert_eq!(arena.within_radius(Vec3::new(0.0, 0.9, 0.0), 3.0), vec![near]);
    }

    #[test]
    fn test_hurtbox_overlap_reports_region_and_skips_excluded() {
        let mut arena = Arena::new();
        let attacker = spawn_at(&mut arena, "attacker", Vec3::ZERO);
        let target = spawn_at(&mut arena, "target", Vec3::new(0.0, 0.0, 1.0));

        let shape = Shape::Sphere {
            center: Vec3::new(0.0, 1.65, 1.0),
            radius: 0.1,
        };
        let hits = arena.overlapping(&shape, CollisionCategory::Hurtbox, attacker);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity, target);
        assert_eq!(hits[0].region.as_deref(), Some("head"));
    }

    #[test]
    fn test_dead_entities_have_no_hurtboxes() {
        let mut arena = Arena::new();
        let target = spawn_at(&mut arena, "target", Vec3::ZERO);
        if let Some(e) = arena.get_mut(target) {
            e.actor.vitals.absorb(1000.0);
        }

        let shape = Shape::Sphere {
            center: Vec3::new(0.0, 1.0, 0.0),
            radius: 2.0,
        };
        assert!(arena
            .overlapping(&shape, CollisionCategory::Hurtbox, EntityId::NULL)
            .is_empty());
        assert_eq!(
            arena.overlapping(&shape, CollisionCategory::Body, EntityId::NULL).len(),
            1
        );
    }
}
