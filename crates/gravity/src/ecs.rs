//! Bridge between a `hecs` world and the gravity session.
//!
//! Entities carrying [`GravityBody`] + [`WorldPosition`] are registered once and
//! tagged with [`GravityLink`]. Each entity gets an [`OwnerToken`] component, so
//! despawning it lets the registry prune the body on the next update.

use std::collections::HashMap;

use engine_core::{AppliedForce, GravityBody, OwnerToken, RenderScale, Velocity, WorldPosition};
use glam::DVec3;
use hecs::{Entity, World};

use crate::registry::{BodyDescriptor, BodyId};
use crate::unified::UnifiedGravitySystem;

/// Links an entity to its registered body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GravityLink(pub BodyId);

impl UnifiedGravitySystem {
    /// Register every unlinked gravity entity in `world`. Returns how many were added.
    pub fn auto_register_all(&mut self, world: &mut World) -> usize {
        let pending: Vec<(Entity, BodyDescriptor, DVec3, OwnerToken)> = world
            .query::<(&GravityBody, &WorldPosition, Option<&Velocity>, Option<&OwnerToken>, Option<&GravityLink>)>()
            .iter()
            .filter(|(_, (.., link))| link.is_none())
            .map(|(entity, (body, position, velocity, owner, _))| {
                (
                    entity,
                    BodyDescriptor::new(body.name.clone(), body.mass, body.radius, position.0),
                    velocity.map_or(DVec3::ZERO, |v| v.linear),
                    owner.cloned().unwrap_or_default(),
                )
            })
            .collect();

        let mut added = 0;
        for (entity, desc, velocity, owner) in pending {
            let name = desc.name.clone();
            match self.registry().register_owned(desc, &owner) {
                Ok(id) => {
                    self.track(id, velocity);
                    if world.insert(entity, (GravityLink(id), owner)).is_ok() {
                        added += 1;
                    }
                }
                Err(e) => log::debug!("Entity {:?} ('{}') not registered: {}", entity, name, e),
            }
        }
        if added > 0 {
            log::info!("Auto-registered {} gravity entities", added);
        }
        added
    }

    /// Copy simulated state back onto linked entities.
    pub fn write_back(&self, world: &mut World) {
        let scales: HashMap<BodyId, f64> = self.registry().get_all().into_iter().map(|b| (b.id, b.scale)).collect();

        for (_, (link, position, velocity, force, scale)) in world.query_mut::<(
            &GravityLink,
            &mut WorldPosition,
            Option<&mut Velocity>,
            Option<&mut AppliedForce>,
            Option<&mut RenderScale>,
        )>() {
            let Some(body) = self.nbody().body(link.0) else {
                continue;
            };
            position.0 = body.position;
            if let Some(velocity) = velocity {
                velocity.linear = body.velocity;
            }
            if let Some(force) = force {
                force.0 = self.nbody().host_force(link.0).unwrap_or_default();
            }
            if let (Some(scale), Some(&s)) = (scale, scales.get(&link.0)) {
                scale.0 = s;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GravityConfig;

    fn spawn(world: &mut World, name: &str, mass: f64, x: f64) -> Entity {
        world.spawn((
            GravityBody::new(name, mass, 10.0),
            WorldPosition::new(x, 0.0, 0.0),
            Velocity::default(),
            AppliedForce::default(),
            RenderScale::default(),
        ))
    }

    #[test]
    fn registers_each_entity_once() {
        let mut sys = UnifiedGravitySystem::new(GravityConfig::default());
        let mut world = World::new();
        let a = spawn(&mut world, "a", 1.0e10, 0.0);
        spawn(&mut world, "b", 1.0e3, 500.0);
        world.spawn((WorldPosition::default(),));

        assert_eq!(sys.auto_register_all(&mut world), 2);
        assert_eq!(sys.auto_register_all(&mut world), 0);
        assert_eq!(sys.registry().len(), 2);
        let link = *world.get::<&GravityLink>(a).unwrap();
        assert_eq!(sys.registry().get(link.0).unwrap().name, "a");
    }

    #[test]
    fn duplicate_names_are_skipped() {
        let mut sys = UnifiedGravitySystem::new(GravityConfig::default());
        let mut world = World::new();
        spawn(&mut world, "twin", 1.0, 0.0);
        spawn(&mut world, "twin", 1.0, 10.0);
        assert_eq!(sys.auto_register_all(&mut world), 1);
        assert_eq!(sys.registry().len(), 1);
        assert_eq!(world.query::<&GravityLink>().iter().count(), 1);
    }

    #[test]
    fn write_back_moves_entities() {
        let mut sys = UnifiedGravitySystem::new(GravityConfig::default());
        let mut world = World::new();
        spawn(&mut world, "heavy", 1.0e12, 0.0);
        let light = spawn(&mut world, "light", 1.0e3, 1000.0);
        sys.auto_register_all(&mut world);
        sys.update(1.0);
        sys.write_back(&mut world);

        let position = world.get::<&WorldPosition>(light).unwrap().0;
        assert!(position.x < 1000.0);
        let velocity = world.get::<&Velocity>(light).unwrap().linear;
        assert!(velocity.x < 0.0);
        let force = world.get::<&AppliedForce>(light).unwrap().0;
        assert!(force.x < 0.0);
    }

    #[test]
    fn despawned_entity_is_pruned() {
        let mut sys = UnifiedGravitySystem::new(GravityConfig::default());
        let mut world = World::new();
        let a = spawn(&mut world, "a", 1.0, 0.0);
        spawn(&mut world, "b", 1.0, 100.0);
        sys.auto_register_all(&mut world);
        world.despawn(a).unwrap();
        sys.update(0.1);
        assert_eq!(sys.registry().len(), 1);
        assert_eq!(sys.nbody().len(), 1);
        assert!(sys.registry().find_by_name("a").is_none());
    }
}
