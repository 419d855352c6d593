//! World - Container for all ECS data
//!
//! The World owns the component registry, the archetypes, the entity
//! directory and the registered systems. It is an explicit context object:
//! nothing in the crate is global.

use crate::archetype::{Archetype, ArchetypeId, Archetypes, ColumnConfig};
use crate::component::{Component, ComponentId, ComponentInfo, ComponentRegistry};
use crate::config::EcsConfig;
use crate::directory::{Directory, EntityLocation};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::query::{QueryBuilder, QueryDescriptor};
use crate::system::{self, CallbackRunner, CustomRunner, CustomSystem, System, SystemScheduler};
use crate::Bundle;
use std::any::type_name;
use std::sync::Arc;
use strata_memory::{default_arena, PageArena};
use strata_structures::ComponentBitset;

/// Column memory totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Address space reserved by all columns
    pub reserved_bytes: usize,
    /// Memory committed by all columns
    pub committed_bytes: usize,
}

/// The ECS World - container for all entity data
pub struct World {
    /// Sizing in effect
    config: EcsConfig,
    /// Page arena shared by every column
    arena: Arc<dyn PageArena>,
    /// Component registry
    components: ComponentRegistry,
    /// Archetype storage
    archetypes: Archetypes,
    /// Entity directory
    directory: Directory,
    /// Registered systems
    scheduler: SystemScheduler,
}

impl World {
    /// Create a world with the default configuration and platform arena
    pub fn new() -> Self {
        Self::build(EcsConfig::default(), default_arena())
    }

    /// Create a world with a custom configuration
    pub fn with_config(config: EcsConfig) -> Result<Self> {
        Self::with_arena(config, default_arena())
    }

    /// Create a world over a specific page arena
    pub fn with_arena(config: EcsConfig, arena: Arc<dyn PageArena>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, arena))
    }

    fn build(config: EcsConfig, arena: Arc<dyn PageArena>) -> Self {
        let columns = ColumnConfig {
            arena: arena.clone(),
            capacity: config.max_entities_per_archetype,
            commit_increment: config.commit_increment,
        };

        Self {
            directory: Directory::with_capacity(config.initial_directory_capacity),
            archetypes: Archetypes::new(columns),
            components: ComponentRegistry::new(),
            scheduler: SystemScheduler::new(),
            arena,
            config,
        }
    }

    /// Configuration in effect
    #[inline]
    pub fn config(&self) -> &EcsConfig {
        &self.config
    }

    // ========== Component Registration ==========

    /// Register a component type
    pub fn register_component<T: Component>(&mut self) -> Result<ComponentId> {
        self.components.register::<T>()
    }

    /// Get component ID by type
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.components.get_id::<T>()
    }

    /// Get component info
    pub fn component_info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.components.get_info(id)
    }

    /// Get the component registry
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    // ========== Entity Management ==========

    /// Create an entity with the components of `bundle`.
    ///
    /// The entity is placed in the archetype for exactly that component set,
    /// which is created on first use.
    pub fn create_entity<B: Bundle>(&mut self, bundle: B) -> Result<Entity> {
        let ids = B::component_ids(&mut self.components)?;

        let mut mask = ComponentBitset::new().with(ComponentId::ENTITY.index());
        for &id in &ids {
            if mask.get(id.index()) {
                return Err(EcsError::DuplicateComponent(self.components.name(id)));
            }
            mask.set(id.index());
        }

        let archetype_id = self.archetypes.get_or_create(mask, &self.components)?;
        let entity = self.directory.allocate();
        let archetype = &mut self.archetypes[archetype_id];

        // SAFETY: every non-entity column is written by the bundle below
        let slot = match unsafe { archetype.create_entity(entity) } {
            Ok(slot) => slot,
            Err(e) => {
                self.directory.release_unbound(entity);
                log::warn!("Failed to create entity in archetype {}: {}", archetype_id.id(), e);
                return Err(e);
            }
        };
        unsafe { bundle.write_components(archetype, &ids, slot) };

        self.directory
            .bind(entity, EntityLocation::new(archetype_id, slot));
        Ok(entity)
    }

    /// Soft-delete an entity. Storage is reclaimed at the next flush.
    ///
    /// Returns `false` if the entity was already pending deletion.
    pub fn delete_entity(&mut self, entity: Entity) -> Result<bool> {
        self.directory.mark_for_deletion(entity)
    }

    /// True if the entity is pending deletion
    pub fn is_zombie(&self, entity: Entity) -> bool {
        self.directory.is_zombie(entity)
    }

    /// True if the entity resolves and is not pending deletion
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.directory.is_alive(entity)
    }

    /// Get entity location
    pub fn entity_location(&self, entity: Entity) -> Result<EntityLocation> {
        self.directory.lookup(entity)
    }

    /// Remove every pending entity from storage. Returns how many were removed.
    pub fn flush_deletions(&mut self) -> usize {
        self.directory.flush_deletions(&mut self.archetypes)
    }

    // ========== Component Access ==========

    /// Get a component, failing if the entity lacks it
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T> {
        self.try_get_component::<T>(entity)?
            .ok_or(EcsError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Get a mutable component, failing if the entity lacks it
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        self.try_get_component_mut::<T>(entity)?
            .ok_or(EcsError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Get a component, or `None` if the entity's archetype lacks it
    pub fn try_get_component<T: Component>(&self, entity: Entity) -> Result<Option<&T>> {
        let location = self.directory.lookup(entity)?;
        let Some(id) = self.components.get_id::<T>() else {
            return Ok(None);
        };
        Ok(self.archetypes[location.archetype_id].try_get_component::<T>(id, location.slot))
    }

    /// Get a mutable component, or `None` if the entity's archetype lacks it
    pub fn try_get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<Option<&mut T>> {
        let location = self.directory.lookup(entity)?;
        let Some(id) = self.components.get_id::<T>() else {
            return Ok(None);
        };
        Ok(self.archetypes[location.archetype_id].try_get_component_mut::<T>(id, location.slot))
    }

    /// Check if entity has a component
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        matches!(self.try_get_component::<T>(entity), Ok(Some(_)))
    }

    /// Add a component to a live entity, moving it to the archetype for its
    /// new component set. An existing value is overwritten in place.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Result<()> {
        let location = self.migration_source(entity)?;
        let id = self.components.register::<T>()?;
        if id == ComponentId::ENTITY {
            return Err(EcsError::ReadOnlyComponent(type_name::<T>()));
        }

        let source_mask = *self.archetypes[location.archetype_id].mask();
        if source_mask.get(id.index()) {
            *self.archetypes[location.archetype_id].get_component_mut::<T>(id, location.slot) = component;
            return Ok(());
        }

        let target_id = self
            .archetypes
            .get_or_create(source_mask.with(id.index()), &self.components)?;
        let Some((source, target)) = self.archetypes.get_mut2(location.archetype_id, target_id) else {
            panic!("archetype {:?} migrates onto itself", target_id);
        };

        target.prepare_append()?;
        // SAFETY: target prepared; the only target-only column is T, written below
        let (slot, last) = unsafe {
            let (slot, last) = source.migrate(location.slot, target, true);
            target.write_component(id, slot, component);
            (slot, last)
        };

        if last != location.slot {
            let moved = source.entity_at(location.slot);
            self.directory.set_slot(moved, location.slot);
        }
        self.directory
            .bind(entity, EntityLocation::new(target_id, slot));
        Ok(())
    }

    /// Remove a component from a live entity and return it, moving the
    /// entity to the archetype for its remaining components
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<T> {
        let location = self.migration_source(entity)?;
        let missing = EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        };
        let id = self.components.get_id::<T>().ok_or(missing.clone())?;
        if id == ComponentId::ENTITY {
            return Err(EcsError::ReadOnlyComponent(type_name::<T>()));
        }

        let mut target_mask = *self.archetypes[location.archetype_id].mask();
        if !target_mask.get(id.index()) {
            return Err(missing);
        }
        target_mask.clear(id.index());

        let target_id = self.archetypes.get_or_create(target_mask, &self.components)?;
        let Some((source, target)) = self.archetypes.get_mut2(location.archetype_id, target_id) else {
            panic!("archetype {:?} migrates onto itself", target_id);
        };

        target.prepare_append()?;
        // SAFETY: the value is read out before its column slot is forgotten;
        // the target has no column the source lacks
        let (value, slot, last) = unsafe {
            let value = std::ptr::read(source.get_component::<T>(id, location.slot) as *const T);
            let (slot, last) = source.migrate(location.slot, target, false);
            (value, slot, last)
        };

        if last != location.slot {
            let moved = source.entity_at(location.slot);
            self.directory.set_slot(moved, location.slot);
        }
        self.directory
            .bind(entity, EntityLocation::new(target_id, slot));
        Ok(value)
    }

    fn migration_source(&self, entity: Entity) -> Result<EntityLocation> {
        let location = self.directory.lookup(entity)?;
        if self.directory.is_zombie(entity) {
            return Err(EcsError::ZombieEntity(entity));
        }
        Ok(location)
    }

    // ========== Queries ==========

    /// Start a typed query
    pub fn query(&mut self) -> QueryBuilder<'_> {
        QueryBuilder::new(&mut self.components)
    }

    /// Archetypes matching a query, in creation order
    pub fn search<'q>(&'q self, query: &'q QueryDescriptor) -> impl Iterator<Item = ArchetypeId> + 'q {
        self.archetypes.matching(query)
    }

    /// Get an archetype
    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id)
    }

    /// Get an archetype mutably
    pub fn archetype_mut(&mut self, id: ArchetypeId) -> Option<&mut Archetype> {
        self.archetypes.get_mut(id)
    }

    /// Get archetypes
    pub fn archetypes(&self) -> &Archetypes {
        &self.archetypes
    }

    // ========== Systems ==========

    /// Register a callback system. Its query is derived from its parameters.
    pub fn register_system<S>(&mut self, system: S) -> Result<()>
    where
        S: for<'a> System<'a>,
    {
        let query = system::describe::<S>(&mut self.components)?;
        let runner = CallbackRunner::new(system, query, &self.components)?;
        self.scheduler.add(Box::new(runner));
        Ok(())
    }

    /// Register a system that drives its own iteration
    pub fn register_custom_system<S: CustomSystem>(&mut self, system: S) {
        self.scheduler.add(Box::new(CustomRunner::new(system)));
    }

    /// Get the scheduler
    pub fn scheduler(&self) -> &SystemScheduler {
        &self.scheduler
    }

    /// Run every system once in registration order, without flushing
    pub fn run_systems(&mut self) -> Result<()> {
        let mut scheduler = std::mem::take(&mut self.scheduler);
        let result = scheduler.run(self);

        // Systems registered while running go after the existing ones
        scheduler.append(&mut self.scheduler);
        self.scheduler = scheduler;
        result
    }

    /// One pass: every system once, then the deletion flush
    pub fn run(&mut self) -> Result<()> {
        self.run_systems()?;
        let flushed = self.flush_deletions();
        log::trace!("Pass complete, {} entities removed", flushed);
        Ok(())
    }

    pub(crate) fn dispatch_parts(&mut self) -> (&ComponentRegistry, &mut Archetypes, &mut Directory) {
        (&self.components, &mut self.archetypes, &mut self.directory)
    }

    // ========== Statistics ==========

    /// Allocated entities, pending deletions included
    pub fn entity_count(&self) -> usize {
        self.directory.alive_count()
    }

    /// Number of archetypes created so far
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Entities waiting for the next flush
    pub fn pending_deletions(&self) -> usize {
        self.directory.pending_deletions()
    }

    /// Column memory totals from the page arena
    pub fn memory_stats(&self) -> MemoryStats {
        MemoryStats {
            reserved_bytes: self.arena.reserved_bytes(),
            committed_bytes: self.arena.committed_bytes(),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
