//! Archetype - Groups of entities with the same component types
//!
//! Entities with identical component sets are stored together, one
//! [`Chunk`] per component type. Slot `i` of every column belongs to the
//! same entity; column 0 always holds the [`Entity`] handles themselves.

use crate::component::{ComponentId, ComponentInfo, ComponentRegistry};
use crate::entity::Entity;
use crate::error::Result;
use crate::query::{Fetch, QueryDescriptor};
use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_memory::{Chunk, PageArena};
use strata_structures::ComponentBitset;

/// Unique identifier for an archetype
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchetypeId(pub u32);

impl ArchetypeId {
    /// Invalid archetype ID
    pub const INVALID: Self = Self(u32::MAX);

    /// Create a new archetype ID
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID
    #[inline]
    pub const fn id(&self) -> u32 {
        self.0
    }

    /// Position in creation order
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Check if valid
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

/// Column sizing shared by every archetype of a world
#[derive(Clone)]
pub struct ColumnConfig {
    /// Page arena backing the columns
    pub arena: Arc<dyn PageArena>,
    /// Maximum entities per archetype
    pub capacity: usize,
    /// Commit granularity in bytes
    pub commit_increment: usize,
}

/// An archetype stores entities with the same component set
pub struct Archetype {
    /// Unique identifier
    id: ArchetypeId,
    /// Component mask for fast matching
    mask: ComponentBitset,
    /// Component IDs in this archetype (ascending, entity column first)
    components: Vec<ComponentId>,
    /// Rust type of each column
    type_ids: Vec<TypeId>,
    /// One column per component, same order as `components`
    columns: Vec<Chunk>,
    /// ComponentId -> column index mapping
    column_indices: BTreeMap<ComponentId, usize>,
    /// Live slots, equal to every column's length
    entity_count: usize,
}

impl Archetype {
    /// Create an archetype with one column per component.
    ///
    /// The entity column is added when missing.
    pub fn new(
        id: ArchetypeId,
        mut component_infos: Vec<ComponentInfo>,
        columns: &ColumnConfig,
    ) -> Result<Self> {
        if !component_infos.iter().any(|c| c.id == ComponentId::ENTITY) {
            let mut info = ComponentInfo::of::<Entity>();
            info.id = ComponentId::ENTITY;
            component_infos.push(info);
        }
        component_infos.sort_by_key(|c| c.id);

        let mut mask = ComponentBitset::new();
        let mut components = Vec::with_capacity(component_infos.len());
        let mut type_ids = Vec::with_capacity(component_infos.len());
        let mut chunks = Vec::with_capacity(component_infos.len());
        let mut column_indices = BTreeMap::new();

        for (idx, info) in component_infos.into_iter().enumerate() {
            mask.set(info.id.index());
            components.push(info.id);
            type_ids.push(info.type_id);
            column_indices.insert(info.id, idx);
            chunks.push(Chunk::new(
                info.layout,
                columns.capacity,
                columns.arena.clone(),
                columns.commit_increment,
            )?);
        }

        Ok(Self {
            id,
            mask,
            components,
            type_ids,
            columns: chunks,
            column_indices,
            entity_count: 0,
        })
    }

    /// Get archetype ID
    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Get component IDs
    #[inline]
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Get component mask
    #[inline]
    pub fn mask(&self) -> &ComponentBitset {
        &self.mask
    }

    /// Check if archetype has a component
    #[inline]
    pub fn has_component(&self, component_id: ComponentId) -> bool {
        self.column_indices.contains_key(&component_id)
    }

    /// Get number of entities
    #[inline]
    pub fn len(&self) -> usize {
        self.entity_count
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entity_count == 0
    }

    /// Get the column for a component
    pub fn column(&self, component_id: ComponentId) -> Option<&Chunk> {
        self.column_indices
            .get(&component_id)
            .map(|&idx| &self.columns[idx])
    }

    /// Get all columns
    #[inline]
    pub fn columns(&self) -> &[Chunk] {
        &self.columns
    }

    /// Bytes committed by all columns
    pub fn committed_bytes(&self) -> usize {
        self.columns.iter().map(Chunk::committed_bytes).sum()
    }

    /// Entity occupying a slot
    #[inline]
    pub fn entity_at(&self, slot: usize) -> Entity {
        assert!(slot < self.entity_count, "slot {} out of bounds", slot);
        // SAFETY: column 0 stores Entity and slot is in bounds
        unsafe { *self.columns[0].get::<Entity>(slot) }
    }

    /// Entities in slot order
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        // SAFETY: column 0 stores Entity
        unsafe { self.columns[0].as_slice::<Entity>() }
    }

    /// Make sure every column can take one more slot.
    ///
    /// Commits memory where needed but changes no column length, so a
    /// failure leaves the archetype untouched.
    pub fn prepare_append(&mut self) -> Result<()> {
        for column in &mut self.columns {
            column.prepare_append()?;
        }
        Ok(())
    }

    /// Append one slot to every column and store `entity` in the entity column.
    ///
    /// # Safety
    /// Every other column is left uninitialized at the returned slot; the
    /// caller must write each of them before the slot is read or removed.
    pub unsafe fn create_entity(&mut self, entity: Entity) -> Result<usize> {
        self.prepare_append()?;

        let slot = self.entity_count;
        for column in &mut self.columns {
            let column_slot = column.append_slot();
            assert_eq!(
                column_slot, slot,
                "archetype {:?}: column slot disagrees with entity count",
                self.id
            );
        }
        self.columns[0].write(slot, entity);
        self.entity_count += 1;

        Ok(slot)
    }

    /// Swap-remove the entity at `slot` from every column, dropping its
    /// components.
    ///
    /// Returns the slot the last entity occupied before removal. When it
    /// differs from `slot`, that entity now lives at `slot` and the caller
    /// must update its directory entry.
    pub(crate) fn delete_entity(&mut self, slot: usize) -> usize {
        assert!(slot < self.entity_count, "slot {} out of bounds", slot);

        let last = self.entity_count - 1;
        for column in &mut self.columns {
            column.remove_slot(slot);
        }
        self.entity_count -= 1;

        last
    }

    /// Move the entity at `slot` into `target`.
    ///
    /// Components shared by both archetypes are moved. Components the target
    /// lacks are dropped when `drop_removed` is set, forgotten otherwise.
    /// Columns only the target has are left uninitialized at the new slot.
    ///
    /// Returns `(target_slot, last)` where `last` has the meaning of
    /// [`delete_entity`](Self::delete_entity)'s result.
    ///
    /// # Safety
    /// `target.prepare_append()` must have succeeded, and the caller must
    /// write every target-only column at `target_slot`.
    pub unsafe fn migrate(
        &mut self,
        slot: usize,
        target: &mut Archetype,
        drop_removed: bool,
    ) -> (usize, usize) {
        assert!(slot < self.entity_count, "slot {} out of bounds", slot);

        let target_slot = target.entity_count;
        for (id, column) in target.components.iter().zip(target.columns.iter_mut()) {
            let column_slot = match self.column_indices.get(id) {
                Some(&idx) => self.columns[idx].move_slot_into(slot, column),
                None => column.append_slot(),
            };
            assert_eq!(
                column_slot, target_slot,
                "archetype {:?}: column slot disagrees with entity count",
                target.id
            );
        }

        for (id, column) in self.components.iter().zip(self.columns.iter_mut()) {
            if target.column_indices.contains_key(id) {
                continue;
            }
            if drop_removed {
                column.remove_slot(slot);
            } else {
                column.forget_slot(slot);
            }
        }

        let last = self.entity_count - 1;
        self.entity_count -= 1;
        target.entity_count += 1;

        (target_slot, last)
    }

    /// Write a component value into a freshly appended slot
    ///
    /// # Safety
    /// The slot must be uninitialized (or its previous value already moved
    /// out) and `T` must be the column's type.
    pub unsafe fn write_component<T: 'static>(
        &mut self,
        component_id: ComponentId,
        slot: usize,
        value: T,
    ) {
        let idx = self.column_index::<T>(component_id);
        self.columns[idx].write(slot, value);
    }

    /// Get a component value. The archetype must store the component.
    pub fn get_component<T: 'static>(&self, component_id: ComponentId, slot: usize) -> &T {
        match self.try_get_component(component_id, slot) {
            Some(value) => value,
            None => panic!(
                "archetype {:?} has no component {:?} at slot {}",
                self.id, component_id, slot
            ),
        }
    }

    /// Get a component value, or `None` if this archetype lacks it or its
    /// column does not store `T`
    pub fn try_get_component<T: 'static>(&self, component_id: ComponentId, slot: usize) -> Option<&T> {
        let idx = self.typed_column_index::<T>(component_id)?;
        let ptr = self.columns[idx].get_raw(slot)?;
        // SAFETY: the column stores T and the slot is in bounds
        Some(unsafe { &*(ptr.as_ptr() as *const T) })
    }

    /// Get a mutable component value. The archetype must store the component.
    pub fn get_component_mut<T: 'static>(&mut self, component_id: ComponentId, slot: usize) -> &mut T {
        let id = self.id;
        match self.try_get_component_mut(component_id, slot) {
            Some(value) => value,
            None => panic!(
                "archetype {:?} has no component {:?} at slot {}",
                id, component_id, slot
            ),
        }
    }

    /// Get a mutable component value, or `None` if this archetype lacks it or
    /// its column does not store `T`
    pub fn try_get_component_mut<T: 'static>(
        &mut self,
        component_id: ComponentId,
        slot: usize,
    ) -> Option<&mut T> {
        let idx = self.typed_column_index::<T>(component_id)?;
        let ptr = self.columns[idx].get_raw(slot)?;
        // SAFETY: the column stores T, the slot is in bounds and self is borrowed mutably
        Some(unsafe { &mut *(ptr.as_ptr() as *mut T) })
    }

    /// All values of one component in slot order, or `None` if the column is
    /// missing or does not store `T`
    pub fn component_slice<T: 'static>(&self, component_id: ComponentId) -> Option<&[T]> {
        let idx = self.typed_column_index::<T>(component_id)?;
        // SAFETY: the column stores T
        Some(unsafe { self.columns[idx].as_slice::<T>() })
    }

    /// Invoke `f` once per live slot, in ascending order, with arguments
    /// resolved from this archetype's columns.
    ///
    /// The entity count is captured before the first call.
    ///
    /// # Safety
    /// `F` must only request components a matching query guarantees are
    /// present, and its accesses must pass
    /// [`QueryDescriptor::check_conflicts`]: no component may be borrowed
    /// mutably twice, or mutably and shared at once.
    pub(crate) unsafe fn for_each<'a, F, C>(&'a mut self, registry: &ComponentRegistry, mut f: C)
    where
        F: Fetch<'a>,
        C: FnMut(F),
    {
        let count = self.entity_count;
        let state = F::prepare(registry, self);
        for slot in 0..count {
            // SAFETY: slot < count, columns stay in place while self is borrowed
            let item = unsafe { F::fetch(&state, slot) };
            f(item);
        }
    }

    fn column_index<T: 'static>(&self, component_id: ComponentId) -> usize {
        let idx = match self.column_indices.get(&component_id) {
            Some(&idx) => idx,
            None => panic!("archetype {:?} has no component {:?}", self.id, component_id),
        };
        assert_eq!(
            self.type_ids[idx],
            TypeId::of::<T>(),
            "archetype {:?}: component {:?} does not store {}",
            self.id,
            component_id,
            std::any::type_name::<T>()
        );
        idx
    }

    fn typed_column_index<T: 'static>(&self, component_id: ComponentId) -> Option<usize> {
        let &idx = self.column_indices.get(&component_id)?;
        (self.type_ids[idx] == TypeId::of::<T>()).then_some(idx)
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("mask", &self.mask)
            .field("entity_count", &self.entity_count)
            .finish()
    }
}

/// Archetype storage and management
pub struct Archetypes {
    /// All archetypes, in creation order
    archetypes: Vec<Archetype>,
    /// Component mask -> archetype ID mapping
    signature_map: BTreeMap<ComponentBitset, ArchetypeId>,
    /// Column sizing for new archetypes
    columns: ColumnConfig,
}

impl Archetypes {
    /// Create an empty archetype storage
    pub fn new(columns: ColumnConfig) -> Self {
        Self {
            archetypes: Vec::new(),
            signature_map: BTreeMap::new(),
            columns,
        }
    }

    /// Get an archetype by ID
    #[inline]
    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    /// Get an archetype mutably by ID
    #[inline]
    pub fn get_mut(&mut self, id: ArchetypeId) -> Option<&mut Archetype> {
        self.archetypes.get_mut(id.index())
    }

    /// Get two archetypes mutably
    pub fn get_mut2(
        &mut self,
        id1: ArchetypeId,
        id2: ArchetypeId,
    ) -> Option<(&mut Archetype, &mut Archetype)> {
        if id1 == id2 || id1.index() >= self.len() || id2.index() >= self.len() {
            return None;
        }

        let (a, b) = if id1.0 < id2.0 {
            let (left, right) = self.archetypes.split_at_mut(id2.index());
            (&mut left[id1.index()], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(id1.index());
            (&mut right[0], &mut left[id2.index()])
        };

        Some((a, b))
    }

    /// Get or create the archetype storing exactly the components in `mask`
    /// (plus the entity column)
    pub fn get_or_create(
        &mut self,
        mask: ComponentBitset,
        registry: &ComponentRegistry,
    ) -> Result<ArchetypeId> {
        let mask = mask.with(ComponentId::ENTITY.index());

        if let Some(&id) = self.signature_map.get(&mask) {
            return Ok(id);
        }

        let component_infos: Vec<ComponentInfo> = mask
            .iter_ones()
            .map(|bit| match registry.get_info(ComponentId::new(bit as u32)) {
                Some(info) => info.clone(),
                None => panic!("component {} is not registered", bit),
            })
            .collect();

        let id = ArchetypeId::new(self.archetypes.len() as u32);
        let archetype = Archetype::new(id, component_infos, &self.columns)?;

        log::debug!(
            "Created archetype {} with components {:?}",
            id.id(),
            archetype
                .components()
                .iter()
                .map(|&c| registry.name(c))
                .collect::<Vec<_>>()
        );

        self.signature_map.insert(mask, id);
        self.archetypes.push(archetype);

        Ok(id)
    }

    /// Get archetype ID for a component mask
    pub fn find(&self, mask: &ComponentBitset) -> Option<ArchetypeId> {
        self.signature_map
            .get(&mask.with(ComponentId::ENTITY.index()))
            .copied()
    }

    /// Archetypes matching a query, in creation order
    pub fn matching<'q>(
        &'q self,
        query: &'q QueryDescriptor,
    ) -> impl Iterator<Item = ArchetypeId> + 'q {
        self.archetypes
            .iter()
            .filter(move |arch| query.matches(arch.mask()))
            .map(Archetype::id)
    }

    /// Get number of archetypes
    #[inline]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Iterate over all archetypes
    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    /// Iterate over all archetypes mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Archetype> {
        self.archetypes.iter_mut()
    }
}

impl std::ops::Index<ArchetypeId> for Archetypes {
    type Output = Archetype;

    fn index(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.index()]
    }
}

impl std::ops::IndexMut<ArchetypeId> for Archetypes {
    fn index_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_memory::HeapPageArena;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }

    fn columns() -> ColumnConfig {
        ColumnConfig {
            arena: Arc::new(HeapPageArena::new()),
            capacity: 1024,
            commit_increment: 4096,
        }
    }

    fn spawn(archetype: &mut Archetype, pos_id: ComponentId, index: u32) -> usize {
        unsafe {
            let slot = archetype.create_entity(Entity::new(index, 1)).unwrap();
            archetype.write_component(pos_id, slot, Position { x: index as f32, y: 0.0 });
            slot
        }
    }

    #[test]
    fn test_archetype_creation() {
        let mut registry = ComponentRegistry::new();
        let pos_id = registry.register::<Position>().unwrap();
        let vel_id = registry.register::<Velocity>().unwrap();

        let pos_info = registry.get_info(pos_id).unwrap().clone();
        let vel_info = registry.get_info(vel_id).unwrap().clone();

        let archetype = Archetype::new(ArchetypeId::new(0), vec![vel_info, pos_info], &columns()).unwrap();

        assert!(archetype.has_component(ComponentId::ENTITY));
        assert!(archetype.has_component(pos_id));
        assert!(archetype.has_component(vel_id));
        assert!(!archetype.has_component(ComponentId::new(99)));
        assert_eq!(archetype.components(), &[ComponentId::ENTITY, pos_id, vel_id]);
        assert_eq!(archetype.mask().count_ones(), 3);
    }

    #[test]
    fn test_create_entity_keeps_columns_aligned() {
        let mut registry = ComponentRegistry::new();
        let pos_id = registry.register::<Position>().unwrap();
        let info = registry.get_info(pos_id).unwrap().clone();
        let mut archetype = Archetype::new(ArchetypeId::new(0), vec![info], &columns()).unwrap();

        for i in 0..10 {
            assert_eq!(spawn(&mut archetype, pos_id, i), i as usize);
        }

        assert_eq!(archetype.len(), 10);
        assert!(archetype.columns().iter().all(|c| c.len() == 10));
        assert_eq!(archetype.entity_at(4), Entity::new(4, 1));
        assert_eq!(archetype.get_component::<Position>(pos_id, 4).x, 4.0);
    }

    #[test]
    fn test_delete_entity_swaps_last_into_hole() {
        let mut registry = ComponentRegistry::new();
        let pos_id = registry.register::<Position>().unwrap();
        let info = registry.get_info(pos_id).unwrap().clone();
        let mut archetype = Archetype::new(ArchetypeId::new(0), vec![info], &columns()).unwrap();

        for i in 0..3 {
            spawn(&mut archetype, pos_id, i);
        }

        let last = archetype.delete_entity(0);
        assert_eq!(last, 2);
        assert_eq!(archetype.len(), 2);
        assert_eq!(archetype.entity_at(0), Entity::new(2, 1));
        assert_eq!(archetype.get_component::<Position>(pos_id, 0).x, 2.0);

        // Deleting the last slot moves nothing
        assert_eq!(archetype.delete_entity(1), 1);
        assert_eq!(archetype.entities(), &[Entity::new(2, 1)]);
    }

    #[test]
    fn test_try_get_missing_component() {
        let mut registry = ComponentRegistry::new();
        let pos_id = registry.register::<Position>().unwrap();
        let vel_id = registry.register::<Velocity>().unwrap();
        let info = registry.get_info(pos_id).unwrap().clone();
        let mut archetype = Archetype::new(ArchetypeId::new(0), vec![info], &columns()).unwrap();
        spawn(&mut archetype, pos_id, 0);

        assert!(archetype.try_get_component::<Velocity>(vel_id, 0).is_none());
        assert!(archetype.try_get_component::<Position>(pos_id, 1).is_none());
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let mut registry = ComponentRegistry::new();
        let pos_id = registry.register::<Position>().unwrap();
        let info = registry.get_info(pos_id).unwrap().clone();
        let mut archetype = Archetype::new(ArchetypeId::new(0), vec![info], &columns()).unwrap();
        spawn(&mut archetype, pos_id, 1);

        assert!(archetype.try_get_component::<u64>(pos_id, 0).is_none());
        assert!(archetype.try_get_component_mut::<String>(pos_id, 0).is_none());
        assert!(archetype.component_slice::<u64>(pos_id).is_none());
        assert!(archetype.component_slice::<Entity>(pos_id).is_none());

        assert_eq!(archetype.try_get_component::<Position>(pos_id, 0).unwrap().x, 1.0);
        assert_eq!(archetype.component_slice::<Entity>(ComponentId::ENTITY).unwrap().len(), 1);
    }

    #[test]
    #[should_panic(expected = "has no component")]
    fn test_get_component_with_wrong_type_panics() {
        let mut registry = ComponentRegistry::new();
        let pos_id = registry.register::<Position>().unwrap();
        let info = registry.get_info(pos_id).unwrap().clone();
        let mut archetype = Archetype::new(ArchetypeId::new(0), vec![info], &columns()).unwrap();
        spawn(&mut archetype, pos_id, 1);

        archetype.get_component::<u64>(pos_id, 0);
    }

    #[test]
    #[should_panic(expected = "does not store")]
    fn test_write_component_with_wrong_type_panics() {
        let mut registry = ComponentRegistry::new();
        let pos_id = registry.register::<Position>().unwrap();
        let info = registry.get_info(pos_id).unwrap().clone();
        let mut archetype = Archetype::new(ArchetypeId::new(0), vec![info], &columns()).unwrap();

        unsafe {
            let slot = archetype.create_entity(Entity::new(0, 1)).unwrap();
            archetype.write_component(pos_id, slot, 7u64);
        }
    }

    #[test]
    fn test_for_each_visits_slots_in_order() {
        let mut registry = ComponentRegistry::new();
        let pos_id = registry.register::<Position>().unwrap();
        let info = registry.get_info(pos_id).unwrap().clone();
        let mut archetype = Archetype::new(ArchetypeId::new(0), vec![info], &columns()).unwrap();
        for i in 0..4 {
            spawn(&mut archetype, pos_id, i);
        }

        let mut seen = Vec::new();
        // SAFETY: one shared and one exclusive borrow of distinct components
        unsafe {
            archetype.for_each::<(Entity, &mut Position), _>(&registry, |(entity, pos)| {
                pos.y = pos.x * 2.0;
                seen.push(entity.index());
            });
        }

        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(archetype.get_component::<Position>(pos_id, 3).y, 6.0);
    }

    #[test]
    fn test_migrate_moves_shared_components() {
        let mut registry = ComponentRegistry::new();
        let pos_id = registry.register::<Position>().unwrap();
        let vel_id = registry.register::<Velocity>().unwrap();

        let mut archetypes = Archetypes::new(columns());
        let from = archetypes
            .get_or_create(ComponentBitset::new().with(pos_id.index()), &registry)
            .unwrap();
        let to = archetypes
            .get_or_create(ComponentBitset::from_indices([pos_id.index(), vel_id.index()]), &registry)
            .unwrap();

        let (src, dst) = archetypes.get_mut2(from, to).unwrap();
        spawn(src, pos_id, 0);
        spawn(src, pos_id, 1);

        dst.prepare_append().unwrap();
        let (slot, last) = unsafe {
            let moved = src.migrate(0, dst, true);
            dst.write_component(vel_id, moved.0, Velocity { x: 1.0, y: 1.0 });
            moved
        };

        assert_eq!(slot, 0);
        assert_eq!(last, 1);
        assert_eq!(src.entities(), &[Entity::new(1, 1)]);
        assert_eq!(dst.entity_at(0), Entity::new(0, 1));
        assert_eq!(dst.get_component::<Position>(pos_id, 0).x, 0.0);
        assert_eq!(dst.get_component::<Velocity>(vel_id, 0).x, 1.0);
    }

    #[test]
    fn test_archetypes_get_or_create() {
        let mut registry = ComponentRegistry::new();
        let pos_id = registry.register::<Position>().unwrap();
        let vel_id = registry.register::<Velocity>().unwrap();

        let mut archetypes = Archetypes::new(columns());

        let arch1 = archetypes
            .get_or_create(ComponentBitset::from_indices([pos_id.index(), vel_id.index()]), &registry)
            .unwrap();

        // Should return the same archetype, entity bit or not
        let mask = ComponentBitset::from_indices([vel_id.index(), pos_id.index(), 0]);
        let arch2 = archetypes.get_or_create(mask, &registry).unwrap();
        assert_eq!(arch1, arch2);
        assert_eq!(archetypes.len(), 1);
        assert_eq!(archetypes.find(&mask), Some(arch1));

        let arch3 = archetypes
            .get_or_create(ComponentBitset::new().with(pos_id.index()), &registry)
            .unwrap();
        assert_ne!(arch1, arch3);
        assert_eq!(arch3, ArchetypeId::new(1));
    }
}
