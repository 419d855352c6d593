//! Entity directory - index -> (archetype, slot, handle)
//!
//! Each directory entry is in one of three states:
//! - free: `archetype` is invalid and the handle's index field links to the
//!   next free entry
//! - live: the handle's generation matches outstanding handles, zombie clear
//! - zombie: as live with the zombie flag set, pending removal at the next flush
//!
//! Deletion is two-phase so a pass over an archetype sees a stable entity
//! count: [`Directory::mark_for_deletion`] only flags the entry, and
//! [`Directory::flush_deletions`] compacts the archetypes afterwards.

use crate::archetype::{ArchetypeId, Archetypes};
use crate::entity::Entity;
use crate::error::{EcsError, Result};

/// Location of an entity in archetype storage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    /// Archetype containing the entity
    pub archetype_id: ArchetypeId,
    /// Slot within the archetype's columns
    pub slot: usize,
}

impl EntityLocation {
    /// Create a new entity location
    pub const fn new(archetype_id: ArchetypeId, slot: usize) -> Self {
        Self { archetype_id, slot }
    }

    /// Invalid location
    pub const fn invalid() -> Self {
        Self {
            archetype_id: ArchetypeId::INVALID,
            slot: usize::MAX,
        }
    }

    /// Check if valid
    pub const fn is_valid(&self) -> bool {
        self.archetype_id.is_valid()
    }
}

#[derive(Clone, Copy, Debug)]
struct DirectoryEntry {
    location: EntityLocation,
    /// Canonical handle, or the free-list link while free
    handle: Entity,
}

/// Maps entity indices to storage and recycles freed indices
pub struct Directory {
    entries: Vec<DirectoryEntry>,
    /// First free index, `Entity::NULL_INDEX` when the list is empty
    head_of_free: u32,
    /// Handles marked for deletion since the last flush
    pending: Vec<Entity>,
    /// Allocated entries, zombies included
    alive: usize,
}

impl Directory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            head_of_free: Entity::NULL_INDEX,
            pending: Vec::new(),
            alive: 0,
        }
    }

    /// Allocate a handle, reusing a freed index when one is available.
    ///
    /// The entry stays unbound until [`bind`](Self::bind) is called.
    pub fn allocate(&mut self) -> Entity {
        self.alive += 1;

        if self.head_of_free != Entity::NULL_INDEX {
            let index = self.head_of_free;
            let entry = &mut self.entries[index as usize];
            self.head_of_free = entry.handle.index();

            let handle = Entity::new(index, Entity::next_generation(entry.handle.generation()));
            entry.handle = handle;
            return handle;
        }

        let index = self.entries.len();
        assert!(index < Entity::NULL_INDEX as usize, "entity index space exhausted");

        let handle = Entity::new(index as u32, 1);
        self.entries.push(DirectoryEntry {
            location: EntityLocation::invalid(),
            handle,
        });
        handle
    }

    /// Record where an allocated entity is stored
    pub fn bind(&mut self, entity: Entity, location: EntityLocation) {
        let entry = &mut self.entries[entity.index() as usize];
        debug_assert_eq!(entry.handle.generation(), entity.generation());
        entry.location = location;
    }

    /// Update the slot of an entity moved by a swap-remove
    pub fn set_slot(&mut self, entity: Entity, slot: usize) {
        self.entries[entity.index() as usize].location.slot = slot;
    }

    /// Return an allocated but never bound handle to the free list
    pub fn release_unbound(&mut self, entity: Entity) {
        debug_assert!(!self.entries[entity.index() as usize].location.is_valid());
        self.free(entity.index());
    }

    /// Resolve a handle, rejecting stale and unknown ones.
    ///
    /// Zombies resolve: they keep their storage until the next flush.
    pub fn lookup(&self, entity: Entity) -> Result<EntityLocation> {
        let entry = self
            .entries
            .get(entity.index() as usize)
            .ok_or(EcsError::InvalidHandle(entity))?;

        if !entry.location.is_valid() || entry.handle.generation() != entity.generation() {
            log::warn!("Rejected stale handle {}", entity);
            return Err(EcsError::StaleHandle(entity));
        }

        Ok(entry.location)
    }

    /// Canonical handle stored for an index, zombie flag included
    pub fn handle(&self, index: u32) -> Option<Entity> {
        self.entries
            .get(index as usize)
            .filter(|entry| entry.location.is_valid())
            .map(|entry| entry.handle)
    }

    /// True if `entity` resolves and is pending deletion
    pub fn is_zombie(&self, entity: Entity) -> bool {
        self.entries
            .get(entity.index() as usize)
            .map(|entry| {
                entry.location.is_valid()
                    && entry.handle.generation() == entity.generation()
                    && entry.handle.is_zombie()
            })
            .unwrap_or(false)
    }

    /// True if `entity` resolves and is not pending deletion
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entries
            .get(entity.index() as usize)
            .map(|entry| {
                entry.location.is_valid()
                    && entry.handle.generation() == entity.generation()
                    && !entry.handle.is_zombie()
            })
            .unwrap_or(false)
    }

    /// Soft-delete: set the zombie flag and queue the entity.
    ///
    /// Returns `false` if the entity was already marked.
    pub fn mark_for_deletion(&mut self, entity: Entity) -> Result<bool> {
        self.lookup(entity)?;

        let entry = &mut self.entries[entity.index() as usize];
        if entry.handle.is_zombie() {
            return Ok(false);
        }

        entry.handle = entry.handle.to_zombie();
        self.pending.push(entry.handle.to_live());
        Ok(true)
    }

    /// Number of entities waiting for the next flush
    #[inline]
    pub fn pending_deletions(&self) -> usize {
        self.pending.len()
    }

    /// Physically remove every pending entity and recycle its index.
    ///
    /// Removals run in descending slot order within each archetype, so a
    /// swap-remove only ever moves an entity that is not pending. Returns
    /// the number of entities removed.
    pub fn flush_deletions(&mut self, archetypes: &mut Archetypes) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let mut batch: Vec<(EntityLocation, u32)> = self
            .pending
            .drain(..)
            .map(|entity| {
                let entry = &self.entries[entity.index() as usize];
                (entry.location, entity.index())
            })
            .collect();

        batch.sort_unstable_by(|(a, _), (b, _)| {
            a.archetype_id
                .cmp(&b.archetype_id)
                .then(b.slot.cmp(&a.slot))
        });

        for &(location, index) in &batch {
            let archetype = &mut archetypes[location.archetype_id];
            let last = archetype.delete_entity(location.slot);
            if last != location.slot {
                let moved = archetype.entity_at(location.slot);
                self.set_slot(moved, location.slot);
            }

            self.free(index);
        }

        log::trace!("Flushed {} deletions", batch.len());
        batch.len()
    }

    /// Number of allocated entries, zombies included
    #[inline]
    pub fn alive_count(&self) -> usize {
        self.alive
    }

    /// Total entries ever allocated
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn free(&mut self, index: u32) {
        let entry = &mut self.entries[index as usize];
        entry.location = EntityLocation::invalid();
        entry.handle = Entity::new(self.head_of_free, entry.handle.generation());
        self.head_of_free = index;
        self.alive -= 1;
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(directory: &mut Directory, slot: usize) -> Entity {
        let entity = directory.allocate();
        directory.bind(entity, EntityLocation::new(ArchetypeId::new(0), slot));
        entity
    }

    #[test]
    fn test_allocate_fresh_indices() {
        let mut directory = Directory::new();
        let e0 = bound(&mut directory, 0);
        let e1 = bound(&mut directory, 1);

        assert_eq!(e0.index(), 0);
        assert_eq!(e1.index(), 1);
        assert_eq!(e0.generation(), 1);
        assert_eq!(directory.alive_count(), 2);
        assert_eq!(directory.lookup(e1).unwrap().slot, 1);
    }

    #[test]
    fn test_free_list_reuses_with_new_generation() {
        let mut directory = Directory::new();
        let e0 = bound(&mut directory, 0);
        let _e1 = bound(&mut directory, 1);

        directory.free(e0.index());
        assert_eq!(directory.lookup(e0), Err(EcsError::StaleHandle(e0)));

        let reused = directory.allocate();
        assert_eq!(reused.index(), e0.index());
        assert!(reused.generation() > e0.generation());

        // Free list is empty again, next allocation is fresh
        assert_eq!(directory.allocate().index(), 2);
    }

    #[test]
    fn test_free_list_is_lifo() {
        let mut directory = Directory::new();
        let handles: Vec<_> = (0..4).map(|slot| bound(&mut directory, slot)).collect();

        directory.free(handles[1].index());
        directory.free(handles[3].index());

        assert_eq!(directory.allocate().index(), 3);
        assert_eq!(directory.allocate().index(), 1);
        assert_eq!(directory.allocate().index(), 4);
    }

    #[test]
    fn test_lookup_rejects_unknown_index() {
        let directory = Directory::new();
        let bogus = Entity::new(10, 1);
        assert_eq!(directory.lookup(bogus), Err(EcsError::InvalidHandle(bogus)));
        assert_eq!(directory.lookup(Entity::null()), Err(EcsError::InvalidHandle(Entity::null())));
    }

    #[test]
    fn test_mark_for_deletion() {
        let mut directory = Directory::new();
        let e = bound(&mut directory, 0);

        assert!(directory.mark_for_deletion(e).unwrap());
        assert!(directory.is_zombie(e));
        assert!(!directory.is_alive(e));
        assert!(directory.handle(e.index()).unwrap().is_zombie());

        // Zombies still resolve until flushed
        assert!(directory.lookup(e).is_ok());

        // Marking twice queues once
        assert!(!directory.mark_for_deletion(e).unwrap());
        assert_eq!(directory.pending_deletions(), 1);
    }

    #[test]
    fn test_release_unbound() {
        let mut directory = Directory::new();
        let e = directory.allocate();
        directory.release_unbound(e);

        assert_eq!(directory.alive_count(), 0);
        assert!(directory.lookup(e).is_err());
        assert_eq!(directory.allocate().index(), e.index());
    }
}
