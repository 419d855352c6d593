//! Component - Data attached to entities
//!
//! Components are plain data with no behavior. Each distinct type gets a
//! small integer ID on first registration, used as its bit position in
//! archetype and query bitsets.

use crate::entity::Entity;
use crate::error::{EcsError, Result};
use std::any::TypeId;
use std::collections::BTreeMap;
use strata_memory::ElementLayout;
use strata_structures::MAX_COMPONENTS;

/// Unique identifier for a component type
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub u32);

impl ComponentId {
    /// Invalid component ID
    pub const INVALID: Self = Self(u32::MAX);

    /// ID of the implicit entity column present in every archetype
    pub const ENTITY: Self = Self(0);

    /// Create a new component ID
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    #[inline]
    pub const fn id(&self) -> u32 {
        self.0
    }

    /// Bit position in a [`ComponentBitset`](strata_structures::ComponentBitset)
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Check if this is a valid ID
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

/// Information about a component type
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    /// Unique ID for this component
    pub id: ComponentId,
    /// Type name for debugging
    pub name: &'static str,
    /// Column element layout
    pub layout: ElementLayout,
    /// TypeId of the Rust type
    pub type_id: TypeId,
}

impl ComponentInfo {
    /// Create info for a Rust type
    pub fn of<T: Component>() -> Self {
        Self {
            id: ComponentId::INVALID, // Will be assigned by registry
            name: std::any::type_name::<T>(),
            layout: ElementLayout::of::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Get the size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size
    }

    /// Get the alignment
    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align
    }
}

/// Trait for component types
pub trait Component: Send + Sync + 'static {}

// Blanket implementation for all suitable types
impl<T: Send + Sync + 'static> Component for T {}

/// Registry for component types
pub struct ComponentRegistry {
    /// Registered components by ID
    components: Vec<ComponentInfo>,
    /// TypeId to ComponentId mapping
    type_map: BTreeMap<TypeId, ComponentId>,
}

impl ComponentRegistry {
    /// Create a registry holding only the entity column
    pub fn new() -> Self {
        let mut info = ComponentInfo::of::<Entity>();
        info.id = ComponentId::ENTITY;

        let mut type_map = BTreeMap::new();
        type_map.insert(info.type_id, ComponentId::ENTITY);

        Self {
            components: vec![info],
            type_map,
        }
    }

    /// Register a component type. Registering the same type again returns
    /// the ID it already has.
    pub fn register<T: Component>(&mut self) -> Result<ComponentId> {
        let type_id = TypeId::of::<T>();

        // Check if already registered
        if let Some(&id) = self.type_map.get(&type_id) {
            return Ok(id);
        }

        if self.components.len() >= MAX_COMPONENTS {
            return Err(EcsError::ComponentLimit {
                name: std::any::type_name::<T>(),
                max: MAX_COMPONENTS,
            });
        }

        let id = ComponentId::new(self.components.len() as u32);
        let mut info = ComponentInfo::of::<T>();
        info.id = id;

        log::debug!("Registered component '{}' as {}", info.name, id.id());

        self.type_map.insert(type_id, id);
        self.components.push(info);

        Ok(id)
    }

    /// Get component ID by type
    pub fn get_id<T: Component>(&self) -> Option<ComponentId> {
        self.type_map.get(&TypeId::of::<T>()).copied()
    }

    /// Get component info by ID
    pub fn get_info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.components.get(id.index())
    }

    /// Name of a component, or `"<unregistered>"`
    pub fn name(&self, id: ComponentId) -> &'static str {
        self.get_info(id).map_or("<unregistered>", |info| info.name)
    }

    /// Get all registered components
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.components.iter()
    }

    /// Get number of registered components, the entity column included
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Always false: the entity column is registered on creation
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
