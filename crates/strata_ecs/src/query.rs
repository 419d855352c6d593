//! Query - Select archetypes by the components they store
//!
//! A query is three bitsets:
//! - `must`: every component must be present
//! - `one_of`: at least one must be present (ignored when empty)
//! - `none_of`: none may be present
//!
//! Queries are built explicitly or derived from a parameter type through
//! [`Fetch`]: `&T` and `&mut T` are required, `Option<&T>` and
//! `Option<&mut T>` join the `one_of` group, [`Without<T>`] excludes.

use crate::archetype::Archetype;
use crate::component::{Component, ComponentId, ComponentRegistry};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use std::marker::PhantomData;
use strata_structures::ComponentBitset;

/// Access mode for a component in a query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Read-only access
    Read,
    /// Read-write access
    Write,
    /// Optional read access
    OptionalRead,
    /// Optional write access
    OptionalWrite,
    /// Component must not be present
    Without,
}

impl Access {
    /// True for the mutable variants
    #[inline]
    pub fn is_write(&self) -> bool {
        matches!(self, Access::Write | Access::OptionalWrite)
    }
}

/// Component requirement for a query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentAccess {
    /// Component ID
    pub id: ComponentId,
    /// Access mode
    pub access: Access,
}

/// Describes a query's requirements
#[derive(Clone, Debug, Default)]
pub struct QueryDescriptor {
    must: ComponentBitset,
    one_of: ComponentBitset,
    none_of: ComponentBitset,
    /// Accesses recorded by typed parameters
    accesses: Vec<ComponentAccess>,
}

impl QueryDescriptor {
    /// Create a query matching every archetype
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a query from a parameter type
    pub fn from_fetch<'a, F: Fetch<'a>>(registry: &mut ComponentRegistry) -> Result<Self> {
        let mut query = Self::new();
        F::describe(registry, &mut query)?;
        Ok(query)
    }

    /// Require a component
    pub fn must(mut self, id: ComponentId) -> Self {
        self.add_must(id);
        self
    }

    /// Add a component to the one-of group
    pub fn one_of(mut self, id: ComponentId) -> Self {
        self.add_one_of(id);
        self
    }

    /// Exclude a component
    pub fn none_of(mut self, id: ComponentId) -> Self {
        self.add_none_of(id);
        self
    }

    /// Require a component
    #[inline]
    pub fn add_must(&mut self, id: ComponentId) {
        self.must.set(id.index());
    }

    /// Add a component to the one-of group
    #[inline]
    pub fn add_one_of(&mut self, id: ComponentId) {
        self.one_of.set(id.index());
    }

    /// Exclude a component
    #[inline]
    pub fn add_none_of(&mut self, id: ComponentId) {
        self.none_of.set(id.index());
    }

    /// Record an access and set the matching bit
    pub fn add_access(&mut self, id: ComponentId, access: Access) {
        match access {
            Access::Read | Access::Write => self.add_must(id),
            Access::OptionalRead | Access::OptionalWrite => self.add_one_of(id),
            Access::Without => self.add_none_of(id),
        }
        self.accesses.push(ComponentAccess { id, access });
    }

    /// Check an archetype's component mask.
    ///
    /// `none_of` vetoes first, then `must`, then `one_of`.
    pub fn matches(&self, mask: &ComponentBitset) -> bool {
        if mask.intersects(&self.none_of) {
            return false;
        }
        if !mask.contains_all(&self.must) {
            return false;
        }
        self.one_of.is_empty() || mask.intersects(&self.one_of)
    }

    /// Check if an archetype matches this query
    #[inline]
    pub fn matches_archetype(&self, archetype: &Archetype) -> bool {
        self.matches(archetype.mask())
    }

    /// Reject a component requested twice with a write among the requests
    pub fn check_conflicts(&self, registry: &ComponentRegistry, system: &str) -> Result<()> {
        for (i, a) in self.accesses.iter().enumerate() {
            for b in &self.accesses[i + 1..] {
                if a.id == b.id && (a.access.is_write() || b.access.is_write()) {
                    return Err(EcsError::ConflictingAccess {
                        system: system.to_string(),
                        component: registry.name(a.id),
                    });
                }
            }
        }
        Ok(())
    }

    /// Required components
    #[inline]
    pub fn must_mask(&self) -> &ComponentBitset {
        &self.must
    }

    /// One-of group
    #[inline]
    pub fn one_of_mask(&self) -> &ComponentBitset {
        &self.one_of
    }

    /// Excluded components
    #[inline]
    pub fn none_of_mask(&self) -> &ComponentBitset {
        &self.none_of
    }

    /// Get component accesses
    pub fn accesses(&self) -> &[ComponentAccess] {
        &self.accesses
    }
}

/// Typed query construction, registering components as needed
pub struct QueryBuilder<'r> {
    registry: &'r mut ComponentRegistry,
    descriptor: QueryDescriptor,
    error: Option<EcsError>,
}

impl<'r> QueryBuilder<'r> {
    /// Start an empty query
    pub fn new(registry: &'r mut ComponentRegistry) -> Self {
        Self {
            registry,
            descriptor: QueryDescriptor::new(),
            error: None,
        }
    }

    fn with<T: Component>(mut self, add: fn(&mut QueryDescriptor, ComponentId)) -> Self {
        match self.registry.register::<T>() {
            Ok(id) => add(&mut self.descriptor, id),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Require `T`
    pub fn must<T: Component>(self) -> Self {
        self.with::<T>(QueryDescriptor::add_must)
    }

    /// Add `T` to the one-of group
    pub fn one_of<T: Component>(self) -> Self {
        self.with::<T>(QueryDescriptor::add_one_of)
    }

    /// Exclude `T`
    pub fn none_of<T: Component>(self) -> Self {
        self.with::<T>(QueryDescriptor::add_none_of)
    }

    /// Finish, reporting the first registration failure
    pub fn build(self) -> Result<QueryDescriptor> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.descriptor),
        }
    }
}

/// Base pointer and stride of one column, captured once per archetype
#[derive(Clone, Copy, Debug)]
pub struct ColumnPtr {
    base: *mut u8,
    stride: usize,
}

impl ColumnPtr {
    fn of(archetype: &Archetype, id: ComponentId) -> Option<Self> {
        archetype.column(id).map(|column| Self {
            base: column.ptr_at(0),
            stride: column.stride(),
        })
    }

    #[inline]
    unsafe fn at(&self, slot: usize) -> *mut u8 {
        self.base.add(slot * self.stride)
    }
}

fn column_ptr<T: Component>(registry: &ComponentRegistry, archetype: &Archetype) -> Option<ColumnPtr> {
    let id = registry.get_id::<T>()?;
    ColumnPtr::of(archetype, id)
}

fn required_column<T: Component>(registry: &ComponentRegistry, archetype: &Archetype) -> ColumnPtr {
    match column_ptr::<T>(registry, archetype) {
        Some(column) => column,
        None => panic!(
            "archetype {:?} lacks required component '{}'",
            archetype.id(),
            std::any::type_name::<T>()
        ),
    }
}

fn register_writable<T: Component>(registry: &mut ComponentRegistry) -> Result<ComponentId> {
    let id = registry.register::<T>()?;
    if id == ComponentId::ENTITY {
        return Err(EcsError::ReadOnlyComponent(std::any::type_name::<T>()));
    }
    Ok(id)
}

/// A value resolved from an archetype's columns once per slot.
///
/// `describe` adds the type's requirements to a query; `prepare` captures
/// column pointers for one archetype; `fetch` builds the value for a slot.
pub trait Fetch<'a>: Sized {
    /// Per-archetype column pointers
    type State;

    /// Add this parameter's requirements to `query`
    fn describe(registry: &mut ComponentRegistry, query: &mut QueryDescriptor) -> Result<()>;

    /// Capture column pointers. The archetype must match the described query.
    fn prepare(registry: &ComponentRegistry, archetype: &Archetype) -> Self::State;

    /// Resolve the value for one slot
    ///
    /// # Safety
    /// `slot` must be live in the prepared archetype, the archetype must not
    /// be structurally modified for `'a`, and no other live reference may
    /// alias a mutably fetched component.
    unsafe fn fetch(state: &Self::State, slot: usize) -> Self;
}

impl<'a, T: Component> Fetch<'a> for &'a T {
    type State = ColumnPtr;

    fn describe(registry: &mut ComponentRegistry, query: &mut QueryDescriptor) -> Result<()> {
        let id = registry.register::<T>()?;
        query.add_access(id, Access::Read);
        Ok(())
    }

    fn prepare(registry: &ComponentRegistry, archetype: &Archetype) -> ColumnPtr {
        required_column::<T>(registry, archetype)
    }

    #[inline]
    unsafe fn fetch(state: &ColumnPtr, slot: usize) -> Self {
        &*(state.at(slot) as *const T)
    }
}

impl<'a, T: Component> Fetch<'a> for &'a mut T {
    type State = ColumnPtr;

    fn describe(registry: &mut ComponentRegistry, query: &mut QueryDescriptor) -> Result<()> {
        let id = register_writable::<T>(registry)?;
        query.add_access(id, Access::Write);
        Ok(())
    }

    fn prepare(registry: &ComponentRegistry, archetype: &Archetype) -> ColumnPtr {
        required_column::<T>(registry, archetype)
    }

    #[inline]
    unsafe fn fetch(state: &ColumnPtr, slot: usize) -> Self {
        &mut *(state.at(slot) as *mut T)
    }
}

impl<'a, T: Component> Fetch<'a> for Option<&'a T> {
    type State = Option<ColumnPtr>;

    fn describe(registry: &mut ComponentRegistry, query: &mut QueryDescriptor) -> Result<()> {
        let id = registry.register::<T>()?;
        query.add_access(id, Access::OptionalRead);
        Ok(())
    }

    fn prepare(registry: &ComponentRegistry, archetype: &Archetype) -> Option<ColumnPtr> {
        column_ptr::<T>(registry, archetype)
    }

    #[inline]
    unsafe fn fetch(state: &Option<ColumnPtr>, slot: usize) -> Self {
        state.as_ref().map(|column| &*(column.at(slot) as *const T))
    }
}

impl<'a, T: Component> Fetch<'a> for Option<&'a mut T> {
    type State = Option<ColumnPtr>;

    fn describe(registry: &mut ComponentRegistry, query: &mut QueryDescriptor) -> Result<()> {
        let id = register_writable::<T>(registry)?;
        query.add_access(id, Access::OptionalWrite);
        Ok(())
    }

    fn prepare(registry: &ComponentRegistry, archetype: &Archetype) -> Option<ColumnPtr> {
        column_ptr::<T>(registry, archetype)
    }

    #[inline]
    unsafe fn fetch(state: &Option<ColumnPtr>, slot: usize) -> Self {
        state.as_ref().map(|column| &mut *(column.at(slot) as *mut T))
    }
}

impl<'a> Fetch<'a> for Entity {
    type State = ColumnPtr;

    fn describe(_registry: &mut ComponentRegistry, query: &mut QueryDescriptor) -> Result<()> {
        query.add_access(ComponentId::ENTITY, Access::Read);
        Ok(())
    }

    fn prepare(_registry: &ComponentRegistry, archetype: &Archetype) -> ColumnPtr {
        match ColumnPtr::of(archetype, ComponentId::ENTITY) {
            Some(column) => column,
            None => panic!("archetype {:?} has no entity column", archetype.id()),
        }
    }

    #[inline]
    unsafe fn fetch(state: &ColumnPtr, slot: usize) -> Self {
        *(state.at(slot) as *const Entity)
    }
}

/// Parameter that excludes archetypes storing `T`
pub struct Without<T>(PhantomData<fn() -> T>);

impl<T> Default for Without<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<'a, T: Component> Fetch<'a> for Without<T> {
    type State = ();

    fn describe(registry: &mut ComponentRegistry, query: &mut QueryDescriptor) -> Result<()> {
        let id = registry.register::<T>()?;
        query.add_access(id, Access::Without);
        Ok(())
    }

    fn prepare(_registry: &ComponentRegistry, _archetype: &Archetype) {}

    #[inline]
    unsafe fn fetch(_state: &(), _slot: usize) -> Self {
        Self::default()
    }
}

macro_rules! impl_fetch_tuple {
    ($($F:ident),*) => {
        impl<'a, $($F: Fetch<'a>),*> Fetch<'a> for ($($F,)*) {
            type State = ($($F::State,)*);

            fn describe(registry: &mut ComponentRegistry, query: &mut QueryDescriptor) -> Result<()> {
                $($F::describe(registry, query)?;)*
                Ok(())
            }

            fn prepare(registry: &ComponentRegistry, archetype: &Archetype) -> Self::State {
                ($($F::prepare(registry, archetype),)*)
            }

            #[allow(non_snake_case)]
            #[inline]
            unsafe fn fetch(state: &Self::State, slot: usize) -> Self {
                let ($($F,)*) = state;
                ($($F::fetch($F, slot),)*)
            }
        }
    };
}

impl_fetch_tuple!(A);
impl_fetch_tuple!(A, B);
impl_fetch_tuple!(A, B, C);
impl_fetch_tuple!(A, B, C, D);
impl_fetch_tuple!(A, B, C, D, E);
impl_fetch_tuple!(A, B, C, D, E, F);
impl_fetch_tuple!(A, B, C, D, E, F, G);
impl_fetch_tuple!(A, B, C, D, E, F, G, H);
