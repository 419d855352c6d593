//! # strata_ecs - Archetype-based Entity Component System
//!
//! Entity storage built on chunked columns:
//! - Archetype storage, one address-stable column per component type
//! - Generational entity handles with deferred, batched deletion
//! - Queries over required, alternative and excluded components
//! - Systems run in registration order, followed by a deletion flush
//!
//! ## Example
//!
//! ```ignore
//! use strata_ecs::prelude::*;
//!
//! struct Position { x: f32, y: f32 }
//! struct Velocity { x: f32, y: f32 }
//!
//! struct Movement;
//!
//! impl<'a> System<'a> for Movement {
//!     type Params = (&'a mut Position, &'a Velocity);
//!
//!     fn run(&mut self, _commands: &mut Commands<'_>, (pos, vel): Self::Params) {
//!         pos.x += vel.x;
//!         pos.y += vel.y;
//!     }
//! }
//!
//! let mut world = World::new();
//! let entity = world.create_entity((
//!     Position { x: 0.0, y: 0.0 },
//!     Velocity { x: 1.0, y: 0.5 },
//! ))?;
//!
//! world.register_system(Movement)?;
//! world.run()?;
//!
//! assert_eq!(world.get_component::<Position>(entity)?.x, 1.0);
//! ```

pub mod archetype;
pub mod component;
pub mod config;
pub mod directory;
pub mod entity;
pub mod error;
pub mod query;
pub mod system;
pub mod world;

pub use archetype::{Archetype, ArchetypeId, Archetypes, ColumnConfig};
pub use component::{Component, ComponentId, ComponentInfo, ComponentRegistry};
pub use config::EcsConfig;
pub use directory::{Directory, EntityLocation};
pub use entity::Entity;
pub use error::{EcsError, Result};
pub use query::{Access, ComponentAccess, Fetch, QueryBuilder, QueryDescriptor, Without};
pub use system::{Commands, CustomSystem, System, SystemScheduler};
pub use world::{MemoryStats, World};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::archetype::{Archetype, ArchetypeId};
    pub use crate::component::{Component, ComponentId};
    pub use crate::config::EcsConfig;
    pub use crate::entity::Entity;
    pub use crate::error::{EcsError, Result};
    pub use crate::query::{QueryDescriptor, Without};
    pub use crate::system::{Commands, CustomSystem, System};
    pub use crate::world::World;
    pub use crate::Bundle;
}

/// Component bundle - the initial components of a new entity
pub trait Bundle: Send + Sync + 'static {
    /// Get component IDs in this bundle, registering unknown types
    fn component_ids(registry: &mut ComponentRegistry) -> Result<Vec<ComponentId>>;

    /// Write every component into a freshly appended slot.
    ///
    /// # Safety
    /// `ids` must come from [`component_ids`](Self::component_ids) and the
    /// archetype must store each of them, uninitialized at `slot`.
    unsafe fn write_components(self, archetype: &mut Archetype, ids: &[ComponentId], slot: usize);
}

/// Implement Bundle for tuples
macro_rules! impl_bundle_tuple {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn component_ids(registry: &mut ComponentRegistry) -> Result<Vec<ComponentId>> {
                Ok(vec![$(registry.register::<$T>()?),*])
            }

            #[allow(non_snake_case, unused_assignments)]
            unsafe fn write_components(self, archetype: &mut Archetype, ids: &[ComponentId], slot: usize) {
                let ($($T,)*) = self;
                let mut column = 0;
                $(
                    archetype.write_component(ids[column], slot, $T);
                    column += 1;
                )*
            }
        }
    };
}

// Single element tuple
impl_bundle_tuple!(A);
// Multi-element tuples
impl_bundle_tuple!(A, B);
impl_bundle_tuple!(A, B, C);
impl_bundle_tuple!(A, B, C, D);
impl_bundle_tuple!(A, B, C, D, E);
impl_bundle_tuple!(A, B, C, D, E, F);
impl_bundle_tuple!(A, B, C, D, E, F, G);
impl_bundle_tuple!(A, B, C, D, E, F, G, H);
