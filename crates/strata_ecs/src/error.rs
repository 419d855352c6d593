//! ECS error types

use crate::entity::Entity;
use strata_memory::MemoryError;
use thiserror::Error;

/// Result type for ECS operations
pub type Result<T> = std::result::Result<T, EcsError>;

/// Errors visible to code embedding the ECS
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcsError {
    /// The handle's generation no longer matches its directory slot
    #[error("Stale entity handle {0}")]
    StaleHandle(Entity),

    /// The handle's index was never allocated
    #[error("Invalid entity handle {0}")]
    InvalidHandle(Entity),

    /// The entity's archetype does not store the component
    #[error("Entity {entity} has no component '{component}'")]
    MissingComponent { entity: Entity, component: &'static str },

    /// Column memory could not be reserved or committed
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] MemoryError),

    /// More distinct component types than a bitset can hold
    #[error("Cannot register '{name}': component limit of {max} reached")]
    ComponentLimit { name: &'static str, max: usize },

    /// The same component type appears twice in one entity's component set
    #[error("Component '{0}' appears more than once")]
    DuplicateComponent(&'static str),

    /// A system requests the same component twice with a write among them
    #[error("System '{system}' has conflicting access to '{component}'")]
    ConflictingAccess { system: String, component: &'static str },

    /// The component can be read but never written, added or removed
    #[error("Component '{0}' is read-only")]
    ReadOnlyComponent(&'static str),

    /// The entity is pending deletion
    #[error("Entity {0} is pending deletion")]
    ZombieEntity(Entity),

    /// Configuration could not be parsed or is out of range
    #[error("Invalid configuration: {0}")]
    Config(String),
}
