//! System - Logic that operates on components
//!
//! Two kinds of systems are supported:
//! - [`System`]: a per-entity callback whose parameter type is turned into a
//!   query at registration and resolved from each matching archetype's columns
//! - [`CustomSystem`]: full control over the [`World`] for logic that spans
//!   archetypes, such as pairwise collision checks
//!
//! Systems run once per pass, in registration order.

use crate::archetype::{Archetype, ArchetypeId};
use crate::component::ComponentRegistry;
use crate::directory::Directory;
use crate::entity::Entity;
use crate::error::Result;
use crate::query::{Fetch, QueryDescriptor};
use crate::world::World;
use crate::Bundle;

/// A per-entity callback.
///
/// ```ignore
/// struct Movement;
///
/// impl<'a> System<'a> for Movement {
///     type Params = (&'a mut Position, &'a Velocity);
///
///     fn run(&mut self, _commands: &mut Commands<'_>, (pos, vel): Self::Params) {
///         pos.x += vel.x;
///     }
/// }
/// ```
pub trait System<'a>: 'static {
    /// Components resolved for each visited entity
    type Params: Fetch<'a>;

    /// Called once per live entity of each matching archetype
    fn run(&mut self, commands: &mut Commands<'_>, params: Self::Params);

    /// Name used in logs and errors
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A system that drives its own iteration
pub trait CustomSystem: 'static {
    /// Run once per pass
    fn execute(&mut self, world: &mut World) -> Result<()>;

    /// Name used in logs and errors
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

type DeferredSpawn = Box<dyn FnOnce(&mut World) -> Result<Entity>>;

/// Structural changes requested from inside a callback system
pub struct Commands<'w> {
    directory: &'w mut Directory,
    spawns: &'w mut Vec<DeferredSpawn>,
}

impl<'w> Commands<'w> {
    fn new(directory: &'w mut Directory, spawns: &'w mut Vec<DeferredSpawn>) -> Self {
        Self { directory, spawns }
    }

    /// Soft-delete an entity. It keeps its storage, and stays visible to
    /// queries, until the deletion flush at the end of the pass.
    ///
    /// Returns `Ok(false)` if the entity is already marked, and
    /// `StaleHandle` / `InvalidHandle` for handles that do not resolve.
    pub fn delete(&mut self, entity: Entity) -> Result<bool> {
        self.directory.mark_for_deletion(entity)
    }

    /// True if the entity is pending deletion
    #[inline]
    pub fn is_zombie(&self, entity: Entity) -> bool {
        self.directory.is_zombie(entity)
    }

    /// True if the entity resolves and is not pending deletion
    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.directory.is_alive(entity)
    }

    /// Create an entity once the current system has visited every archetype
    pub fn spawn<B: Bundle>(&mut self, bundle: B) {
        self.spawns
            .push(Box::new(move |world: &mut World| world.create_entity(bundle)));
    }

    /// Spawns queued so far by the current system
    #[inline]
    pub fn pending_spawns(&self) -> usize {
        self.spawns.len()
    }
}

/// Uniform runnable unit stored by the scheduler
pub(crate) trait SystemRunner {
    fn name(&self) -> &'static str;

    fn run(&mut self, world: &mut World) -> Result<()>;
}

/// Derive the query of a callback system
pub(crate) fn describe<'a, S: System<'a>>(registry: &mut ComponentRegistry) -> Result<QueryDescriptor> {
    QueryDescriptor::from_fetch::<S::Params>(registry)
}

/// Callback system bound to its compiled query
pub(crate) struct CallbackRunner<S> {
    system: S,
    query: QueryDescriptor,
}

impl<S> CallbackRunner<S>
where
    S: for<'a> System<'a>,
{
    /// Bind a system to its query, rejecting parameter sets that alias
    pub(crate) fn new(system: S, query: QueryDescriptor, registry: &ComponentRegistry) -> Result<Self> {
        query.check_conflicts(registry, system.name())?;
        Ok(Self { system, query })
    }
}

fn run_archetype<'a, S: System<'a>>(
    system: &mut S,
    registry: &ComponentRegistry,
    archetype: &'a mut Archetype,
    commands: &mut Commands<'_>,
) {
    // SAFETY: the archetype matched the system's query, and CallbackRunner::new
    // rejected queries with conflicting accesses
    unsafe {
        archetype.for_each::<S::Params, _>(registry, |params| system.run(commands, params));
    }
}

impl<S> SystemRunner for CallbackRunner<S>
where
    S: for<'a> System<'a>,
{
    fn name(&self) -> &'static str {
        self.system.name()
    }

    fn run(&mut self, world: &mut World) -> Result<()> {
        let mut spawns = Vec::new();
        {
            let (registry, archetypes, directory) = world.dispatch_parts();
            let matched: Vec<ArchetypeId> = archetypes.matching(&self.query).collect();
            let mut commands = Commands::new(directory, &mut spawns);

            for id in matched {
                let Some(archetype) = archetypes.get_mut(id) else {
                    continue;
                };
                if archetype.is_empty() {
                    continue;
                }
                run_archetype(&mut self.system, registry, archetype, &mut commands);
            }
        }

        if !spawns.is_empty() {
            log::trace!("{} spawned {} entities", self.name(), spawns.len());
        }
        for spawn in spawns {
            spawn(world)?;
        }
        Ok(())
    }
}

/// Custom system wrapper
pub(crate) struct CustomRunner<S> {
    system: S,
}

impl<S> CustomRunner<S> {
    pub(crate) fn new(system: S) -> Self {
        Self { system }
    }
}

impl<S: CustomSystem> SystemRunner for CustomRunner<S> {
    fn name(&self) -> &'static str {
        self.system.name()
    }

    fn run(&mut self, world: &mut World) -> Result<()> {
        self.system.execute(world)
    }
}

/// Registered systems in registration order
#[derive(Default)]
pub struct SystemScheduler {
    systems: Vec<Box<dyn SystemRunner>>,
}

impl SystemScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, runner: Box<dyn SystemRunner>) {
        log::debug!("Registered system '{}'", runner.name());
        self.systems.push(runner);
    }

    /// Number of registered systems
    #[inline]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// System names in run order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.systems.iter().map(|system| system.name())
    }

    /// Run every system once, stopping at the first error
    pub(crate) fn run(&mut self, world: &mut World) -> Result<()> {
        for system in &mut self.systems {
            if let Err(e) = system.run(world) {
                log::error!("System '{}' failed: {}", system.name(), e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Move systems registered elsewhere to the end of this one
    pub(crate) fn append(&mut self, other: &mut SystemScheduler) {
        self.systems.append(&mut other.systems);
    }
}
