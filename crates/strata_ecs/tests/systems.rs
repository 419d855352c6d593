//! System dispatch, queries and deferred deletion

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strata_ecs::prelude::*;
use strata_ecs::QueryDescriptor;
use strata_memory::HeapPageArena;

#[derive(Clone, Copy, Debug, PartialEq)]
struct A {
    x: i32,
    y: i32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct B {
    c1: u8,
    c2: u8,
    f: f32,
    w: i32,
}

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

#[derive(Clone, Copy, Debug, PartialEq)]
struct Ship;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Bullet;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Marker(u32);

fn test_world() -> World {
    let config = EcsConfig {
        max_entities_per_archetype: 4096,
        ..EcsConfig::default()
    };
    World::with_arena(config, Arc::new(HeapPageArena::new())).unwrap()
}

struct Sys1;

impl<'a> System<'a> for Sys1 {
    type Params = (&'a mut A, &'a mut B);

    fn run(&mut self, _commands: &mut Commands<'_>, (a, b): Self::Params) {
        a.x += 1;
        b.w += 2;
    }
}

#[test]
fn test_end_to_end_pass() {
    let mut world = test_world();
    world.register_component::<A>().unwrap();
    world.register_component::<B>().unwrap();
    world.register_system(Sys1).unwrap();

    let with_b: Vec<_> = (0..20)
        .map(|i| {
            world
                .create_entity((A { x: i, y: -i }, B { c1: b'a', c2: b'z', f: 0.5, w: i * 10 }))
                .unwrap()
        })
        .collect();
    let without_b = world.create_entity((A { x: 100, y: 0 },)).unwrap();

    world.run().unwrap();

    for (i, &entity) in with_b.iter().enumerate() {
        let i = i as i32;
        assert_eq!(world.get_component::<A>(entity).unwrap(), &A { x: i + 1, y: -i });
        assert_eq!(
            world.get_component::<B>(entity).unwrap(),
            &B { c1: b'a', c2: b'z', f: 0.5, w: i * 10 + 2 }
        );
    }

    // Not visited: lacks B
    assert_eq!(world.get_component::<A>(without_b).unwrap().x, 100);
}

#[test]
fn test_query_must_and_none_of() {
    let mut world = test_world();
    world
        .create_entity((Position { x: 0.0, y: 0.0 }, Ship, Velocity { x: 1.0, y: 0.0 }))
        .unwrap();
    world.create_entity((Position { x: 0.0, y: 0.0 }, Ship, Bullet)).unwrap();
    world.create_entity((Position { x: 0.0, y: 0.0 },)).unwrap();

    let query = world
        .query()
        .must::<Position>()
        .must::<Ship>()
        .none_of::<Bullet>()
        .build()
        .unwrap();

    let matched: Vec<_> = world.search(&query).collect();
    assert_eq!(matched.len(), 1);

    let archetype = world.archetype(matched[0]).unwrap();
    let velocity = world.component_id::<Velocity>().unwrap();
    assert!(archetype.has_component(velocity));
}

#[test]
fn test_query_one_of() {
    let mut world = test_world();
    world.create_entity((Position { x: 0.0, y: 0.0 }, Ship)).unwrap();
    world.create_entity((Position { x: 0.0, y: 0.0 }, Bullet)).unwrap();
    world.create_entity((Position { x: 0.0, y: 0.0 },)).unwrap();

    let query = world
        .query()
        .must::<Position>()
        .one_of::<Ship>()
        .one_of::<Bullet>()
        .build()
        .unwrap();
    assert_eq!(world.search(&query).count(), 2);

    // An empty one-of group places no constraint
    let query = world.query().must::<Position>().build().unwrap();
    assert_eq!(world.search(&query).count(), 3);

    assert_eq!(world.search(&QueryDescriptor::new()).count(), 3);
}

struct DeleteOdd;

impl<'a> System<'a> for DeleteOdd {
    type Params = (Entity, &'a Marker);

    fn run(&mut self, commands: &mut Commands<'_>, (entity, marker): Self::Params) {
        if marker.0 == 1 || marker.0 == 3 {
            assert!(commands.delete(entity).unwrap());
        }
    }
}

/// Counts visits, and visits to entities pending deletion
struct Observer {
    visits: Arc<AtomicUsize>,
    zombies: Arc<AtomicUsize>,
}

impl<'a> System<'a> for Observer {
    type Params = (Entity, &'a Marker);

    fn run(&mut self, commands: &mut Commands<'_>, (entity, _marker): Self::Params) {
        self.visits.fetch_add(1, Ordering::Relaxed);
        if commands.is_zombie(entity) {
            self.zombies.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[test]
fn test_deferred_deletion_ordering() {
    let mut world = test_world();
    let handles: Vec<_> = (0..5)
        .map(|i| world.create_entity((Marker(i),)).unwrap())
        .collect();

    let visits = Arc::new(AtomicUsize::new(0));
    let zombies = Arc::new(AtomicUsize::new(0));
    world.register_system(DeleteOdd).unwrap();
    world
        .register_system(Observer { visits: visits.clone(), zombies: zombies.clone() })
        .unwrap();

    world.run_systems().unwrap();

    // Zombies keep their storage and stay visible until the flush
    assert_eq!(visits.load(Ordering::Relaxed), 5);
    assert_eq!(zombies.load(Ordering::Relaxed), 2);
    assert_eq!(world.pending_deletions(), 2);
    assert!(world.is_zombie(handles[1]));
    assert!(world.is_zombie(handles[3]));

    world.flush_deletions();
    assert_eq!(world.entity_count(), 3);
    assert_eq!(world.pending_deletions(), 0);

    for i in [1, 3] {
        assert_eq!(
            world.get_component::<Marker>(handles[i]),
            Err(EcsError::StaleHandle(handles[i]))
        );
    }

    // Survivors resolve to their own slots
    let archetype_id = world.entity_location(handles[0]).unwrap().archetype_id;
    let archetype = world.archetype(archetype_id).unwrap();
    assert_eq!(archetype.len(), 3);
    for &i in &[0usize, 2, 4] {
        let location = world.entity_location(handles[i]).unwrap();
        assert_eq!(archetype.entity_at(location.slot), handles[i]);
        assert_eq!(world.get_component::<Marker>(handles[i]).unwrap(), &Marker(i as u32));
    }
    assert_eq!(archetype.entities(), &[handles[0], handles[4], handles[2]]);
}

/// Deletes every visited entity twice, then a handle that no longer resolves
struct DeleteReporter {
    stale: Entity,
    outcomes: Arc<Mutex<Vec<Result<bool>>>>,
}

impl<'a> System<'a> for DeleteReporter {
    type Params = (Entity, &'a Marker);

    fn run(&mut self, commands: &mut Commands<'_>, (entity, _marker): Self::Params) {
        let mut outcomes = self.outcomes.lock().unwrap();
        outcomes.push(commands.delete(entity));
        outcomes.push(commands.delete(entity));
        outcomes.push(commands.delete(self.stale));
    }
}

#[test]
fn test_commands_delete_reports_handle_errors() {
    let mut world = test_world();
    let stale = world.create_entity((Marker(0),)).unwrap();
    world.delete_entity(stale).unwrap();
    world.flush_deletions();

    // Reuses the freed index under a newer generation
    let live = world.create_entity((Marker(1),)).unwrap();
    assert_eq!(live.index(), stale.index());

    let outcomes = Arc::new(Mutex::new(Vec::new()));
    world
        .register_system(DeleteReporter { stale, outcomes: outcomes.clone() })
        .unwrap();
    world.run_systems().unwrap();

    assert_eq!(
        *outcomes.lock().unwrap(),
        vec![Ok(true), Ok(false), Err(EcsError::StaleHandle(stale))]
    );
    assert!(world.is_zombie(live));
    assert_eq!(world.pending_deletions(), 1);
}

struct Tally {
    visits: Arc<AtomicUsize>,
}

impl<'a> System<'a> for Tally {
    type Params = &'a Marker;

    fn run(&mut self, _commands: &mut Commands<'_>, _marker: Self::Params) {
        self.visits.fetch_add(1, Ordering::Relaxed);
    }
}

struct Reader;

impl CustomSystem for Reader {
    fn execute(&mut self, world: &mut World) -> strata_ecs::Result<()> {
        let query = world.query().must::<Marker>().build()?;
        let ids: Vec<_> = world.search(&query).collect();

        let mut seen = Vec::new();
        for id in ids {
            if let Some(archetype) = world.archetype(id) {
                for &entity in archetype.entities() {
                    seen.push(world.get_component::<Marker>(entity)?.0);
                }
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
        Ok(())
    }
}

#[test]
fn test_callback_visits_every_entity_once() {
    let mut world = test_world();
    for i in 0..3 {
        world.create_entity((Marker(i),)).unwrap();
    }
    let visits = Arc::new(AtomicUsize::new(0));
    world.register_system(Tally { visits: visits.clone() }).unwrap();
    world.register_custom_system(Reader);

    world.run().unwrap();
    assert_eq!(visits.load(Ordering::Relaxed), 3);
    world.run().unwrap();
    assert_eq!(visits.load(Ordering::Relaxed), 6);
    assert_eq!(world.scheduler().len(), 2);
}

struct Integrate;

impl<'a> System<'a> for Integrate {
    type Params = (&'a mut Position, &'a Velocity, Option<&'a Ship>, Without<Bullet>);

    fn run(&mut self, _commands: &mut Commands<'_>, (pos, vel, _ship, _): Self::Params) {
        pos.x += vel.x;
        pos.y += vel.y;
    }
}

#[test]
fn test_optional_and_excluded_params() {
    let mut world = test_world();
    let ship = world
        .create_entity((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 2.0 }, Ship))
        .unwrap();
    let bullet = world
        .create_entity((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 2.0 }, Ship, Bullet))
        .unwrap();
    let plain = world
        .create_entity((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 2.0 }))
        .unwrap();

    world.register_system(Integrate).unwrap();
    world.run().unwrap();

    assert_eq!(world.get_component::<Position>(ship).unwrap(), &Position { x: 1.0, y: 2.0 });
    // Vetoed by the excluded component
    assert_eq!(world.get_component::<Position>(bullet).unwrap(), &Position { x: 0.0, y: 0.0 });
    // Optional components form a one-of group
    assert_eq!(world.get_component::<Position>(plain).unwrap(), &Position { x: 0.0, y: 0.0 });
}

struct Conflicted;

impl<'a> System<'a> for Conflicted {
    type Params = (&'a mut Position, &'a Position);

    fn run(&mut self, _commands: &mut Commands<'_>, _params: Self::Params) {}
}

struct WritesTwice;

impl<'a> System<'a> for WritesTwice {
    type Params = (&'a mut Position, &'a mut Position);

    fn run(&mut self, _commands: &mut Commands<'_>, _params: Self::Params) {}
}

struct WritesEntity;

impl<'a> System<'a> for WritesEntity {
    type Params = &'a mut Entity;

    fn run(&mut self, _commands: &mut Commands<'_>, _entity: Self::Params) {}
}

#[test]
fn test_registration_rejects_conflicting_access() {
    let mut world = test_world();

    assert!(matches!(
        world.register_system(Conflicted),
        Err(EcsError::ConflictingAccess { .. })
    ));
    assert!(matches!(
        world.register_system(WritesTwice),
        Err(EcsError::ConflictingAccess { .. })
    ));
    assert!(matches!(
        world.register_system(WritesEntity),
        Err(EcsError::ReadOnlyComponent(_))
    ));
    assert!(world.scheduler().is_empty());
}

struct Emitter;

impl<'a> System<'a> for Emitter {
    type Params = (&'a Ship, &'a Position);

    fn run(&mut self, commands: &mut Commands<'_>, (_ship, pos): Self::Params) {
        commands.spawn((Bullet, Position { x: pos.x, y: pos.y }));
    }
}

#[test]
fn test_spawned_entities_are_not_visited_in_same_pass() {
    let mut world = test_world();
    world.create_entity((Ship, Position { x: 3.0, y: 4.0 })).unwrap();
    world.create_entity((Ship, Position { x: 5.0, y: 6.0 })).unwrap();
    world.register_system(Emitter).unwrap();

    world.run().unwrap();
    assert_eq!(world.entity_count(), 4);

    let bullets = world.query().must::<Bullet>().build().unwrap();
    let count: usize = world
        .search(&bullets)
        .filter_map(|id| world.archetype(id))
        .map(|archetype| archetype.len())
        .sum();
    assert_eq!(count, 2);
}

struct Failing;

impl CustomSystem for Failing {
    fn execute(&mut self, world: &mut World) -> strata_ecs::Result<()> {
        world.get_component::<Marker>(Entity::new(999, 1))?;
        Ok(())
    }
}

#[test]
fn test_failed_pass_skips_flush() {
    let mut world = test_world();
    let entity = world.create_entity((Marker(0),)).unwrap();
    world.delete_entity(entity).unwrap();
    world.register_custom_system(Failing);

    assert!(matches!(world.run(), Err(EcsError::InvalidHandle(_))));
    assert_eq!(world.pending_deletions(), 1);
    assert!(world.is_zombie(entity));
}
