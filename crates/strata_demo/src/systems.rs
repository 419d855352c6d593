//! Ship and bullet components and the systems driving them

use strata_ecs::prelude::*;

/// Bullets closer than this to a ship hit it
const HIT_RADIUS: f32 = 2.0;
/// Passes between shots
const FIRE_INTERVAL: u32 = 20;
const BULLET_SPEED: f32 = 1.5;
const BULLET_TTL: u32 = 90;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ship {
    pub hull: i32,
    pub cooldown: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bullet {
    pub ttl: u32,
    pub owner: Entity,
}

/// Integrates velocity into position
pub struct Movement;

impl<'a> System<'a> for Movement {
    type Params = (&'a mut Position, &'a Velocity);

    fn run(&mut self, _commands: &mut Commands<'_>, (pos, vel): Self::Params) {
        pos.x += vel.x;
        pos.y += vel.y;
    }
}

/// Ships fire toward the origin whenever their cooldown runs out
pub struct Guns;

impl<'a> System<'a> for Guns {
    type Params = (Entity, &'a Position, &'a mut Ship);

    fn run(&mut self, commands: &mut Commands<'_>, (entity, pos, ship): Self::Params) {
        if commands.is_zombie(entity) {
            return;
        }
        if ship.cooldown > 0 {
            ship.cooldown -= 1;
            return;
        }
        ship.cooldown = FIRE_INTERVAL;

        let length = (pos.x * pos.x + pos.y * pos.y).sqrt().max(f32::EPSILON);
        let velocity = Velocity {
            x: -pos.x / length * BULLET_SPEED,
            y: -pos.y / length * BULLET_SPEED,
        };
        commands.spawn((
            Bullet { ttl: BULLET_TTL, owner: entity },
            Position { x: pos.x, y: pos.y },
            velocity,
        ));
    }
}

/// Removes bullets once their time to live runs out
pub struct Expiry;

impl<'a> System<'a> for Expiry {
    type Params = (Entity, &'a mut Bullet);

    fn run(&mut self, commands: &mut Commands<'_>, (entity, bullet): Self::Params) {
        bullet.ttl = bullet.ttl.saturating_sub(1);
        if bullet.ttl == 0 {
            if let Err(e) = commands.delete(entity) {
                log::warn!("Failed to expire bullet {}: {}", entity, e);
            }
        }
    }
}

/// Pairwise bullet/ship checks across every archetype holding either
#[derive(Default)]
pub struct Collision {
    pub hits: usize,
    pub kills: usize,
}

impl Collision {
    fn gather(world: &mut World, query: QueryDescriptor) -> Result<Vec<(Entity, Position)>> {
        let ids: Vec<_> = world.search(&query).collect();
        let mut found = Vec::new();

        for id in ids {
            let Some(archetype) = world.archetype(id) else {
                continue;
            };
            for &entity in archetype.entities() {
                if world.is_zombie(entity) {
                    continue;
                }
                found.push((entity, *world.get_component::<Position>(entity)?));
            }
        }
        Ok(found)
    }
}

impl CustomSystem for Collision {
    fn execute(&mut self, world: &mut World) -> Result<()> {
        let bullet_query = world.query().must::<Bullet>().must::<Position>().build()?;
        let ship_query = world
            .query()
            .must::<Ship>()
            .must::<Position>()
            .none_of::<Bullet>()
            .build()?;

        let bullets = Self::gather(world, bullet_query)?;
        let ships = Self::gather(world, ship_query)?;
        let hits_before = self.hits;

        for (bullet, bullet_pos) in bullets {
            let owner = world.get_component::<Bullet>(bullet)?.owner;
            let hit = ships.iter().find(|(ship, ship_pos)| {
                let dx = ship_pos.x - bullet_pos.x;
                let dy = ship_pos.y - bullet_pos.y;
                *ship != owner && world.is_alive(*ship) && dx * dx + dy * dy < HIT_RADIUS * HIT_RADIUS
            });
            let Some(&(ship, _)) = hit else {
                continue;
            };

            world.delete_entity(bullet)?;
            self.hits += 1;

            let hull = {
                let target = world.get_component_mut::<Ship>(ship)?;
                target.hull -= 1;
                target.hull
            };
            if hull <= 0 {
                world.delete_entity(ship)?;
                self.kills += 1;
                log::info!("Ship {} destroyed", ship);
            }
        }

        if self.hits != hits_before {
            log::debug!("{} hits so far, {} ships destroyed", self.hits, self.kills);
        }
        Ok(())
    }
}
