// Item scoring and reachability.
//
// Short-range seeking looks only at items the bot can see. Each one is
// weighted `(max_item_distance - distance) * priority`, so a nearby
// low-value item can beat a distant valuable one. An item must also be
// reachable on foot in a straight line:
//
// - within `max_item_distance`,
// - no more than one step height above the bot's origin,
// - no chasm on the way: the floor is probed every `chasm_probe_step` units
//   along the line, and a probe that finds nothing within a step height
//   below the line (plus the player's standing height) means a gap the bot
//   would fall into.
//
// Long-range goals ignore visibility and distance. Their weights are the
// item priority scaled by a random factor, so bots on the same map spread
// out instead of all running for the same armor.

use crate::config::BotConfig;
use crate::env::{BotState, BotWorld, EntityState, can_target};
use crate::rng::BotRng;
use quetoo_nav::{Bounds, Contents, EntityId, NavConfig, NavWorld, Vec3};
use std::cmp::Ordering;

/// A weighted candidate item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ItemPick {
    pub entity: EntityId,
    pub spawn_id: u32,
    pub origin: Vec3,
    pub weight: f32,
}

/// Straight-line walking distance from `from` to `to`, or `None` when the
/// item cannot be walked to directly.
pub fn item_reachable<W: NavWorld + ?Sized>(
    world: &W,
    from: Vec3,
    to: Vec3,
    player: Bounds,
    nav: &NavConfig,
    config: &BotConfig,
) -> Option<f32> {
    let distance = from.distance(to);
    if distance > config.max_item_distance {
        return None;
    }
    if to.z - from.z > nav.step_height {
        return None;
    }

    let horizontal = from.distance_xy(to);
    if config.chasm_probe_step <= 0.0 || horizontal <= config.chasm_probe_step {
        return Some(distance);
    }

    // Interior samples only; the endpoints are where the bot and the item
    // already are.
    let samples = (horizontal / config.chasm_probe_step).floor() as u32;
    let depth = -player.mins.z + nav.step_height;
    for i in 1..=samples {
        let t = (i as f32 * config.chasm_probe_step) / horizontal;
        if t >= 1.0 {
            break;
        }
        let point = from + (to - from).scale(t);
        let below = point - Vec3::new(0.0, 0.0, depth);
        let tr = world.trace(point, below, Bounds::POINT, Contents::MASK_SOLID);
        if !tr.hit_something() {
            return None;
        }
    }

    Some(distance)
}

fn sort_by_weight(picks: &mut [ItemPick]) {
    picks.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));
}

/// Visible, pickable, reachable items, best first. `skip` excludes the item
/// the bot is already pathing to.
pub fn visible_items(
    world: &dyn BotWorld,
    bot: &BotState,
    nav: &NavConfig,
    config: &BotConfig,
    skip: Option<(EntityId, u32)>,
) -> Vec<ItemPick> {
    let mut picks: Vec<ItemPick> = world
        .entities()
        .iter()
        .filter_map(|entity| {
            let (item, spawn_id) = entity.item()?;
            if skip == Some((entity.id, spawn_id)) {
                return None;
            }
            if !can_target(world, bot, entity) || !world.can_pickup(bot, entity) {
                return None;
            }
            let distance =
                item_reachable(world, bot.origin, entity.origin, bot.bounds, nav, config)?;
            let priority = world.item_info(item)?.priority;
            Some(ItemPick {
                entity: entity.id,
                spawn_id,
                origin: entity.origin,
                weight: (config.max_item_distance - distance) * priority,
            })
        })
        .collect();

    sort_by_weight(&mut picks);
    picks
}

/// Every pickable item anywhere on the map with a randomized weight, best
/// first. Items with zero priority are never goals.
pub fn long_range_items(world: &dyn BotWorld, bot: &BotState, rng: &mut BotRng) -> Vec<ItemPick> {
    let mut picks: Vec<ItemPick> = world
        .entities()
        .iter()
        .filter(|e| e.active && !e.dead)
        .filter_map(|entity: &EntityState| {
            let (item, spawn_id) = entity.item()?;
            if !world.can_pickup(bot, entity) {
                return None;
            }
            let priority = world.item_info(item)?.priority;
            if priority == 0.0 {
                return None;
            }
            Some(ItemPick {
                entity: entity.id,
                spawn_id,
                origin: entity.origin,
                weight: rng.next_f32() * priority,
            })
        })
        .collect();

    sort_by_weight(&mut picks);
    picks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{ItemInfo, ItemKind, SimWorld};
    use quetoo_nav::BoxWorld;

    fn player() -> Bounds {
        NavConfig::default().player_bounds
    }

    /// Floor on both sides of a gap from x=100 to x=200.
    fn chasm_world() -> BoxWorld {
        let mut world = BoxWorld::new();
        world.add_solid(Vec3::new(-512.0, -512.0, -16.0), Vec3::new(100.0, 512.0, 0.0));
        world.add_solid(Vec3::new(200.0, -512.0, -16.0), Vec3::new(512.0, 512.0, 0.0));
        world
    }

    #[test]
    fn flat_floor_is_reachable() {
        let mut world = BoxWorld::new();
        world.add_solid(Vec3::new(-512.0, -512.0, -16.0), Vec3::new(512.0, 512.0, 0.0));
        let nav = NavConfig::default();
        let config = BotConfig::default();
        let from = Vec3::new(0.0, 0.0, 24.0);
        let to = Vec3::new(300.0, 0.0, 24.0);
        let d = item_reachable(&world, from, to, player(), &nav, &config);
        assert_eq!(d, Some(300.0));
    }

    #[test]
    fn chasm_blocks_direct_walk() {
        let world = chasm_world();
        let nav = NavConfig::default();
        let config = BotConfig::default();
        let from = Vec3::new(0.0, 0.0, 24.0);
        let reach = |to: Vec3| item_reachable(&world, from, to, player(), &nav, &config);
        assert_eq!(reach(Vec3::new(300.0, 0.0, 24.0)), None);
        // Short of the gap is fine.
        assert!(reach(Vec3::new(90.0, 0.0, 24.0)).is_some());
    }

    #[test]
    fn distance_and_climb_limits() {
        let mut world = BoxWorld::new();
        world.add_solid(Vec3::new(-2048.0, -512.0, -16.0), Vec3::new(2048.0, 512.0, 0.0));
        let nav = NavConfig::default();
        let config = BotConfig::default();
        let from = Vec3::new(0.0, 0.0, 24.0);
        let reach = |to: Vec3| item_reachable(&world, from, to, player(), &nav, &config);
        assert_eq!(reach(Vec3::new(600.0, 0.0, 24.0)), None);
        assert_eq!(reach(Vec3::new(50.0, 0.0, 64.0)), None);
        // Items below are fine as long as the floor is continuous.
        assert!(reach(Vec3::new(50.0, 0.0, 10.0)).is_some());
    }

    fn item_world() -> SimWorld {
        let mut geometry = BoxWorld::new();
        geometry.add_solid(Vec3::new(-1024.0, -1024.0, -16.0), Vec3::new(1024.0, 1024.0, 0.0));
        SimWorld::new(geometry)
    }

    fn kind(world: &mut SimWorld, name: &str, priority: f32) -> crate::env::ItemId {
        world.add_item_kind(ItemInfo {
            name: name.into(),
            kind: ItemKind::Health,
            priority,
            weapon: None,
        })
    }

    #[test]
    fn closer_item_outweighs_same_priority() {
        let mut world = item_world();
        let health = kind(&mut world, "health", 1.0);
        let far = world.spawn_item(health, Vec3::new(400.0, 0.0, 24.0));
        let near = world.spawn_item(health, Vec3::new(100.0, 0.0, 24.0));
        let bot = BotState::standing(EntityId(100), Vec3::new(0.0, 0.0, 24.0));

        let picks = visible_items(&world, &bot, &NavConfig::default(), &BotConfig::default(), None);
        let order: Vec<_> = picks.iter().map(|p| p.entity).collect();
        assert_eq!(order, vec![near, far]);
        assert!((picks[0].weight - 412.0).abs() < 1e-3);
    }

    #[test]
    fn refused_and_skipped_items_are_excluded() {
        let mut world = item_world();
        let health = kind(&mut world, "health", 1.0);
        let armor = kind(&mut world, "armor", 2.0);
        let h = world.spawn_item(health, Vec3::new(100.0, 0.0, 24.0));
        let a = world.spawn_item(armor, Vec3::new(200.0, 0.0, 24.0));
        world.refused.push(health);
        let bot = BotState::standing(EntityId(100), Vec3::new(0.0, 0.0, 24.0));

        let picks = visible_items(&world, &bot, &NavConfig::default(), &BotConfig::default(), None);
        assert_eq!(picks.iter().map(|p| p.entity).collect::<Vec<_>>(), vec![a]);

        let skip = Some((a, 1));
        let picks = visible_items(&world, &bot, &NavConfig::default(), &BotConfig::default(), skip);
        assert!(picks.is_empty());
        assert_ne!(h, a);
    }

    #[test]
    fn long_range_ignores_sight_and_zero_priority() {
        let mut world = item_world();
        let junk = kind(&mut world, "junk", 0.0);
        let mega = kind(&mut world, "mega", 3.0);
        world.spawn_item(junk, Vec3::new(100.0, 0.0, 24.0));
        // Behind the bot, out of view.
        let behind = world.spawn_item(mega, Vec3::new(-900.0, 0.0, 24.0));
        let bot = BotState::standing(EntityId(100), Vec3::new(0.0, 0.0, 24.0));

        let mut rng = BotRng::new(5);
        let picks = long_range_items(&world, &bot, &mut rng);
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].entity, behind);
        assert!(picks[0].weight >= 0.0 && picks[0].weight < 3.0);
    }
}
