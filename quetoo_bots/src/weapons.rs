// Weapon choice.
//
// Every carried weapon with enough ammo for a shot gets a weight, starting
// from its item priority:
//
// - range match: x2.5 when the weapon suits the target's range class,
//   /2.5 when it does not (no target: no change; melee counts as short),
// - explosive against a target under 25 health: x1.5,
// - projectile weapons not marked long range: /2,
// - explosive at melee or short range: /2,
// - explosive while the bot itself is under 25 health: /2.
//
// The heaviest weapon wins. With one candidate or none there is nothing to
// choose, and the current weapon is never "switched" to.

use crate::config::WeaponRanges;
use crate::env::{BotState, BotWorld, ItemId, WeaponInfo};
use std::cmp::Ordering;

/// Range class of a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RangeClass {
    /// No target.
    DontCare,
    Melee,
    Short,
    Medium,
    Long,
}

impl RangeClass {
    pub fn of(distance: f32, ranges: &WeaponRanges) -> Self {
        if distance < ranges.melee {
            Self::Melee
        } else if distance < ranges.short {
            Self::Short
        } else if distance < ranges.medium {
            Self::Medium
        } else {
            Self::Long
        }
    }

    fn is_close(self) -> bool {
        matches!(self, Self::Melee | Self::Short)
    }
}

/// What the weapon is being chosen against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeaponContext {
    pub range: RangeClass,
    pub target_health: Option<i32>,
    pub self_health: i32,
}

pub fn weapon_weight(priority: f32, weapon: &WeaponInfo, context: &WeaponContext) -> f32 {
    let traits = weapon.traits;
    let mut weight = priority;

    let suits = match context.range {
        RangeClass::DontCare => None,
        RangeClass::Melee | RangeClass::Short => Some(traits.short_range),
        RangeClass::Medium => Some(traits.medium_range),
        RangeClass::Long => Some(traits.long_range),
    };
    match suits {
        Some(true) => weight *= 2.5,
        Some(false) => weight /= 2.5,
        None => {}
    }

    if traits.explosive && context.target_health.is_some_and(|h| h < 25) {
        weight *= 1.5;
    }
    if traits.projectile && !traits.long_range {
        weight /= 2.0;
    }
    if traits.explosive && context.range.is_close() {
        weight /= 2.0;
    }
    if traits.explosive && context.self_health < 25 {
        weight /= 2.0;
    }

    weight
}

/// Weapons `bot` could fire right now, in item-table order.
pub fn usable_weapons(world: &dyn BotWorld, bot: &BotState) -> Vec<(ItemId, f32, WeaponInfo)> {
    world
        .item_table()
        .iter()
        .enumerate()
        .filter_map(|(i, info)| {
            let weapon = info.weapon.as_ref()?;
            let id = ItemId(i as u16);
            if bot.inventory.count(id) <= 0 {
                return None;
            }
            if let Some(ammo) = weapon.ammo {
                if bot.inventory.count(ammo) < i32::from(weapon.ammo_per_shot) {
                    return None;
                }
            }
            Some((id, info.priority, weapon.clone()))
        })
        .collect()
}

/// The weapon to switch to, if a better one than the current is carried.
pub fn pick_best_weapon(
    world: &dyn BotWorld,
    bot: &BotState,
    context: &WeaponContext,
) -> Option<ItemId> {
    let candidates = usable_weapons(world, bot);
    if candidates.len() <= 1 {
        return None;
    }

    let mut weighted: Vec<(ItemId, f32)> = candidates
        .iter()
        .map(|(id, priority, weapon)| (*id, weapon_weight(*priority, weapon, context)))
        .collect();
    // Stable: equal weights keep table order.
    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let best = weighted.first().map(|(id, _)| *id)?;
    (bot.weapon != Some(best)).then_some(best)
}
