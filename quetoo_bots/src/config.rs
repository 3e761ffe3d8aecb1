// Bot tuning parameters.
//
// Timings are in milliseconds of level time, distances in world units.
// Loaded from JSON the same way as `NavConfig`; every field is required,
// so start from `BotConfig::default().to_json()` for a template.

use quetoo_nav::{NavResult, Vec3};
use serde::{Deserialize, Serialize};

/// Distance thresholds separating the weapon range classes. A target
/// closer than `melee` is in melee range, closer than `short` is short,
/// closer than `medium` is medium, anything else is long.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeaponRanges {
    pub melee: f32,
    pub short: f32,
    pub medium: f32,
    pub long: f32,
}

impl Default for WeaponRanges {
    fn default() -> Self {
        Self {
            melee: 32.0,
            short: 128.0,
            medium: 512.0,
            long: 1024.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotConfig {
    /// Items farther than this (straight line, or along the path) are
    /// ignored by short-range item seeking.
    pub max_item_distance: f32,
    /// Spacing of the floor probes along the line to an item.
    pub chasm_probe_step: f32,
    /// Extra reach added to the bot's box when checking whether it has
    /// touched its current path node.
    pub node_padding: Vec3,
    /// How long item seeking stays off after a goal was abandoned in
    /// distress.
    pub reacquire_delay: u32,
    /// Goal distress at which the goal is abandoned.
    pub distress_limit: f32,
    /// Multiplier on `distress_limit` while waiting for a mover.
    pub distress_extension: f32,
    /// Search radius for path endpoints when chasing an enemy.
    pub chase_node_radius: f32,
    /// Search radius for the start node when returning to a backed-up path
    /// or seeking a nearby item.
    pub item_node_radius: f32,
    /// Search radius for both endpoints of long-range goals.
    pub long_range_node_radius: f32,
    /// Priority of a chase path towards an enemy that went out of sight.
    pub chase_priority: f32,
    /// Priority given to every enemy.
    pub enemy_priority: f32,
    /// How long a lost enemy's last position stays interesting.
    pub ghost_memory: u32,
    /// Maximum view turn per 25 ms frame, in degrees.
    pub turn_speed: f32,
    /// Delay between weapon re-evaluations, and after a switch.
    pub weapon_check_delay: u32,
    pub weapon_switch_delay: u32,
    /// Random delay range before opening fire on a new enemy.
    pub lock_on_min: u32,
    pub lock_on_max: u32,
    /// Assumed projectile speed range for leading moving targets.
    pub projectile_speed_min: f32,
    pub projectile_speed_max: f32,
    pub ranges: WeaponRanges,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            max_item_distance: 512.0,
            chasm_probe_step: 32.0,
            node_padding: Vec3::new(8.0, 8.0, 0.0),
            reacquire_delay: 1000,
            distress_limit: 40.0,
            distress_extension: 15.0,
            chase_node_radius: 128.0,
            item_node_radius: 512.0,
            long_range_node_radius: 256.0,
            chase_priority: 0.7,
            enemy_priority: 10.0,
            ghost_memory: 2000,
            turn_speed: 12.5,
            weapon_check_delay: 250,
            weapon_switch_delay: 300,
            lock_on_min: 250,
            lock_on_max: 1000,
            projectile_speed_min: 900.0,
            projectile_speed_max: 1200.0,
            ranges: WeaponRanges::default(),
        }
    }
}

impl BotConfig {
    pub fn from_json(json: &str) -> NavResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> NavResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
