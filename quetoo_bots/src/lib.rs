// quetoo_bots: bot decision loop over the navigation graph.
//
// Each server frame the host builds a `BotState` for every bot, hands it
// to that bot's `BotBrain` together with the map's `NavGraph` and a
// `BotWorld`, and applies the returned `BotCommand` as the bot's input.
// The brain picks enemies, weapons and items, follows graph paths to them
// and gets itself unstuck.
//
// Module overview:
// - `config.rs`:  BotConfig, WeaponRanges. Decision-loop tuning, JSON loadable.
// - `env.rs`:     BotWorld trait, entity and bot snapshots, item table, SimWorld.
// - `rng.rs`:     BotRng, the seedable per-bot random source.
// - `goal.rs`:    Goal / GoalKind / PathGoal, goal distress.
// - `items.rs`:   Short-range item weighting with chasm probing, long-range picks.
// - `weapons.rs`: Range classes and weapon weighting.
// - `brain.rs`:   BotBrain::think, the per-frame task scheduler, steering.
//
// **Critical constraint: deterministic per seed.** Every random choice a
// bot makes comes from its own `BotRng`, so a recorded match replays
// identically given the same world snapshots.

pub mod brain;
pub mod config;
pub mod env;
pub mod goal;
pub mod items;
pub mod rng;
pub mod weapons;

pub use brain::{BotBrain, BotCommand};
pub use config::{BotConfig, WeaponRanges};
pub use env::{
    BotState, BotWorld, EntityKind, EntityState, Inventory, ItemId, ItemInfo, ItemKind, SimWorld,
};
pub use goal::{CombatStyle, Goal, GoalKind, PathGoal};
pub use rng::BotRng;
