// What the bot sees of the game.
//
// The decision loop never touches game entities directly. Each tick the host
// hands it a `BotState` for the thinking bot and a `BotWorld` that answers
// collision queries (via `NavWorld`), lists entity snapshots, describes the
// item table and applies the game's pickup rules.
//
// Snapshots are plain copies. Entity references held across ticks (goal
// targets) are `EntityId`s plus, for items, the spawn id, so a respawned
// item or a recycled entity slot is recognized as a different thing.
//
// `SimWorld` is a self-contained implementation over a `BoxWorld` used by
// tests and headless tools.

use quetoo_nav::{BoxWorld, Bounds, Contents, EntityId, NavWorld, TraceResult, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Index into the item table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u16);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Ammo,
    Armor,
    Flag,
    Health,
    Powerup,
    Weapon,
    Tech,
}

/// How a weapon behaves, as far as choosing one is concerned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponTraits {
    pub projectile: bool,
    pub hitscan: bool,
    pub explosive: bool,
    pub short_range: bool,
    pub medium_range: bool,
    pub long_range: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaponInfo {
    pub ammo: Option<ItemId>,
    /// Ammo consumed per shot; a weapon with less in stock is unusable.
    pub ammo_per_shot: u16,
    pub traits: WeaponTraits,
}

/// One entry of the item table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub name: String,
    pub kind: ItemKind,
    /// Base desirability; also a weapon's chase eagerness.
    pub priority: f32,
    pub weapon: Option<WeaponInfo>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EntityKind {
    Player { health: i32, carrying_flag: bool },
    Item { item: ItemId, spawn_id: u32 },
    Other,
}

/// A snapshot of one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityState {
    pub id: EntityId,
    pub origin: Vec3,
    pub velocity: Vec3,
    /// Box relative to `origin`.
    pub bounds: Bounds,
    /// In use, solid and visible to clients.
    pub active: bool,
    pub dead: bool,
    pub kind: EntityKind,
}

impl EntityState {
    pub fn abs_bounds(&self) -> Bounds {
        self.bounds.at(self.origin)
    }

    pub fn health(&self) -> Option<i32> {
        match self.kind {
            EntityKind::Player { health, .. } => Some(health),
            _ => None,
        }
    }

    pub fn item(&self) -> Option<(ItemId, u32)> {
        match self.kind {
            EntityKind::Item { item, spawn_id } => Some((item, spawn_id)),
            _ => None,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player { .. })
    }
}

/// Item counts carried by a player.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inventory {
    counts: FxHashMap<ItemId, i32>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, item: ItemId) -> i32 {
        self.counts.get(&item).copied().unwrap_or(0)
    }

    pub fn set(&mut self, item: ItemId, count: i32) {
        if count == 0 {
            self.counts.remove(&item);
        } else {
            self.counts.insert(item, count);
        }
    }

    pub fn with(mut self, item: ItemId, count: i32) -> Self {
        self.set(item, count);
        self
    }
}

/// The thinking bot's own state for this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct BotState {
    pub entity: EntityId,
    pub origin: Vec3,
    pub velocity: Vec3,
    pub bounds: Bounds,
    /// Eye height above the origin.
    pub view_height: f32,
    /// View angles in degrees.
    pub pitch: f32,
    pub yaw: f32,
    pub ground_entity: Option<EntityId>,
    pub health: i32,
    pub dead: bool,
    pub inventory: Inventory,
    pub weapon: Option<ItemId>,
    /// Frame length in milliseconds.
    pub msec: u32,
}

impl BotState {
    /// A live bot standing on the world at `origin`, facing along +X.
    pub fn standing(entity: EntityId, origin: Vec3) -> Self {
        Self {
            entity,
            origin,
            velocity: Vec3::ZERO,
            bounds: Bounds::new(Vec3::new(-16.0, -16.0, -24.0), Vec3::new(16.0, 16.0, 32.0)),
            view_height: 22.0,
            pitch: 0.0,
            yaw: 0.0,
            ground_entity: Some(EntityId::WORLD),
            health: 100,
            dead: false,
            inventory: Inventory::new(),
            weapon: None,
            msec: 25,
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.origin + Vec3::new(0.0, 0.0, self.view_height)
    }

    pub fn abs_bounds(&self) -> Bounds {
        self.bounds.at(self.origin)
    }

    /// Unit view direction.
    pub fn forward(&self) -> Vec3 {
        let (pitch, yaw) = (self.pitch.to_radians(), self.yaw.to_radians());
        Vec3::new(pitch.cos() * yaw.cos(), pitch.cos() * yaw.sin(), -pitch.sin())
    }

    pub fn on_mover(&self) -> bool {
        self.ground_entity.is_some_and(|e| !e.is_world())
    }
}

/// Game-side queries the decision loop needs beyond collision.
pub trait BotWorld: NavWorld {
    /// Level time in milliseconds.
    fn time(&self) -> u32;

    /// Every entity worth considering, players first, in entity order.
    fn entities(&self) -> &[EntityState];

    fn entity(&self, id: EntityId) -> Option<&EntityState> {
        self.entities().iter().find(|e| e.id == id)
    }

    /// The item table, indexed by `ItemId`.
    fn item_table(&self) -> &[ItemInfo];

    fn item_info(&self, id: ItemId) -> Option<&ItemInfo> {
        self.item_table().get(usize::from(id.0))
    }

    /// Whether `bot` would pick up `item` if it touched it now.
    fn can_pickup(&self, bot: &BotState, item: &EntityState) -> bool;

    fn same_team(&self, _a: EntityId, _b: EntityId) -> bool {
        false
    }
}

/// Could `other` be a target at all: live, active, not us, not a teammate.
pub fn is_targetable(world: &dyn BotWorld, bot: &BotState, other: &EntityState) -> bool {
    other.id != bot.entity
        && other.active
        && !other.dead
        && !(other.is_player() && world.same_team(bot.entity, other.id))
}

/// Roughly in front of the bot and with a clear line from the eye to the
/// entity's box.
pub fn can_see(world: &dyn BotWorld, bot: &BotState, other: &EntityState) -> bool {
    let eye = bot.eye();
    let dir = (other.origin - eye).normalize();
    if bot.forward().dot(dir) < 0.1 {
        return false;
    }
    let tr = world.trace(eye, other.origin, Bounds::POINT, Contents::MASK_VISIBLE);
    other.abs_bounds().contains(tr.end)
}

pub fn can_target(world: &dyn BotWorld, bot: &BotState, other: &EntityState) -> bool {
    is_targetable(world, bot, other) && can_see(world, bot, other)
}

/// An in-memory game for tests and tools.
#[derive(Clone, Debug, Default)]
pub struct SimWorld {
    pub geometry: BoxWorld,
    pub entities: Vec<EntityState>,
    pub items: Vec<ItemInfo>,
    pub time: u32,
    /// Item kinds bots currently refuse (full health, full armor...).
    pub refused: Vec<ItemId>,
    pub teams: FxHashMap<EntityId, u8>,
}

impl SimWorld {
    pub fn new(geometry: BoxWorld) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    pub fn add_item_kind(&mut self, info: ItemInfo) -> ItemId {
        self.items.push(info);
        ItemId((self.items.len() - 1) as u16)
    }

    /// Spawn an item entity and return its entity id.
    pub fn spawn_item(&mut self, item: ItemId, origin: Vec3) -> EntityId {
        let id = self.next_entity_id();
        self.entities.push(EntityState {
            id,
            origin,
            velocity: Vec3::ZERO,
            bounds: Bounds::new(Vec3::new(-16.0, -16.0, -16.0), Vec3::new(16.0, 16.0, 16.0)),
            active: true,
            dead: false,
            kind: EntityKind::Item { item, spawn_id: 1 },
        });
        id
    }

    pub fn spawn_player(&mut self, origin: Vec3, health: i32) -> EntityId {
        let id = self.next_entity_id();
        self.entities.push(EntityState {
            id,
            origin,
            velocity: Vec3::ZERO,
            bounds: Bounds::new(Vec3::new(-16.0, -16.0, -24.0), Vec3::new(16.0, 16.0, 32.0)),
            active: true,
            dead: false,
            kind: EntityKind::Player {
                health,
                carrying_flag: false,
            },
        });
        id
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut EntityState> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    fn next_entity_id(&self) -> EntityId {
        EntityId(self.entities.iter().map(|e| e.id.0).max().unwrap_or(0) + 1)
    }
}

impl NavWorld for SimWorld {
    fn trace(&self, start: Vec3, end: Vec3, bounds: Bounds, mask: Contents) -> TraceResult {
        self.geometry.trace(start, end, bounds, mask)
    }

    fn point_contents(&self, point: Vec3) -> Contents {
        self.geometry.point_contents(point)
    }
}

impl BotWorld for SimWorld {
    fn time(&self) -> u32 {
        self.time
    }

    fn entities(&self) -> &[EntityState] {
        &self.entities
    }

    fn item_table(&self) -> &[ItemInfo] {
        &self.items
    }

    fn can_pickup(&self, _bot: &BotState, item: &EntityState) -> bool {
        item.item().is_some_and(|(id, _)| !self.refused.contains(&id))
    }

    fn same_team(&self, a: EntityId, b: EntityId) -> bool {
        match (self.teams.get(&a), self.teams.get(&b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}
