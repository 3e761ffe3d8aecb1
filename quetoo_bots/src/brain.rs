// Per-bot decision loop.
//
// `BotBrain::think` runs once per server frame per bot and turns the bot's
// situation into a movement command. It is organized as a set of periodic
// tasks, each of which reports how long until it wants to run again:
//
// - long range:  with no move target, pick a random weighted item anywhere
//                on the map and path to it,
// - hunt:        keep, lose (to a ghost) and acquire enemies, and decide
//                whether to chase one that went out of sight,
// - weaponry:    re-evaluate the weapon and fire once locked on,
// - acrobatics:  random crouching and hopping while fighting,
// - find items:  detour for visible items worth more than the current goal,
//                backing up the main path and returning to it afterwards.
//
// After the tasks, the view turns towards the aim or move target and the
// move target is turned into forward/right/up speeds. Path following
// advances to the next node once the bot's padded box touches the current
// one, waits for movers, walks off short drops, and feeds stuck detection
// into goal distress. A goal abandoned in distress blocks item seeking for
// `reacquire_delay`.
//
// Everything that depends on the host's player physics (movement
// prediction, ladders, trick jumps) stays on the host side.
//
// See also: `goal.rs` for goal state and distress, `items.rs` and
// `weapons.rs` for the scoring rules.

use crate::config::BotConfig;
use crate::env::{BotState, BotWorld, EntityKind, EntityState, ItemId, can_target, is_targetable};
use crate::goal::{CombatStyle, Goal, GoalKind, PathGoal};
use crate::items::{ItemPick, long_range_items, visible_items};
use crate::rng::BotRng;
use crate::weapons::{RangeClass, WeaponContext, pick_best_weapon};
use quetoo_nav::pathfinding::{can_path_to, manhattan_heuristic, should_slow_drop};
use quetoo_nav::query::{find_closest, is_visible};
use quetoo_nav::stuck::{MoveSample, StuckAdvice, StuckDetector};
use quetoo_nav::{
    Bounds, Buttons, Contents, NavConfig, NavGraph, NavWorld, NodeId, PathResult, Vec3, find_path,
};
use tracing::debug;

/// Upward speed requested for a jump (negative to crouch).
pub const JUMP_SPEED: f32 = 270.0;

/// Frame length the turn speed is expressed in.
const TICK_MILLIS: f32 = 25.0;

/// What a bot wants to do this frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BotCommand {
    /// Speed along the current view direction.
    pub forward: f32,
    /// Speed to the right of the current view direction.
    pub right: f32,
    pub up: f32,
    pub buttons: Buttons,
    /// New view angles in degrees.
    pub pitch: f32,
    pub yaw: f32,
    pub use_weapon: Option<ItemId>,
    /// Holding still until a mover arrives.
    pub waiting: bool,
    /// Walking off a short one-way drop.
    pub slow_drop: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Task {
    LongRange,
    Hunt,
    Weaponry,
    Acrobatics,
    FindItems,
}

const TASKS: [Task; 5] = [
    Task::LongRange,
    Task::Hunt,
    Task::Weaponry,
    Task::Acrobatics,
    Task::FindItems,
];

/// Everything a frame's decisions read.
struct Tick<'a, W> {
    graph: &'a NavGraph,
    nav: &'a NavConfig,
    world: &'a W,
    bot: &'a BotState,
    now: u32,
    in_liquid: bool,
}

impl<W: BotWorld> Tick<'_, W> {
    fn closest(&self, position: Vec3, radius: f32) -> Option<NodeId> {
        let world: &dyn NavWorld = self.world;
        find_closest(self.graph, position, radius, Some(world), self.nav)
    }

    fn path_between(
        &self,
        from: Vec3,
        to: Vec3,
        from_radius: f32,
        to_radius: f32,
    ) -> Option<PathResult> {
        let src = self.closest(from, from_radius)?;
        let dst = self.closest(to, to_radius)?;
        find_path(self.graph, src, dst, &manhattan_heuristic)
    }
}

/// Reduce an angle to `[0, 360)` at the engine's 16-bit angle precision.
pub fn angle_mod(a: f32) -> f32 {
    (360.0 / 65536.0) * (((a * (65536.0 / 360.0)) as i32) & 65535) as f32
}

/// Turn from `current` towards `ideal` by at most `speed` degrees, the
/// short way round.
pub fn turn_angle(speed: f32, current: f32, ideal: f32) -> f32 {
    let current = angle_mod(current);
    let ideal = angle_mod(ideal);
    if current == ideal {
        return current;
    }

    let mut delta = ideal - current;
    if ideal > current {
        if delta >= 180.0 {
            delta -= 360.0;
        }
    } else if delta <= -180.0 {
        delta += 360.0;
    }

    angle_mod(current + delta.clamp(-speed, speed))
}

/// Pitch and yaw in degrees looking along `dir`; positive pitch looks down.
pub fn view_angles(dir: Vec3) -> Option<(f32, f32)> {
    let flat = (dir.x * dir.x + dir.y * dir.y).sqrt();
    if flat < 1e-3 && dir.z.abs() < 1e-3 {
        return None;
    }
    Some((-dir.z.atan2(flat).to_degrees(), dir.y.atan2(dir.x).to_degrees()))
}

#[derive(Clone, Debug)]
pub struct BotBrain {
    config: BotConfig,
    rng: BotRng,
    aim_target: Goal,
    move_target: Goal,
    /// The main path, parked while detouring for an item.
    backup_move_target: Goal,
    wander_angle: f32,
    /// Heading offset from the enemy while flanking.
    flank_angle: f32,
    lock_on_time: u32,
    reacquire_time: u32,
    weapon_check_time: u32,
    next_think: [u32; TASKS.len()],
    stuck: StuckDetector,
    last_origin: Option<Vec3>,
    frame: u32,
}

impl BotBrain {
    pub fn new(config: BotConfig, seed: u64) -> Self {
        Self {
            config,
            rng: BotRng::new(seed),
            aim_target: Goal::default(),
            move_target: Goal::default(),
            backup_move_target: Goal::default(),
            wander_angle: 0.0,
            flank_angle: 0.0,
            lock_on_time: 0,
            reacquire_time: 0,
            weapon_check_time: 0,
            next_think: [0; TASKS.len()],
            stuck: StuckDetector::new(),
            last_origin: None,
            frame: 0,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn aim_target(&self) -> &Goal {
        &self.aim_target
    }

    pub fn move_target(&self) -> &Goal {
        &self.move_target
    }

    pub fn backup_move_target(&self) -> &Goal {
        &self.backup_move_target
    }

    /// Level time before which item seeking stays off.
    pub fn reacquire_time(&self) -> u32 {
        self.reacquire_time
    }

    /// Replace the move target, e.g. for a scripted "go here".
    pub fn set_move_target(&mut self, goal: Goal) {
        self.move_target = goal;
    }

    /// Forget everything (respawn, disconnect, map change).
    pub fn reset(&mut self) {
        let config = self.config.clone();
        let rng = self.rng.clone();
        *self = Self::new(config, 0);
        self.rng = rng;
    }

    pub fn think<W: BotWorld>(
        &mut self,
        graph: &NavGraph,
        nav: &NavConfig,
        world: &W,
        bot: &BotState,
    ) -> BotCommand {
        let tick = Tick {
            graph,
            nav,
            world,
            bot,
            now: world.time(),
            in_liquid: world.point_contents(bot.origin).intersects(Contents::MASK_LIQUID),
        };
        let mut cmd = BotCommand {
            pitch: bot.pitch,
            yaw: bot.yaw,
            ..BotCommand::default()
        };
        self.frame = self.frame.wrapping_add(1);

        if bot.dead {
            self.aim_target.clear();
            self.move_target.clear();
            self.backup_move_target.clear();
            self.stuck.reset();
        }

        for (i, task) in TASKS.into_iter().enumerate() {
            if self.next_think[i] > tick.now {
                continue;
            }
            let delay = match task {
                Task::LongRange => self.long_range(&tick),
                Task::Hunt => self.hunt(&tick, &mut cmd, false),
                Task::Weaponry => self.weaponry(&tick, &mut cmd),
                Task::Acrobatics => self.acrobatics(&tick, &mut cmd),
                Task::FindItems => self.find_items(&tick),
            };
            self.next_think[i] = tick.now.saturating_add(delay);
        }

        if !bot.dead {
            self.turn_to_target(&tick, &mut cmd);
            self.move_to_target(&tick, &mut cmd, 0);
        }

        self.last_origin = Some(bot.origin);
        cmd
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    fn long_range<W: BotWorld>(&mut self, t: &Tick<W>) -> u32 {
        if t.bot.dead || !self.move_target.is_none() {
            return 200;
        }

        let radius = self.config.long_range_node_radius;
        let Some(src) = t.closest(t.bot.origin, radius) else {
            return 200;
        };

        for pick in long_range_items(t.world, t.bot, &mut self.rng) {
            let Some(dst) = t.closest(pick.origin, radius) else {
                continue;
            };
            let Some(path) = find_path(t.graph, src, dst, &manhattan_heuristic) else {
                continue;
            };
            if let Some(goal) = PathGoal::new(t.graph, path, Some((pick.entity, pick.spawn_id))) {
                debug!("long range goal: {} via {} nodes", pick.entity, goal.path.len());
                self.move_target = Goal::new(GoalKind::Path(goal), pick.weight, t.now);
                break;
            }
        }

        1000
    }

    fn hunt<W: BotWorld>(&mut self, t: &Tick<W>, cmd: &mut BotCommand, retry: bool) -> u32 {
        if t.bot.dead {
            return 1;
        }

        if let GoalKind::Ghost { entity, .. } = self.aim_target.kind {
            let state = t.world.entity(entity);
            if state.is_some_and(|e| can_target(t.world, t.bot, e)) {
                debug!("reacquired {entity}");
                let kind = GoalKind::Entity {
                    entity,
                    style: CombatStyle::Close,
                };
                self.aim_target = Goal::new(kind, self.config.enemy_priority, t.now);
                self.lock_on_time = t.now.saturating_add(self.config.lock_on_min);
            } else if t.now.saturating_sub(self.aim_target.time) >= self.config.ghost_memory
                || state.is_none_or(|e| e.dead || !e.active)
            {
                self.aim_target.clear();
            }
        }

        if let GoalKind::Entity { entity, .. } = self.aim_target.kind {
            let state = t.world.entity(entity).cloned();
            let visible = state.as_ref().is_some_and(|e| can_target(t.world, t.bot, e));
            if !visible {
                match state.filter(|e| !e.dead && e.active) {
                    Some(enemy) => {
                        if self.should_chase(t, &enemy) {
                            self.chase(t, &enemy);
                        }
                        debug!("lost sight of {entity}");
                        let ghost = GoalKind::Ghost {
                            entity,
                            last_seen: enemy.origin,
                        };
                        self.aim_target = Goal::new(ghost, self.config.enemy_priority, t.now);
                    }
                    None => self.aim_target.clear(),
                }
                let chasing = matches!(
                    self.move_target.kind,
                    GoalKind::Entity { entity: e, .. } if e == entity
                );
                if chasing {
                    self.move_target.clear();
                }
            }
        }

        if let GoalKind::Entity { entity, .. } = self.aim_target.kind {
            if !self.move_target.has_entity(entity) {
                if let Some(enemy) = t.world.entity(entity) {
                    if self.should_chase(t, enemy) {
                        debug!("closing in on {entity}");
                        self.move_target = self.aim_target.clone();
                    }
                }
            }
            return 3;
        }

        let found = t
            .world
            .entities()
            .iter()
            .find(|e| e.is_player() && can_target(t.world, t.bot, e))
            .map(|e| e.id);
        let Some(entity) = found else {
            return 5;
        };

        let style = match self.rng.range_u32(0, 3) {
            0 => CombatStyle::Close,
            1 => CombatStyle::Flank,
            _ => CombatStyle::Wander,
        };
        debug!("new enemy {entity}, {style:?}");
        let kind = GoalKind::Entity { entity, style };
        self.aim_target = Goal::new(kind, self.config.enemy_priority, t.now);
        let lock_on = self.rng.range_u32(self.config.lock_on_min, self.config.lock_on_max);
        self.lock_on_time = t.now.saturating_add(lock_on);
        self.flank_angle = if style == CombatStyle::Flank { self.rng.signed(90.0) } else { 0.0 };
        self.choose_weapon(t, cmd);

        if retry { 3 } else { self.hunt(t, cmd, true) }
    }

    fn should_chase<W: BotWorld>(&mut self, t: &Tick<W>, target: &EntityState) -> bool {
        if target.dead || !target.active {
            return false;
        }

        let mut chance = t
            .bot
            .weapon
            .and_then(|w| t.world.item_info(w))
            .map_or(0.0, |info| info.priority);
        if let EntityKind::Player { health, carrying_flag } = target.kind {
            if health < 50 {
                chance *= 1.5;
            }
            if carrying_flag {
                chance *= 2.0;
            }
        }

        self.rng.next_f32() < chance
    }

    fn chase<W: BotWorld>(&mut self, t: &Tick<W>, enemy: &EntityState) {
        let radius = self.config.chase_node_radius;
        let Some(path) = t.path_between(t.bot.origin, enemy.origin, radius, radius) else {
            return;
        };
        if let Some(goal) = PathGoal::new(t.graph, path, Some((enemy.id, 0))) {
            debug!("chasing {} out of sight", enemy.id);
            self.move_target = Goal::new(GoalKind::Path(goal), self.config.chase_priority, t.now);
        }
    }

    fn weaponry<W: BotWorld>(&mut self, t: &Tick<W>, cmd: &mut BotCommand) -> u32 {
        // Dead bots click to respawn.
        if t.bot.dead {
            if self.frame & 1 == 1 {
                cmd.buttons |= Buttons::ATTACK;
            }
            return 1;
        }

        if self.weapon_check_time < t.now {
            self.choose_weapon(t, cmd);
        }

        if matches!(self.aim_target.kind, GoalKind::Entity { .. }) && self.lock_on_time < t.now {
            cmd.buttons |= Buttons::ATTACK;
        }

        1
    }

    fn choose_weapon<W: BotWorld>(&mut self, t: &Tick<W>, cmd: &mut BotCommand) {
        self.weapon_check_time = t.now.saturating_add(self.config.weapon_check_delay);

        let target = match self.aim_target.kind {
            GoalKind::Entity { entity, .. } => t.world.entity(entity),
            _ => None,
        };
        let context = WeaponContext {
            range: target.map_or(RangeClass::DontCare, |e| {
                RangeClass::of(t.bot.origin.distance(e.origin), &self.config.ranges)
            }),
            target_health: target.and_then(EntityState::health),
            self_health: t.bot.health,
        };

        if let Some(weapon) = pick_best_weapon(t.world, t.bot, &context) {
            debug!("switching to weapon {}", weapon.0);
            cmd.use_weapon = Some(weapon);
            self.weapon_check_time = t.now.saturating_add(self.config.weapon_switch_delay);
        }
    }

    fn acrobatics<W: BotWorld>(&mut self, t: &Tick<W>, cmd: &mut BotCommand) -> u32 {
        if t.bot.dead {
            return 1;
        }
        if !matches!(self.aim_target.kind, GoalKind::Entity { .. }) {
            return 200;
        }

        if t.bot.ground_entity.is_some() {
            if self.rng.range_u32(0, 32) == 0 {
                cmd.up = -JUMP_SPEED;
            } else if self.rng.range_u32(0, 86) == 0 {
                cmd.up = JUMP_SPEED;
            }
        } else {
            cmd.up = 0.0;
        }

        1
    }

    fn find_items<W: BotWorld>(&mut self, t: &Tick<W>) -> u32 {
        if t.bot.dead {
            return 1;
        }
        if self.reacquire_time > t.now {
            return self.reacquire_time - t.now;
        }
        // Fighting or airborne: not the time to shop.
        let fighting = matches!(self.aim_target.kind, GoalKind::Entity { .. });
        if fighting || t.bot.ground_entity.is_none() {
            return 5;
        }

        let current = match &self.move_target.kind {
            GoalKind::Item { entity, spawn_id } => Some((*entity, *spawn_id)),
            GoalKind::Path(path) => path.target,
            _ => None,
        };
        if let Some((entity, spawn_id)) = current {
            let state = t.world.entity(entity);
            if state.is_none_or(|e| e.item().is_some()) {
                let wanted = state.is_some_and(|e| {
                    e.item().is_some_and(|(_, s)| s == spawn_id)
                        && is_targetable(t.world, t.bot, e)
                        && t.world.can_pickup(t.bot, e)
                });
                if wanted {
                    return 5;
                }
                debug!("item goal {entity} is gone");
                self.move_target.clear();
                if !self.backup_move_target.is_none() {
                    self.restore_main_path(t);
                }
            }
        }

        let skip = self.move_target.path().and_then(|p| p.target);
        for pick in visible_items(t.world, t.bot, t.nav, &self.config, skip) {
            if pick.weight <= self.move_target.priority {
                break;
            }
            if let Some(kind) = self.item_goal(t, &pick) {
                self.backup_main_path();
                debug!("detouring for item {} (weight {:.1})", pick.entity, pick.weight);
                self.move_target = Goal::new(kind, pick.weight, t.now);
                break;
            }
        }

        5
    }

    /// A path to the item when the graph covers both ends, a direct walk
    /// when it does not, `None` when the graph says it is too far.
    fn item_goal<W: BotWorld>(&self, t: &Tick<W>, pick: &ItemPick) -> Option<GoalKind> {
        let src = t.closest(t.bot.origin, self.config.item_node_radius);
        let dst = t.closest(pick.origin, self.config.long_range_node_radius);
        let (Some(src), Some(dst)) = (src, dst) else {
            return Some(GoalKind::Item {
                entity: pick.entity,
                spawn_id: pick.spawn_id,
            });
        };

        let path = find_path(t.graph, src, dst, &manhattan_heuristic)?;
        if path.total_cost > self.config.max_item_distance {
            return None;
        }
        PathGoal::new(t.graph, path, Some((pick.entity, pick.spawn_id))).map(GoalKind::Path)
    }

    fn backup_main_path(&mut self) {
        if self.backup_move_target.is_none() && self.move_target.path().is_some() {
            debug!("backing up main path");
            self.backup_move_target = self.move_target.clone();
        }
    }

    /// Re-path to the destination of the backed-up main path from wherever
    /// the detour left us.
    fn restore_main_path<W: BotWorld>(&mut self, t: &Tick<W>) {
        let backup = std::mem::take(&mut self.backup_move_target);
        self.move_target.clear();

        if let GoalKind::Path(main) = backup.kind {
            let restored = main
                .destination()
                .filter(|_| main.path.is_current(t.graph))
                .and_then(|dest| {
                    let src = t.closest(t.bot.origin, self.config.item_node_radius)?;
                    find_path(t.graph, src, dest, &manhattan_heuristic)
                })
                .and_then(|path| PathGoal::new(t.graph, path, main.target));
            if let Some(goal) = restored {
                debug!("returning to main path");
                self.move_target = Goal::new(GoalKind::Path(goal), backup.priority, t.now);
            }
        }

        // Let long range pick something right away if we have nothing.
        self.next_think[0] = 0;
    }

    // -----------------------------------------------------------------------
    // Turning
    // -----------------------------------------------------------------------

    fn turn_to_target<W: BotWorld>(&mut self, t: &Tick<W>, cmd: &mut BotCommand) {
        let bot = t.bot;
        let ideal = match self.aim_target.kind.clone() {
            GoalKind::Entity { entity, .. } => {
                // Projectiles need leading; the speed guess varies per frame.
                let lead_speed = if self.weapon_is_projectile(t) {
                    let min = self.config.projectile_speed_min;
                    let max = self.config.projectile_speed_max;
                    Some(self.rng.range_f32(min, max))
                } else {
                    None
                };
                t.world.entity(entity).and_then(|enemy| {
                    let mut point = enemy.origin;
                    if let Some(speed) = lead_speed {
                        let time = bot.origin.distance(point) / speed;
                        point = point + enemy.velocity.scale(time);
                    }
                    let (pitch, yaw) = view_angles(point - bot.origin)?;
                    let now = t.now as f32;
                    Some((pitch + (now / 128.0).sin() * 4.3, yaw + (now / 164.0).cos() * 4.0))
                })
            }
            GoalKind::Ghost { last_seen, .. } => view_angles(last_seen - bot.origin),
            _ => self.movement_view(t),
        };

        let Some((pitch, yaw)) = ideal else {
            return;
        };
        let speed = self.config.turn_speed * (bot.msec as f32 / TICK_MILLIS);
        cmd.pitch = turn_angle(speed, bot.pitch, pitch);
        cmd.yaw = turn_angle(speed, bot.yaw, yaw);
    }

    fn weapon_is_projectile<W: BotWorld>(&self, t: &Tick<W>) -> bool {
        t.bot
            .weapon
            .and_then(|w| t.world.item_info(w))
            .and_then(|info| info.weapon.as_ref())
            .is_some_and(|weapon| weapon.traits.projectile)
    }

    /// Where to look while moving: along the path (one node ahead on
    /// two-way links, which reads more naturally), at the target, or along
    /// the wander heading. Pitch stays level out of water.
    fn movement_view<W: BotWorld>(&self, t: &Tick<W>) -> Option<(f32, f32)> {
        let bot = t.bot;
        let point = match &self.move_target.kind {
            GoalKind::None => return Some((0.0, self.wander_angle)),
            GoalKind::Path(path) => {
                let linked_back = path
                    .previous_node()
                    .zip(path.node())
                    .is_some_and(|(prev, node)| t.graph.is_linked(node, prev));
                if linked_back && !t.in_liquid { path.next_position } else { path.position }
            }
            GoalKind::Position(p) => *p,
            GoalKind::Ghost { last_seen, .. } => *last_seen,
            GoalKind::Entity { entity, .. } | GoalKind::Item { entity, .. } => {
                t.world.entity(*entity)?.origin
            }
        };

        let (pitch, yaw) = view_angles(point - bot.origin)?;
        Some((if t.in_liquid { pitch } else { 0.0 }, yaw))
    }

    // -----------------------------------------------------------------------
    // Moving
    // -----------------------------------------------------------------------

    fn set_combat_style(&mut self, style: CombatStyle) {
        for goal in [&mut self.aim_target, &mut self.move_target] {
            if let GoalKind::Entity { style: s, .. } = &mut goal.kind {
                *s = style;
            }
        }
        self.flank_angle = if style == CombatStyle::Flank { self.rng.signed(90.0) } else { 0.0 };
    }

    /// Heading for wandering, or for flanking when `enemy` is given. Turns
    /// away when a wall is close ahead.
    fn wander_yaw<W: BotWorld>(&mut self, t: &Tick<W>, enemy: Option<(Vec3, CombatStyle)>) -> f32 {
        let bot = t.bot;
        let heading = |brain: &Self| match enemy {
            Some((position, _)) => {
                let yaw = view_angles(position - bot.origin).map_or(bot.yaw, |(_, yaw)| yaw);
                yaw + brain.flank_angle
            }
            None => brain.wander_angle,
        };

        let (sin, cos) = heading(self).to_radians().sin_cos();
        let reach = (bot.bounds.maxs.x - bot.bounds.mins.x) * 2.0;
        let end = bot.origin + Vec3::new(cos, sin, 0.0).scale(reach);
        let tr = t.world.trace(bot.origin, end, Bounds::POINT, Contents::MASK_SOLID);

        if tr.fraction < 1.0 {
            let change = self.rng.range_f32(45.0, 90.0);
            let change = self.rng.signed(change);
            match enemy {
                Some((_, CombatStyle::Flank)) => self.flank_angle = -self.flank_angle,
                Some(_) => self.flank_angle = angle_mod(self.flank_angle + change),
                None => self.wander_angle = angle_mod(self.wander_angle + change),
            }
        }

        heading(self)
    }

    fn move_to_target<W: BotWorld>(&mut self, t: &Tick<W>, cmd: &mut BotCommand, depth: u8) {
        let bot = t.bot;

        // Node ids in a path are only meaningful for the graph generation
        // it was computed against.
        if self.move_target.path().is_some_and(|p| !p.path.is_current(t.graph)) {
            debug!("path went stale");
            self.restore_main_path(t);
        }

        let padded = bot.abs_bounds().expand(self.config.node_padding);
        let mut arrived = None;
        if let Some(path) = self.move_target.path_mut() {
            if padded.contains(path.position) {
                arrived = Some(path.advance(t.graph));
            }
        }
        match arrived {
            Some(true) => self.move_target.reset_progress(),
            Some(false) => {
                debug!("path complete");
                self.restore_main_path(t);
                if depth < 2 {
                    self.move_to_target(t, cmd, depth + 1);
                }
                return;
            }
            None => {}
        }

        let mut wander = false;
        let mut enemy = None;
        let dest = match &self.move_target.kind {
            GoalKind::None => {
                wander = true;
                Some(bot.origin)
            }
            GoalKind::Position(p) => Some(*p),
            GoalKind::Ghost { last_seen, .. } => Some(*last_seen),
            GoalKind::Path(path) => Some(path.position),
            GoalKind::Item { entity, .. } => t.world.entity(*entity).map(|e| e.origin),
            GoalKind::Entity { entity, style } => t.world.entity(*entity).map(|e| {
                enemy = Some((e.origin, *style));
                wander = matches!(style, CombatStyle::Flank | CombatStyle::Wander);
                e.origin
            }),
        };
        let Some(dest) = dest else {
            self.move_target.clear();
            if depth < 2 {
                self.move_to_target(t, cmd, depth + 1);
            }
            return;
        };

        if !wander && !self.move_target.is_none() {
            let distance = bot.origin.distance(dest);
            let blocked = !is_visible(t.world, bot.eye(), dest);
            let keep = self.move_target.update_distress(
                distance,
                t.in_liquid,
                blocked,
                self.config.distress_limit,
                self.config.distress_extension,
            );
            if !keep {
                debug!("distress limit reached; dropping goal");
                self.move_target.clear();
                self.reacquire_time = t.now.saturating_add(self.config.reacquire_delay);
                if depth < 2 {
                    self.move_to_target(t, cmd, depth + 1);
                }
                return;
            }
        }

        let dest = if wander {
            let (sin, cos) = self.wander_yaw(t, enemy).to_radians().sin_cos();
            bot.origin + Vec3::new(cos, sin, 0.0)
        } else {
            dest
        };

        let dir = dest - bot.origin;
        let len = dir.length();
        if let Some((_, CombatStyle::Close)) = enemy {
            // Too close for comfort; break off sometimes.
            if len < 200.0 && self.rng.coin() {
                let style = if self.rng.coin() { CombatStyle::Flank } else { CombatStyle::Wander };
                self.set_combat_style(style);
            }
        }

        let run = t.nav.run_speed;
        let mut speed = run;
        if let Some(path) = self.move_target.path() {
            let on_ground = bot.ground_entity.is_some();
            if !t.in_liquid && !can_path_to(t.graph, t.world, &path.path.nodes, path.index, t.nav) {
                speed = 0.0;
                cmd.waiting = true;
            } else if !t.in_liquid
                && !on_ground
                && bot.velocity.z < 0.0
                && path.position.z - bot.origin.z <= -t.nav.step_height
            {
                // Falling onto the node: steer rather than overshoot.
                speed = len.max(10.0).min(run);
            } else if !t.in_liquid
                && path
                    .previous_node()
                    .zip(path.node())
                    .is_some_and(|(from, to)| should_slow_drop(t.graph, from, to, t.nav))
            {
                speed = run * 0.5;
                cmd.slow_drop = true;
            }

            if t.in_liquid && on_ground {
                cmd.up = JUMP_SPEED;
            }
        } else if t.in_liquid {
            cmd.up = JUMP_SPEED;
        }
        if cmd.waiting {
            self.move_target.distress_extension = true;
        }

        if let Some((_, yaw)) = view_angles(Vec3::new(dir.x, dir.y, 0.0)) {
            let delta = (bot.yaw - yaw).to_radians();
            cmd.forward = delta.cos() * speed;
            cmd.right = delta.sin() * speed;
        }

        self.check_stuck(t, cmd, wander);
    }

    /// Teleport handling and stuck detection, after the move is decided.
    fn check_stuck<W: BotWorld>(&mut self, t: &Tick<W>, cmd: &mut BotCommand, wander: bool) {
        let bot = t.bot;
        let moved = self.last_origin.map(|last| last.distance(bot.origin));

        if moved.is_some_and(|m| m > t.nav.teleport_distance) {
            self.stuck.reset();
            let advanced = self.move_target.path_mut().map(|path| path.advance(t.graph));
            match advanced {
                Some(true) => self.move_target.reset_progress(),
                Some(false) => self.restore_main_path(t),
                None => {}
            }
            return;
        }

        if cmd.waiting {
            self.stuck.reset();
            return;
        }

        let before = self.stuck.distress();
        let sample = MoveSample {
            position: bot.origin,
            msec: bot.msec,
            in_liquid: t.in_liquid,
            on_mover: bot.on_mover(),
        };
        let advice = self.stuck.update(sample, t.nav);
        self.move_target.add_distress(self.stuck.distress() - before);

        match advice {
            StuckAdvice::None => {}
            StuckAdvice::Jump => cmd.up = JUMP_SPEED,
            StuckAdvice::Turn => {
                // Sidestep, left or right depending on the goal.
                if cmd.right == 0.0 {
                    let odd = self.move_target.time & 1 == 1;
                    cmd.right = if odd { -cmd.forward } else { cmd.forward };
                }
                if wander {
                    let change = self.rng.signed(90.0);
                    self.wander_angle = angle_mod(self.wander_angle + change);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Inventory, ItemInfo, ItemKind, SimWorld};
    use quetoo_nav::{BoxWorld, EntityId};

    fn floor() -> BoxWorld {
        let mut geometry = BoxWorld::new();
        geometry.add_solid(Vec3::new(-2048.0, -2048.0, -16.0), Vec3::new(2048.0, 2048.0, 0.0));
        geometry
    }

    fn corridor(n: u32) -> NavGraph {
        let mut graph = NavGraph::new();
        for i in 0..n {
            graph.create_node(Vec3::new(i as f32 * 100.0, 0.0, 24.0));
        }
        for i in 1..n {
            graph.create_default_link(NodeId(i - 1), NodeId(i), true).unwrap();
        }
        graph
    }

    fn bot_at(x: f32, y: f32, z: f32) -> BotState {
        BotState::standing(EntityId(100), Vec3::new(x, y, z))
    }

    fn path_goal(graph: &NavGraph, from: u32, to: u32, priority: f32) -> Goal {
        let path = find_path(graph, NodeId(from), NodeId(to), &manhattan_heuristic).unwrap();
        Goal::new(GoalKind::Path(PathGoal::new(graph, path, None).unwrap()), priority, 0)
    }

    #[test]
    fn angles_wrap_and_clamp() {
        assert_eq!(angle_mod(360.0), 0.0);
        assert!((angle_mod(-90.0) - 270.0).abs() < 0.05);
        // Short way round across zero.
        assert!((turn_angle(10.0, 355.0, 5.0) - 5.0).abs() < 0.05);
        assert!((turn_angle(10.0, 5.0, 350.0) - 355.0).abs() < 0.05);
        assert!((turn_angle(10.0, 0.0, 90.0) - 10.0).abs() < 0.05);
        assert_eq!(turn_angle(10.0, 45.0, 45.0), angle_mod(45.0));
    }

    #[test]
    fn view_angles_follow_engine_convention() {
        let (pitch, yaw) = view_angles(Vec3::new(0.0, 10.0, 0.0)).unwrap();
        assert!(pitch.abs() < 1e-4 && (yaw - 90.0).abs() < 1e-4);
        let (pitch, _) = view_angles(Vec3::new(10.0, 0.0, -10.0)).unwrap();
        assert!((pitch - 45.0).abs() < 1e-4);
        assert!(view_angles(Vec3::ZERO).is_none());
    }

    #[test]
    fn detours_for_item_and_returns_to_main_path() {
        let mut world = SimWorld::new(floor());
        let health = world.add_item_kind(ItemInfo {
            name: "health".into(),
            kind: ItemKind::Health,
            priority: 1.0,
            weapon: None,
        });
        let item = world.spawn_item(health, Vec3::new(200.0, 40.0, 24.0));
        let graph = corridor(9);
        let nav = NavConfig::default();
        let bot = bot_at(0.0, 0.0, 24.0);

        let mut brain = BotBrain::new(BotConfig::default(), 1);
        brain.set_move_target(path_goal(&graph, 0, 8, 0.5));
        brain.think(&graph, &nav, &world, &bot);

        let detour = brain.move_target().path().unwrap();
        assert_eq!(detour.target, Some((item, 1)));
        assert_eq!(detour.destination(), Some(NodeId(2)));
        assert_eq!(brain.backup_move_target().path().unwrap().destination(), Some(NodeId(8)));

        // Someone else grabs it.
        world.entity_mut(item).unwrap().active = false;
        world.time = 100;
        brain.think(&graph, &nav, &world, &bot);

        let main = brain.move_target().path().unwrap();
        assert_eq!(main.destination(), Some(NodeId(8)));
        assert_eq!(main.target, None);
        assert_eq!(brain.move_target().priority, 0.5);
        assert!(brain.backup_move_target().is_none());
    }

    #[test]
    fn lost_enemy_becomes_ghost_then_fades() {
        let mut geometry = floor();
        geometry.add_solid(Vec3::new(200.0, -64.0, 0.0), Vec3::new(216.0, 64.0, 128.0));
        let mut world = SimWorld::new(geometry);
        let enemy = world.spawn_player(Vec3::new(150.0, 0.0, 24.0), 100);
        let graph = NavGraph::new();
        let nav = NavConfig::default();
        let bot = bot_at(0.0, 0.0, 24.0);

        let mut brain = BotBrain::new(BotConfig::default(), 3);
        brain.think(&graph, &nav, &world, &bot);
        assert_eq!(brain.aim_target().enemy(), Some(enemy));
        assert!(matches!(brain.aim_target().kind, GoalKind::Entity { .. }));

        let hidden = Vec3::new(300.0, 0.0, 24.0);
        world.entity_mut(enemy).unwrap().origin = hidden;
        world.time = 100;
        brain.think(&graph, &nav, &world, &bot);
        assert_eq!(
            brain.aim_target().kind,
            GoalKind::Ghost {
                entity: enemy,
                last_seen: hidden
            }
        );

        world.time = 2200;
        brain.think(&graph, &nav, &world, &bot);
        assert!(brain.aim_target().is_none());
    }

    #[test]
    fn ghost_is_reacquired_on_sight() {
        let mut geometry = floor();
        geometry.add_solid(Vec3::new(200.0, -64.0, 0.0), Vec3::new(216.0, 64.0, 128.0));
        let mut world = SimWorld::new(geometry);
        let enemy = world.spawn_player(Vec3::new(150.0, 0.0, 24.0), 100);
        let graph = NavGraph::new();
        let nav = NavConfig::default();
        let bot = bot_at(0.0, 0.0, 24.0);

        let mut brain = BotBrain::new(BotConfig::default(), 3);
        brain.think(&graph, &nav, &world, &bot);
        world.entity_mut(enemy).unwrap().origin = Vec3::new(300.0, 0.0, 24.0);
        world.time = 100;
        brain.think(&graph, &nav, &world, &bot);
        assert!(matches!(brain.aim_target().kind, GoalKind::Ghost { .. }));

        world.entity_mut(enemy).unwrap().origin = Vec3::new(150.0, 10.0, 24.0);
        world.time = 500;
        brain.think(&graph, &nav, &world, &bot);
        let kind = &brain.aim_target().kind;
        assert!(matches!(kind, GoalKind::Entity { entity, .. } if *entity == enemy));
    }

    #[test]
    fn waits_for_mover_that_is_not_there() {
        let world = SimWorld::new(floor());
        let mut graph = NavGraph::new();
        let a = graph.create_node(Vec3::new(0.0, 0.0, 24.0));
        let b = graph.create_node(Vec3::new(100.0, 0.0, 24.0));
        graph.create_default_link(a, b, true).unwrap();
        graph.set_mover(b, Some(EntityId(5))).unwrap();
        let nav = NavConfig::default();

        let mut brain = BotBrain::new(BotConfig::default(), 4);
        brain.set_move_target(path_goal(&graph, 0, 1, 1.0));
        let cmd = brain.think(&graph, &nav, &world, &bot_at(0.0, 0.0, 24.0));

        assert!(cmd.waiting);
        assert_eq!((cmd.forward, cmd.right), (0.0, 0.0));
        assert_eq!(brain.move_target().path().unwrap().index, 1);
        assert!(brain.move_target().distress_extension);
    }

    #[test]
    fn walks_off_short_one_way_drops() {
        let mut geometry = floor();
        geometry.add_solid(Vec3::new(-512.0, -512.0, 0.0), Vec3::new(20.0, 512.0, 64.0));
        let world = SimWorld::new(geometry);
        let mut graph = NavGraph::new();
        let top = graph.create_node(Vec3::new(0.0, 0.0, 88.0));
        let bottom = graph.create_node(Vec3::new(40.0, 0.0, 24.0));
        graph.create_default_link(top, bottom, false).unwrap();
        let nav = NavConfig::default();

        let mut brain = BotBrain::new(BotConfig::default(), 5);
        brain.set_move_target(path_goal(&graph, 0, 1, 1.0));
        let cmd = brain.think(&graph, &nav, &world, &bot_at(0.0, 0.0, 88.0));

        assert!(cmd.slow_drop);
        assert!((cmd.forward - nav.run_speed * 0.5).abs() < 1e-3);
    }

    #[test]
    fn stale_path_is_dropped() {
        let world = SimWorld::new(floor());
        let mut graph = corridor(4);
        let nav = NavConfig::default();
        let bot = bot_at(500.0, 300.0, 24.0);

        let mut brain = BotBrain::new(BotConfig::default(), 6);
        brain.set_move_target(path_goal(&graph, 0, 3, 1.0));
        graph.destroy_node(NodeId(3)).unwrap();
        brain.think(&graph, &nav, &world, &bot);
        assert!(brain.move_target().path().is_none());
    }

    #[test]
    fn dead_bot_clears_goals_and_clicks_to_respawn() {
        let world = SimWorld::new(floor());
        let graph = corridor(3);
        let nav = NavConfig::default();
        let mut bot = bot_at(0.0, 0.0, 24.0);
        bot.dead = true;

        let mut brain = BotBrain::new(BotConfig::default(), 7);
        brain.set_move_target(path_goal(&graph, 0, 2, 1.0));
        let first = brain.think(&graph, &nav, &world, &bot);
        assert!(brain.move_target().is_none());
        assert!(first.buttons.contains(Buttons::ATTACK));
        let second = brain.think(&graph, &nav, &world, &bot);
        assert!(!second.buttons.contains(Buttons::ATTACK));
    }

    #[test]
    fn switches_to_range_appropriate_weapon_on_acquire() {
        let mut world = SimWorld::new(floor());
        let shells = world.add_item_kind(ItemInfo {
            name: "shells".into(),
            kind: ItemKind::Ammo,
            priority: 0.1,
            weapon: None,
        });
        let weapon = |name: &str, traits| ItemInfo {
            name: name.into(),
            kind: ItemKind::Weapon,
            priority: 0.6,
            weapon: Some(crate::env::WeaponInfo {
                ammo: Some(shells),
                ammo_per_shot: 1,
                traits,
            }),
        };
        let shotgun = world.add_item_kind(weapon(
            "shotgun",
            crate::env::WeaponTraits {
                short_range: true,
                ..Default::default()
            },
        ));
        let rail = world.add_item_kind(weapon(
            "railgun",
            crate::env::WeaponTraits {
                long_range: true,
                ..Default::default()
            },
        ));
        world.spawn_player(Vec3::new(700.0, 0.0, 24.0), 100);

        let mut bot = bot_at(0.0, 0.0, 24.0);
        bot.inventory = Inventory::new().with(shells, 10).with(shotgun, 1).with(rail, 1);
        bot.weapon = Some(shotgun);

        let mut brain = BotBrain::new(BotConfig::default(), 8);
        let cmd = brain.think(&NavGraph::new(), &NavConfig::default(), &world, &bot);
        assert_eq!(cmd.use_weapon, Some(rail));
        assert!(!cmd.buttons.contains(Buttons::ATTACK));
    }

    #[test]
    fn deadlines_saturate_at_end_of_clock() {
        let mut world = SimWorld::new(floor());
        world.spawn_player(Vec3::new(300.0, 0.0, 24.0), 100);
        let bot = bot_at(0.0, 0.0, 24.0);
        let graph = NavGraph::new();
        let nav = NavConfig::default();

        // Lock-on lands past the end of the clock and never fires.
        let mut brain = BotBrain::new(BotConfig::default(), 9);
        world.time = u32::MAX - 100;
        brain.think(&graph, &nav, &world, &bot);
        assert!(brain.aim_target().enemy().is_some());
        world.time = u32::MAX;
        let cmd = brain.think(&graph, &nav, &world, &bot);
        assert!(!cmd.buttons.contains(Buttons::ATTACK));

        // A goal abandoned near the end pauses item seeking until the end.
        let mut geometry = floor();
        geometry.add_solid(Vec3::new(100.0, -256.0, 0.0), Vec3::new(116.0, 256.0, 256.0));
        let mut world = SimWorld::new(geometry);
        let nav = NavConfig {
            walk_speed_modifier: 0.5,
            ..NavConfig::default()
        };
        let config = BotConfig {
            reacquire_delay: 5000,
            ..BotConfig::default()
        };
        let mut brain = BotBrain::new(config, 10);
        brain.set_move_target(Goal::new(GoalKind::Position(Vec3::new(300.0, 0.0, 24.0)), 1.0, 0));
        let start = u32::MAX - 3000;
        let mut gave_up = false;
        for frame in 0..119 {
            world.time = start + frame * 25;
            brain.think(&graph, &nav, &world, &bot);
            if brain.move_target().is_none() {
                gave_up = true;
                break;
            }
        }
        assert!(gave_up);
        assert_eq!(brain.reacquire_time(), u32::MAX);
    }
}
