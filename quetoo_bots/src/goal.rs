// Bot goals.
//
// A bot keeps an aim target (what to look and shoot at) and a move target
// (where to walk), plus a backup of its main path while it detours for a
// nearby item. Each is a `Goal`: a kind, a priority and the level time it
// was set. Path goals also carry their place along the path.
//
// Goal distress measures lack of progress towards the goal. It halves
// whenever the bot gets closer than ever before, and grows while it does
// not or while the destination is out of sight. Past the limit the goal is
// abandoned. Waiting for a mover extends the limit.

use quetoo_nav::{EntityId, NavGraph, NodeId, PathResult, Vec3};

/// How a bot fights an enemy it is moving towards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CombatStyle {
    #[default]
    None,
    /// Run straight at them.
    Close,
    /// Circle sideways.
    Flank,
    /// Move about randomly while shooting.
    Wander,
}

/// Progress along a graph path.
#[derive(Clone, Debug, PartialEq)]
pub struct PathGoal {
    pub path: PathResult,
    /// Index of the node currently being walked to.
    pub index: usize,
    pub position: Vec3,
    /// Position of the node after `index` (or the last node).
    pub next_position: Vec3,
    /// Entity the path leads to, with its spawn id for items.
    pub target: Option<(EntityId, u32)>,
}

impl PathGoal {
    /// Start at the first node. `None` for an empty path or one that does
    /// not match the graph.
    pub fn new(
        graph: &NavGraph,
        path: PathResult,
        target: Option<(EntityId, u32)>,
    ) -> Option<Self> {
        let first = path.first()?;
        let position = graph.position(first).ok()?;
        let mut goal = Self {
            path,
            index: 0,
            position,
            next_position: position,
            target,
        };
        goal.next_position = goal.lookahead(graph)?;
        Some(goal)
    }

    pub fn node(&self) -> Option<NodeId> {
        self.path.nodes.get(self.index).copied()
    }

    pub fn previous_node(&self) -> Option<NodeId> {
        self.index.checked_sub(1).and_then(|i| self.path.nodes.get(i).copied())
    }

    pub fn destination(&self) -> Option<NodeId> {
        self.path.last()
    }

    fn lookahead(&self, graph: &NavGraph) -> Option<Vec3> {
        let next = (self.index + 1).min(self.path.len().saturating_sub(1));
        graph.position(*self.path.nodes.get(next)?).ok()
    }

    /// Move on to the next node. Returns false when the path is finished.
    pub fn advance(&mut self, graph: &NavGraph) -> bool {
        self.index += 1;
        let Some(node) = self.node() else {
            return false;
        };
        let (Ok(position), Some(next)) = (graph.position(node), self.lookahead(graph)) else {
            return false;
        };
        self.position = position;
        self.next_position = next;
        true
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum GoalKind {
    #[default]
    None,
    Position(Vec3),
    Entity { entity: EntityId, style: CombatStyle },
    /// Where an enemy was last seen.
    Ghost { entity: EntityId, last_seen: Vec3 },
    /// Walk straight to an item.
    Item { entity: EntityId, spawn_id: u32 },
    Path(PathGoal),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Goal {
    pub kind: GoalKind,
    pub priority: f32,
    /// Level time the goal was set.
    pub time: u32,
    pub distress: f32,
    pub distress_extension: bool,
    /// Closest distance to the destination so far.
    pub last_distance: f32,
}

impl Default for Goal {
    fn default() -> Self {
        Self {
            kind: GoalKind::None,
            priority: 0.0,
            time: 0,
            distress: 0.0,
            distress_extension: false,
            last_distance: f32::MAX,
        }
    }
}

impl Goal {
    pub fn new(kind: GoalKind, priority: f32, time: u32) -> Self {
        Self {
            kind,
            priority,
            time,
            ..Self::default()
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self.kind, GoalKind::None)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn path(&self) -> Option<&PathGoal> {
        match &self.kind {
            GoalKind::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn path_mut(&mut self) -> Option<&mut PathGoal> {
        match &mut self.kind {
            GoalKind::Path(path) => Some(path),
            _ => None,
        }
    }

    /// The enemy entity of an entity or ghost goal.
    pub fn enemy(&self) -> Option<EntityId> {
        match self.kind {
            GoalKind::Entity { entity, .. } | GoalKind::Ghost { entity, .. } => Some(entity),
            _ => None,
        }
    }

    /// Whether this goal is about `entity` in any way.
    pub fn has_entity(&self, entity: EntityId) -> bool {
        match &self.kind {
            GoalKind::Entity { entity: e, .. }
            | GoalKind::Ghost { entity: e, .. }
            | GoalKind::Item { entity: e, .. } => {
                *e == entity
            }
            GoalKind::Path(path) => path.target.is_some_and(|(e, _)| e == entity),
            _ => false,
        }
    }

    /// Moving-to-node state is fresh whenever a path advances.
    pub fn reset_progress(&mut self) {
        self.distress = 0.0;
        self.distress_extension = false;
        self.last_distance = f32::MAX;
    }

    /// Update distress from this frame's distance to the destination.
    /// Returns false once the goal should be abandoned.
    pub fn update_distress(
        &mut self,
        distance: f32,
        in_liquid: bool,
        blocked: bool,
        limit: f32,
        extension: f32,
    ) -> bool {
        if self.is_none() {
            return true;
        }

        if distance < self.last_distance {
            self.last_distance = distance;
            self.distress /= 2.0;
        } else {
            self.distress += if in_liquid { 0.05 } else { 0.25 };
        }
        if blocked {
            self.distress += 0.25;
        }

        let limit = if self.distress_extension { limit * extension } else { limit };
        if self.distress > limit {
            self.distress = 0.0;
            self.last_distance = 0.0;
            self.distress_extension = false;
            return false;
        }
        true
    }

    /// Add (or with a negative amount, remove) distress from being stuck.
    pub fn add_distress(&mut self, amount: f32) {
        self.distress = (self.distress + amount).max(0.0);
    }
}
