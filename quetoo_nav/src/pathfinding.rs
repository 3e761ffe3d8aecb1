// A* pathfinding over the navigation graph.
//
// Standard best-first search with a `BinaryHeap` frontier (min-heap via
// reversed ordering). Per-search scores and came-from links live in `Vec`s
// indexed by `NodeId`, so the graph itself is never written during a search
// and several bots can query it back to back without interference.
//
// The heuristic is pluggable. The default is Manhattan distance between node
// positions, which can overestimate the Euclidean link costs: paths are
// fast to find but not guaranteed optimal on graphs with many diagonals.
// `euclidean_heuristic` is admissible, and `zero_heuristic` turns the search
// into Dijkstra. Because an inadmissible heuristic can settle a node too
// early, nodes are re-opened whenever a strictly cheaper route to them turns
// up; stale heap entries are skipped on pop.
//
// Also hosts the two per-step checks bots make while following a path:
// whether the next node rides a mover that is currently in place
// (`can_path_to`), and whether the next link is a drop that should be
// approached at walking speed (`should_slow_drop`).
//
// See also: `graph.rs` for the `NavGraph` being searched, `quetoo_bots`
// which calls pathfinding during goal selection.
//
// **Critical constraint: determinism.** For a given graph and endpoints the
// result is always the same. Heap ties are broken by node index.

use crate::config::NavConfig;
use crate::graph::NavGraph;
use crate::types::{Bounds, Contents, NodeId, Vec3};
use crate::world::{NavWorld, TraceResult};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// Estimated remaining cost from the first node to the second.
pub type Heuristic = dyn Fn(&NavGraph, NodeId, NodeId) -> f32;

/// Sum of per-axis distances between the two node positions.
pub fn manhattan_heuristic(graph: &NavGraph, from: NodeId, to: NodeId) -> f32 {
    match (graph.position(from), graph.position(to)) {
        (Ok(a), Ok(b)) => a.manhattan_distance(b),
        _ => 0.0,
    }
}

/// Straight-line distance between the two node positions.
pub fn euclidean_heuristic(graph: &NavGraph, from: NodeId, to: NodeId) -> f32 {
    match (graph.position(from), graph.position(to)) {
        (Ok(a), Ok(b)) => a.distance(b),
        _ => 0.0,
    }
}

pub fn zero_heuristic(_graph: &NavGraph, _from: NodeId, _to: NodeId) -> f32 {
    0.0
}

/// The result of a successful search.
#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
    /// Sequence of node ids from start to goal (inclusive).
    pub nodes: Vec<NodeId>,
    /// Sum of the link costs along `nodes`.
    pub total_cost: f32,
    /// Graph generation the ids refer to.
    pub generation: u64,
}

impl PathResult {
    /// False once a node has been deleted since the search, at which point
    /// the ids in `nodes` may point at different nodes.
    pub fn is_current(&self, graph: &NavGraph) -> bool {
        self.generation == graph.generation()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }
}

/// Entry in the open set (min-heap via reversed ordering).
struct OpenEntry {
    node: NodeId,
    g_score: f32,
    f_score: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal && self.node == other.node
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.node.0.cmp(&self.node.0))
    }
}

/// Find a path from `start` to `goal`.
///
/// Returns `None` if either endpoint is out of range or the goal cannot be
/// reached. `start == goal` yields a one-node path of cost zero.
pub fn find_path(
    graph: &NavGraph,
    start: NodeId,
    goal: NodeId,
    heuristic: &Heuristic,
) -> Option<PathResult> {
    let n = graph.node_count();
    if !graph.contains(start) || !graph.contains(goal) {
        return None;
    }
    if start == goal {
        return Some(PathResult {
            nodes: vec![start],
            total_cost: 0.0,
            generation: graph.generation(),
        });
    }

    // g_score[node] = cost of cheapest known route from start to node.
    let mut g_score = vec![f32::INFINITY; n];
    let mut came_from: Vec<Option<NodeId>> = vec![None; n];
    let mut touched = 1usize;

    g_score[start.index()] = 0.0;

    let mut open = BinaryHeap::new();
    open.push(OpenEntry {
        node: start,
        g_score: 0.0,
        f_score: heuristic(graph, start, goal),
    });

    let nodes = graph.nodes();

    while let Some(current) = open.pop() {
        let ci = current.node.index();

        if current.node == goal {
            let path = reconstruct_path(graph, &came_from, start, goal);
            debug!("found path from {start} to {goal} with {touched} nodes visited");
            return path;
        }

        // A cheaper route to this node was found after this entry was pushed.
        if current.g_score > g_score[ci] {
            continue;
        }

        for link in &nodes[ci].links {
            let ni = link.target.index();
            let tentative = g_score[ci] + link.cost;

            if tentative < g_score[ni] {
                if g_score[ni] == f32::INFINITY {
                    touched += 1;
                }
                g_score[ni] = tentative;
                came_from[ni] = Some(current.node);
                open.push(OpenEntry {
                    node: link.target,
                    g_score: tentative,
                    f_score: tentative + heuristic(graph, link.target, goal),
                });
            }
        }
    }

    debug!("couldn't find path from {start} to {goal}");
    None
}

/// Walk came-from links back from `goal` and sum the link costs forward.
fn reconstruct_path(
    graph: &NavGraph,
    came_from: &[Option<NodeId>],
    start: NodeId,
    goal: NodeId,
) -> Option<PathResult> {
    let mut nodes = vec![goal];
    let mut current = goal;

    while current != start {
        current = came_from[current.index()]?;
        nodes.push(current);
    }
    nodes.reverse();

    let total_cost = nodes
        .windows(2)
        .map(|pair| graph.link_cost(pair[0], pair[1]).unwrap_or(0.0))
        .sum();

    Some(PathResult {
        nodes,
        total_cost,
        generation: graph.generation(),
    })
}

/// Trace straight down from `position` looking for what it rests on: first
/// with the player box, then with a point if the box finds nothing useful.
pub(crate) fn probe_down(
    world: &dyn NavWorld,
    position: Vec3,
    config: &NavConfig,
    box_is_useful: impl Fn(&TraceResult) -> bool,
) -> TraceResult {
    let end = position - Vec3::new(0.0, 0.0, config.mover_probe_depth);
    let tr = world.trace(position, end, config.player_bounds, Contents::MASK_SOLID);
    if box_is_useful(&tr) {
        tr
    } else {
        world.trace(position, end, Bounds::POINT, Contents::MASK_SOLID)
    }
}

/// Whether a bot may step onto `path[index]` now.
///
/// Nodes without a mover are always enterable. A mover node is enterable
/// when it is the first node, when the previous node also rides a mover
/// (we are already aboard), or when the node's mover is actually beneath it
/// right now. An index past the end is treated as enterable.
pub fn can_path_to(
    graph: &NavGraph,
    world: &dyn NavWorld,
    path: &[NodeId],
    index: usize,
    config: &NavConfig,
) -> bool {
    let Some(&id) = path.get(index) else {
        return true;
    };
    let Ok(node) = graph.node(id) else {
        return true;
    };
    let Some(mover) = node.mover else {
        return true;
    };

    if index == 0 {
        return true;
    }
    if graph.mover(path[index - 1]).ok().flatten().is_some() {
        return true;
    }

    let in_place = |tr: &TraceResult| tr.entity == Some(mover) && !tr.start_solid && !tr.all_solid;
    let tr = probe_down(world, node.position, config, in_place);
    in_place(&tr)
}

/// Whether the link `from -> to` is a drop a bot should walk off rather than
/// run off: it is one-way, descends at least a step, and is horizontally
/// short enough that running would overshoot the landing node.
pub fn should_slow_drop(graph: &NavGraph, from: NodeId, to: NodeId, config: &NavConfig) -> bool {
    if graph.is_linked(to, from) {
        return false;
    }
    let (Ok(a), Ok(b)) = (graph.position(from), graph.position(to)) else {
        return false;
    };
    (b.z - a.z) <= -config.step_height && a.distance_xy(b) < config.step_height * 8.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityId;
    use crate::world::BoxWorld;

    /// A -> B (1), A -> C (1), B -> D (1), C -> D (5).
    fn diamond() -> (NavGraph, [NodeId; 4]) {
        let mut graph = NavGraph::new();
        let a = graph.create_node(Vec3::new(0.0, 0.0, 0.0));
        let b = graph.create_node(Vec3::new(1.0, 0.0, 0.0));
        let c = graph.create_node(Vec3::new(0.0, 1.0, 0.0));
        let d = graph.create_node(Vec3::new(1.0, 1.0, 0.0));
        graph.create_link(a, b, 1.0).unwrap();
        graph.create_link(a, c, 1.0).unwrap();
        graph.create_link(b, d, 1.0).unwrap();
        graph.create_link(c, d, 5.0).unwrap();
        (graph, [a, b, c, d])
    }

    #[test]
    fn diamond_takes_cheap_branch() {
        let (graph, [a, b, _, d]) = diamond();
        let heuristics: [&Heuristic; 3] =
            [&manhattan_heuristic, &euclidean_heuristic, &zero_heuristic];
        for heuristic in heuristics {
            let path = find_path(&graph, a, d, heuristic).unwrap();
            assert_eq!(path.nodes, vec![a, b, d]);
            assert_eq!(path.total_cost, 2.0);
        }
    }

    #[test]
    fn disconnected_returns_none() {
        let mut graph = NavGraph::new();
        let a = graph.create_node(Vec3::ZERO);
        let b = graph.create_node(Vec3::new(100.0, 0.0, 0.0));
        graph.create_link(b, a, 1.0).unwrap();
        assert!(find_path(&graph, a, b, &manhattan_heuristic).is_none());
    }

    #[test]
    fn degenerate_path() {
        let (graph, [a, ..]) = diamond();
        let path = find_path(&graph, a, a, &manhattan_heuristic).unwrap();
        assert_eq!(path.nodes, vec![a]);
        assert_eq!(path.total_cost, 0.0);
    }

    #[test]
    fn out_of_range_endpoints() {
        let (graph, [a, ..]) = diamond();
        assert!(find_path(&graph, a, NodeId(99), &manhattan_heuristic).is_none());
        assert!(find_path(&graph, NodeId(99), a, &manhattan_heuristic).is_none());
    }

    #[test]
    fn respects_link_direction() {
        let (graph, [a, _, _, d]) = diamond();
        assert!(find_path(&graph, d, a, &manhattan_heuristic).is_none());
    }

    #[test]
    fn overestimating_heuristic_still_finds_cheaper_route() {
        // The direct link looks attractive to Manhattan but is expensive.
        let mut graph = NavGraph::new();
        let a = graph.create_node(Vec3::new(0.0, 0.0, 0.0));
        let b = graph.create_node(Vec3::new(50.0, 50.0, 0.0));
        let c = graph.create_node(Vec3::new(100.0, 0.0, 0.0));
        graph.create_default_link(a, b, false).unwrap();
        graph.create_default_link(b, c, false).unwrap();
        graph.create_link(a, c, 500.0).unwrap();
        let path = find_path(&graph, a, c, &euclidean_heuristic).unwrap();
        assert_eq!(path.nodes, vec![a, b, c]);
    }

    #[test]
    fn path_goes_stale_after_deletion() {
        let (mut graph, [a, _, _, d]) = diamond();
        let path = find_path(&graph, a, d, &manhattan_heuristic).unwrap();
        assert!(path.is_current(&graph));
        graph.destroy_node(NodeId(2)).unwrap();
        assert!(!path.is_current(&graph));
    }

    #[test]
    fn slow_drop_needs_one_way_short_descent() {
        let config = NavConfig::default();
        let mut graph = NavGraph::new();
        let ledge = graph.create_node(Vec3::new(0.0, 0.0, 64.0));
        let below = graph.create_node(Vec3::new(40.0, 0.0, 0.0));
        let far = graph.create_node(Vec3::new(400.0, 0.0, 0.0));
        graph.create_default_link(ledge, below, false).unwrap();
        graph.create_default_link(ledge, far, false).unwrap();
        assert!(should_slow_drop(&graph, ledge, below, &config));
        assert!(!should_slow_drop(&graph, ledge, far, &config));

        graph.create_default_link(below, ledge, false).unwrap();
        assert!(!should_slow_drop(&graph, ledge, below, &config));
    }

    #[test]
    fn mover_gating() {
        let config = NavConfig::default();
        let lift = EntityId(3);
        let mut world = BoxWorld::new();
        world.add_solid(Vec3::new(-512.0, -512.0, -16.0), Vec3::new(0.0, 512.0, 0.0));
        world.add_mover(lift, Vec3::new(0.0, -32.0, -16.0), Vec3::new(64.0, 32.0, 0.0));

        let mut graph = NavGraph::new();
        let floor = graph.create_node(Vec3::new(-64.0, 0.0, 24.0));
        let on_lift = graph.create_node(Vec3::new(32.0, 0.0, 24.0));
        graph.create_default_link(floor, on_lift, true).unwrap();
        graph.set_mover(on_lift, Some(lift)).unwrap();

        let path = vec![floor, on_lift];
        assert!(can_path_to(&graph, &world, &path, 0, &config));
        assert!(can_path_to(&graph, &world, &path, 1, &config));
        assert!(can_path_to(&graph, &world, &path, 5, &config));

        // Lift drops out of reach of the probe.
        world.translate_entity(lift, Vec3::new(0.0, 0.0, -400.0));
        assert!(!can_path_to(&graph, &world, &path, 1, &config));
    }
}
