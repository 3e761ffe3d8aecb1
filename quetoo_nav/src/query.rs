// Nearest-node lookup.
//
// A linear scan over every node. Graphs are a few hundred to a few thousand
// nodes and lookups happen a handful of times per bot per tick, so there is
// no spatial index. Two filters apply before distance:
//
// - Height: nodes more than two step heights above or below the query point
//   are skipped, so a bot standing under a balcony does not snap to a node
//   it cannot walk to.
// - Visibility (optional): a point trace from the query point to the node
//   must be clear of solids and windows. Traces are expensive, so this is
//   only evaluated for a node that would otherwise become the new best.
//
// Ties keep the earlier node.

use crate::config::NavConfig;
use crate::graph::NavGraph;
use crate::types::{Bounds, Contents, NodeId, Vec3};
use crate::world::NavWorld;

/// Line of sight from `from` to `to`, blocked by solids and windows.
pub fn is_visible(world: &dyn NavWorld, from: Vec3, to: Vec3) -> bool {
    world
        .trace(from, to, Bounds::POINT, Contents::SOLID | Contents::WINDOW)
        .fraction
        >= 1.0
}

/// The nearest node to `position` strictly within `max_distance`.
///
/// When `visibility` is given, only nodes in line of sight of `position`
/// qualify.
pub fn find_closest(
    graph: &NavGraph,
    position: Vec3,
    max_distance: f32,
    visibility: Option<&dyn NavWorld>,
    config: &NavConfig,
) -> Option<NodeId> {
    let max_squared = max_distance * max_distance;
    let max_height = config.step_height * 2.0;

    let mut closest: Option<(NodeId, f32)> = None;

    for (i, node) in graph.nodes().iter().enumerate() {
        if (position.z - node.position.z).abs() > max_height {
            continue;
        }

        let dist = position.distance_squared(node.position);
        if dist >= max_squared {
            continue;
        }
        if closest.is_some_and(|(_, best)| dist >= best) {
            continue;
        }
        if let Some(world) = visibility {
            if !is_visible(world, position, node.position) {
                continue;
            }
        }

        closest = Some((NodeId(i as u32), dist));
    }

    closest.map(|(id, _)| id)
}
