// Post-load graph passes: chain collapsing and mover attachment.
//
// Recording drops a node every `walking_distance` units, so a long straight
// corridor becomes a chain of nodes each connected only to its two
// neighbors. `optimize_nodes` removes interior chain nodes whose neighbors
// line up, replacing the two links through the node with one direct link.
// A node qualifies when:
//
// - it has one or two outgoing links,
// - exactly two distinct nodes are connected to it (outgoing or incoming),
// - the directions through it agree: `link_type(n0, node)` equals
//   `link_type(node, n1)`, so a one-way chain stays one-way,
// - the turn through it is shallow: the dot product of the normalized
//   `n0 -> node` and `node -> n1` directions is at least `collinear_dot`.
//
// Passes repeat until one removes nothing, so the result is a fixed point
// and running the optimizer again is a no-op. Neighbors are taken in
// ascending index order to keep the outcome deterministic.
//
// `link_movers` re-derives which nodes ride on doors, lifts and trains. The
// mover is not stored in the `.nav` file because entity numbers change
// between map loads. A node directly above a mover brush is attached to it;
// nodes dropped in mid-air while riding that mover (at most one outgoing
// link, nothing solid just beneath the feet) are then attached by flood
// fill.
//
// See also: `session.rs` (`nodes_ready`) which runs both passes after load,
// `pathfinding::can_path_to` which consults the attached movers.

use crate::config::NavConfig;
use crate::error::NavResult;
use crate::graph::{LinkType, NavGraph};
use crate::pathfinding::probe_down;
use crate::types::{Contents, EntityId, NodeId, Vec3};
use crate::world::NavWorld;
use tracing::debug;

/// What an optimizer run removed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimizeReport {
    /// Removed node ids in deletion order. Each id is relative to the graph
    /// as it was just before that deletion.
    pub removed: Vec<NodeId>,
    /// Number of passes over the graph, including the final empty one.
    pub passes: u32,
}

impl OptimizeReport {
    pub fn count(&self) -> usize {
        self.removed.len()
    }
}

/// The two neighbors and shared link type of a collapsible chain node.
fn collapsible(
    graph: &NavGraph,
    id: NodeId,
    config: &NavConfig,
) -> NavResult<Option<(NodeId, NodeId, LinkType)>> {
    let outgoing = graph.node(id)?.links.len();
    if outgoing == 0 || outgoing > 2 {
        return Ok(None);
    }

    let neighbors = graph.neighbors(id)?;
    let [n0, n1] = neighbors.as_slice() else {
        return Ok(None);
    };
    let (n0, n1) = (*n0, *n1);

    let link_type = graph.link_type(n0, id);
    if link_type != graph.link_type(id, n1) {
        return Ok(None);
    }

    let here = graph.position(id)?;
    let dir_a = (graph.position(n0)? - here).normalize();
    let dir_b = (here - graph.position(n1)?).normalize();
    if dir_a.dot(dir_b) < config.collinear_dot {
        return Ok(None);
    }

    Ok(Some((n0, n1, link_type)))
}

/// Collapse straight chains until nothing more can be removed.
pub fn optimize_nodes(graph: &mut NavGraph, config: &NavConfig) -> NavResult<OptimizeReport> {
    let mut report = OptimizeReport::default();

    loop {
        report.passes += 1;
        let mut count = 0;
        let mut i = 0;

        while i < graph.node_count() {
            let id = NodeId(i as u32);
            let Some((n0, n1, link_type)) = collapsible(graph, id, config)? else {
                i += 1;
                continue;
            };

            graph.destroy_node(id)?;
            let n0 = if n0 > id { NodeId(n0.0 - 1) } else { n0 };
            let n1 = if n1 > id { NodeId(n1.0 - 1) } else { n1 };

            if link_type.forward() {
                graph.create_default_link(n0, n1, false)?;
            }
            if link_type.reverse() {
                graph.create_default_link(n1, n0, false)?;
            }

            debug!("collapsed {id} between {n0} and {n1}");
            report.removed.push(id);
            count += 1;
            // Index `i` now holds the next node; look at it without advancing.
        }

        if count == 0 {
            break;
        }
    }

    Ok(report)
}

/// Attach nodes to the movers they stand on. Returns how many attachments
/// were made, including flood-filled ones.
pub fn link_movers(
    graph: &mut NavGraph,
    world: &dyn NavWorld,
    config: &NavConfig,
) -> NavResult<u32> {
    let mut linked = 0;

    for id in graph.ids() {
        let position = graph.position(id)?;
        let tr = probe_down(world, position, config, |tr| tr.hit_mover().is_some());
        let Some(mover) = tr.hit_mover() else {
            continue;
        };

        graph.set_mover(id, Some(mover))?;
        linked += 1;
        linked += flood_fill_mover(graph, world, config, id, mover)?;
    }

    Ok(linked)
}

/// Spread `mover` from `seed` to floating nodes reachable through it.
fn flood_fill_mover(
    graph: &mut NavGraph,
    world: &dyn NavWorld,
    config: &NavConfig,
    seed: NodeId,
    mover: EntityId,
) -> NavResult<u32> {
    // Half-size box with its bottom level with the player's feet.
    let probe = config.player_bounds.scale(0.5);
    let feet = Vec3::new(0.0, 0.0, config.player_bounds.mins.z - probe.mins.z);
    let drop = Vec3::new(0.0, 0.0, config.ground_dist * 2.0);

    let mut count = 0;
    let mut stack: Vec<NodeId> = graph.neighbors(seed)?.into_iter().collect();

    while let Some(check) = stack.pop() {
        let node = graph.node(check)?;

        // Riders only ever have the one link to where the mover took them.
        if node.links.len() > 1 || node.mover.is_some() {
            continue;
        }

        let start = node.position + feet;
        let tr = world.trace(start, start - drop, probe, Contents::MASK_SOLID);
        if tr.fraction < 1.0 {
            continue;
        }

        graph.set_mover(check, Some(mover))?;
        count += 1;
        stack.extend(graph.neighbors(check)?);
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::{find_path, zero_heuristic};
    use crate::world::BoxWorld;

    fn chain(points: &[Vec3], bidirectional: bool) -> NavGraph {
        let mut graph = NavGraph::new();
        for p in points {
            graph.create_node(*p);
        }
        for i in 1..points.len() {
            graph
                .create_default_link(NodeId(i as u32 - 1), NodeId(i as u32), bidirectional)
                .unwrap();
        }
        graph
    }

    fn straight(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f32 * 128.0, 0.0, 0.0)).collect()
    }

    #[test]
    fn straight_chain_collapses_to_endpoints() {
        let config = NavConfig::default();
        let mut graph = chain(&straight(5), true);
        let report = optimize_nodes(&mut graph, &config).unwrap();
        assert_eq!(report.count(), 3);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.link_type(NodeId(0), NodeId(1)), LinkType::BOTH);
        assert_eq!(graph.link_cost(NodeId(0), NodeId(1)), Some(512.0));
    }

    #[test]
    fn one_way_chain_stays_one_way() {
        let config = NavConfig::default();
        let mut graph = chain(&straight(4), false);
        optimize_nodes(&mut graph, &config).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(graph.is_linked(NodeId(0), NodeId(1)));
        assert!(!graph.is_linked(NodeId(1), NodeId(0)));
    }

    #[test]
    fn corner_is_kept() {
        let config = NavConfig::default();
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(128.0, 0.0, 0.0),
            Vec3::new(128.0, 128.0, 0.0),
        ];
        let mut graph = chain(&points, true);
        let report = optimize_nodes(&mut graph, &config).unwrap();
        assert_eq!(report.count(), 0);
        assert_eq!(report.passes, 1);
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn mixed_directions_are_kept() {
        let config = NavConfig::default();
        let mut graph = chain(&straight(3), false);
        graph.create_default_link(NodeId(2), NodeId(1), false).unwrap();
        // 0 -> 1 is forward only, 1 <-> 2 is both ways.
        let report = optimize_nodes(&mut graph, &config).unwrap();
        assert_eq!(report.count(), 0);
    }

    #[test]
    fn junction_is_kept() {
        let config = NavConfig::default();
        let mut graph = chain(&straight(3), true);
        let side = graph.create_node(Vec3::new(128.0, 128.0, 0.0));
        graph.create_default_link(NodeId(1), side, true).unwrap();
        optimize_nodes(&mut graph, &config).unwrap();
        assert!(graph.contains(side));
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn optimizer_is_idempotent() {
        let config = NavConfig::default();
        let mut points = straight(6);
        points.push(Vec3::new(640.0, 256.0, 0.0));
        points.push(Vec3::new(640.0, 384.0, 0.0));
        let mut graph = chain(&points, true);
        optimize_nodes(&mut graph, &config).unwrap();
        let snapshot = graph.link_pairs();
        let count = graph.node_count();

        let again = optimize_nodes(&mut graph, &config).unwrap();
        assert_eq!(again.count(), 0);
        assert_eq!(graph.node_count(), count);
        assert_eq!(graph.link_pairs(), snapshot);
    }

    #[test]
    fn optimizer_preserves_reachability_and_cost() {
        let config = NavConfig::default();
        let mut points = straight(5);
        points.push(Vec3::new(512.0, 200.0, 0.0));
        let mut graph = chain(&points, true);
        let first = NodeId(0);
        let last = NodeId(points.len() as u32 - 1);
        let before = find_path(&graph, first, last, &zero_heuristic).unwrap();

        optimize_nodes(&mut graph, &config).unwrap();

        let last = NodeId(graph.node_count() as u32 - 1);
        assert_eq!(graph.position(last).unwrap(), Vec3::new(512.0, 200.0, 0.0));
        let after = find_path(&graph, first, last, &zero_heuristic).unwrap();
        assert!(after.total_cost <= before.total_cost + 1e-3);
        let back = find_path(&graph, last, first, &zero_heuristic).unwrap();
        assert!(back.total_cost <= before.total_cost + 1e-3);
    }

    #[test]
    fn movers_attach_and_flood_fill_riders() {
        let config = NavConfig::default();
        let lift = EntityId(4);
        let mut world = BoxWorld::new();
        world.add_solid(Vec3::new(-512.0, -512.0, -16.0), Vec3::new(0.0, 512.0, 0.0));
        world.add_mover(lift, Vec3::new(0.0, -64.0, -16.0), Vec3::new(128.0, 64.0, 0.0));
        world.add_solid(Vec3::new(0.0, -64.0, 384.0), Vec3::new(128.0, 64.0, 400.0));

        let mut graph = NavGraph::new();
        let floor = graph.create_node(Vec3::new(-128.0, 0.0, 24.0));
        let on_lift = graph.create_node(Vec3::new(64.0, 0.0, 24.0));
        // Dropped while riding the lift up, well above the probe depth.
        let riding = graph.create_node(Vec3::new(64.0, 0.0, 224.0));
        // Standing on the upper landing.
        let top = graph.create_node(Vec3::new(64.0, 0.0, 424.0));
        graph.create_default_link(floor, on_lift, true).unwrap();
        graph.create_default_link(on_lift, riding, false).unwrap();
        graph.create_default_link(riding, top, false).unwrap();

        let linked = link_movers(&mut graph, &world, &config).unwrap();

        assert_eq!(graph.mover(floor).unwrap(), None);
        assert_eq!(graph.mover(on_lift).unwrap(), Some(lift));
        assert_eq!(graph.mover(riding).unwrap(), Some(lift));
        assert_eq!(graph.mover(top).unwrap(), None);
        assert_eq!(linked, 2);
    }
}
