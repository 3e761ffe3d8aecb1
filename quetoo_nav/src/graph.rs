// Navigation graph node store.
//
// The graph is a `Vec<NavNode>` indexed by `NodeId`. Each node owns its
// outgoing `NavLink`s (directed, costed edges). A two-way connection is two
// independent links that may carry different costs; one-way drops and mover
// rides are deliberately asymmetric, so there is no undirected edge type.
//
// Index stability: node ids are dense. Deleting node K removes every link
// touching K (in either direction) and shifts every link target above K
// down by one, so `0..node_count()` stays valid. The cost is a full scan of
// all links per deletion. Callers that cache ids across a deletion can
// detect it through `generation()` (bumped on every deletion) and repair
// cached ids with `remap_after_removal()`.
//
// Out-of-range ids are reported as `NavError::InvalidIndex` rather than
// panicking; live recording drives mutations from player state, which is
// occasionally stale.
//
// See also: `query.rs` for nearest-node lookup, `pathfinding.rs` for A*
// over this graph, `optimize.rs` for chain collapsing and mover attachment,
// `navfile.rs` for the on-disk format.

use crate::error::{NavError, NavResult};
use crate::types::{EntityId, NodeId, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A directed edge to `target`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavLink {
    pub target: NodeId,
    /// Traversal cost, normally the Euclidean distance between endpoints.
    pub cost: f32,
}

/// A point a bot can stand at or pass through.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NavNode {
    pub position: Vec3,
    /// Outgoing links in creation order.
    pub links: SmallVec<[NavLink; 4]>,
    /// Mover this node rides on, if any. Not persisted; re-derived after
    /// every load by `optimize::link_movers`.
    #[serde(skip)]
    pub mover: Option<EntityId>,
}

impl NavNode {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            links: SmallVec::new(),
            mover: None,
        }
    }
}

/// Directionality of the connection between two nodes `a` and `b`.
/// Bit 1 is `a -> b`, bit 2 is `b -> a`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkType(pub u8);

impl LinkType {
    pub const NONE: Self = Self(0);
    pub const FORWARD: Self = Self(1);
    pub const REVERSE: Self = Self(2);
    pub const BOTH: Self = Self(3);

    pub fn forward(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn reverse(self) -> bool {
        self.0 & 2 != 0
    }

    /// Next state in the editor's cycle: none, a->b, b->a, both, none.
    pub fn cycle(self) -> Self {
        Self((self.0 + 1) % 4)
    }
}

/// A unique unordered node pair and the directions linking them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinkPair {
    /// The lower of the two ids.
    pub a: NodeId,
    /// The higher of the two ids.
    pub b: NodeId,
    /// Relative to `a`: forward means `a -> b`.
    pub link_type: LinkType,
}

/// The navigation graph container.
#[derive(Clone, Debug, Default)]
pub struct NavGraph {
    nodes: Vec<NavNode>,
    generation: u64,
}

impl NavGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from already-validated nodes (used by the file loader).
    pub(crate) fn from_nodes(nodes: Vec<NavNode>) -> Self {
        Self {
            nodes,
            generation: 0,
        }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of directed links.
    pub fn link_count(&self) -> usize {
        self.nodes.iter().map(|n| n.links.len()).sum()
    }

    /// Bumped every time a node is removed and indices shift.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop every node (map change).
    pub fn clear(&mut self) {
        self.nodes = Vec::new();
        self.generation += 1;
    }

    pub fn nodes(&self) -> &[NavNode] {
        &self.nodes
    }

    /// Iterate over every valid id in order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    fn check(&self, id: NodeId) -> NavResult<usize> {
        let index = id.index();
        if index < self.nodes.len() {
            Ok(index)
        } else {
            Err(NavError::InvalidIndex {
                index: id,
                count: self.nodes.len(),
            })
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> NavResult<&NavNode> {
        let i = self.check(id)?;
        Ok(&self.nodes[i])
    }

    pub fn position(&self, id: NodeId) -> NavResult<Vec3> {
        Ok(self.node(id)?.position)
    }

    pub fn mover(&self, id: NodeId) -> NavResult<Option<EntityId>> {
        Ok(self.node(id)?.mover)
    }

    pub fn set_mover(&mut self, id: NodeId, mover: Option<EntityId>) -> NavResult<()> {
        let i = self.check(id)?;
        self.nodes[i].mover = mover;
        Ok(())
    }

    /// Append a node with no links. Returns its id.
    pub fn create_node(&mut self, position: Vec3) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NavNode::new(position));
        id
    }

    /// Remove a node, every link touching it, and renumber the rest.
    pub fn destroy_node(&mut self, id: NodeId) -> NavResult<()> {
        let index = self.check(id)?;

        self.nodes.remove(index);
        self.generation += 1;

        if self.nodes.is_empty() {
            self.nodes = Vec::new();
            return Ok(());
        }

        for node in &mut self.nodes {
            node.links.retain(|link| link.target != id);
            for link in node.links.iter_mut() {
                if link.target > id {
                    link.target.0 -= 1;
                }
            }
            if node.links.is_empty() {
                node.links = SmallVec::new();
            }
        }

        Ok(())
    }

    /// Whether a directed link `a -> b` exists.
    pub fn is_linked(&self, a: NodeId, b: NodeId) -> bool {
        self.nodes
            .get(a.index())
            .is_some_and(|n| n.links.iter().any(|l| l.target == b))
    }

    /// Cost of the directed link `a -> b`, if it exists.
    pub fn link_cost(&self, a: NodeId, b: NodeId) -> Option<f32> {
        self.nodes
            .get(a.index())?
            .links
            .iter()
            .find(|l| l.target == b)
            .map(|l| l.cost)
    }

    /// Which directions connect `a` and `b`.
    pub fn link_type(&self, a: NodeId, b: NodeId) -> LinkType {
        let mut bits = 0;
        if self.is_linked(a, b) {
            bits |= 1;
        }
        if self.is_linked(b, a) {
            bits |= 2;
        }
        LinkType(bits)
    }

    /// Snapshot of the targets of `a`'s outgoing links. Safe to hold while
    /// mutating the graph.
    pub fn get_links(&self, a: NodeId) -> NavResult<Vec<NodeId>> {
        Ok(self.node(a)?.links.iter().map(|l| l.target).collect())
    }

    /// Every node with a link pointing at `a`, in ascending order.
    pub fn links_to(&self, a: NodeId) -> Vec<NodeId> {
        self.ids()
            .filter(|&i| self.nodes[i.index()].links.iter().any(|l| l.target == a))
            .collect()
    }

    /// Every node connected to `a` in either direction, ascending, no
    /// duplicates, excluding `a` itself.
    pub fn neighbors(&self, a: NodeId) -> NavResult<SmallVec<[NodeId; 8]>> {
        let mut out: SmallVec<[NodeId; 8]> = self.node(a)?.links.iter().map(|l| l.target).collect();
        out.extend(self.links_to(a));
        out.retain(|n| *n != a);
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }

    /// Add the directed link `a -> b`. Returns `false` (and leaves the
    /// existing cost alone) if the link already exists or `a == b`.
    pub fn create_link(&mut self, a: NodeId, b: NodeId, cost: f32) -> NavResult<bool> {
        let ai = self.check(a)?;
        self.check(b)?;
        if a == b || self.is_linked(a, b) {
            return Ok(false);
        }
        self.nodes[ai].links.push(NavLink { target: b, cost });
        Ok(true)
    }

    /// Euclidean distance between two nodes, the default link cost.
    pub fn default_cost(&self, a: NodeId, b: NodeId) -> NavResult<f32> {
        Ok(self.position(a)?.distance(self.position(b)?))
    }

    /// Add `a -> b` costed by distance, and `b -> a` too when
    /// `bidirectional` is set.
    pub fn create_default_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        bidirectional: bool,
    ) -> NavResult<()> {
        let cost = self.default_cost(a, b)?;
        self.create_link(a, b, cost)?;
        if bidirectional {
            let reverse = self.default_cost(b, a)?;
            self.create_link(b, a, reverse)?;
        }
        Ok(())
    }

    /// Remove the directed link `a -> b` only. Returns whether it existed.
    pub fn destroy_link(&mut self, a: NodeId, b: NodeId) -> NavResult<bool> {
        let ai = self.check(a)?;
        let links = &mut self.nodes[ai].links;
        let Some(pos) = links.iter().position(|l| l.target == b) else {
            return Ok(false);
        };
        links.remove(pos);
        if links.is_empty() {
            *links = SmallVec::new();
        }
        Ok(true)
    }

    /// Sever every outgoing link of `id` together with its reverse link.
    pub fn destroy_links(&mut self, id: NodeId) -> NavResult<()> {
        for target in self.get_links(id)?.into_iter().rev() {
            self.destroy_link(id, target)?;
            self.destroy_link(target, id)?;
        }
        Ok(())
    }

    /// Re-derive the cost of every link that starts or ends at `id`.
    pub fn recalculate_costs(&mut self, id: NodeId) -> NavResult<()> {
        self.check(id)?;
        let positions: Vec<Vec3> = self.nodes.iter().map(|n| n.position).collect();
        for (i, node) in self.nodes.iter_mut().enumerate() {
            for link in node.links.iter_mut() {
                if i == id.index() || link.target == id {
                    link.cost = positions[i].distance(positions[link.target.index()]);
                }
            }
        }
        Ok(())
    }

    /// Move a node in place and recost its links.
    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> NavResult<()> {
        let i = self.check(id)?;
        self.nodes[i].position = position;
        self.recalculate_costs(id)
    }

    /// Translate every node by `delta`. Link costs are unaffected.
    pub fn offset(&mut self, delta: Vec3) {
        for node in &mut self.nodes {
            node.position = node.position + delta;
        }
    }

    /// Unique unordered pairs with their directionality, sorted by pair.
    pub fn link_pairs(&self) -> Vec<LinkPair> {
        let mut pairs: FxHashMap<(NodeId, NodeId), u8> = FxHashMap::default();
        for (i, node) in self.nodes.iter().enumerate() {
            let source = NodeId(i as u32);
            for link in &node.links {
                let (key, bit) = if source < link.target {
                    ((source, link.target), 1)
                } else {
                    ((link.target, source), 2)
                };
                *pairs.entry(key).or_insert(0) |= bit;
            }
        }
        let mut out: Vec<LinkPair> = pairs
            .into_iter()
            .map(|((a, b), bits)| LinkPair {
                a,
                b,
                link_type: LinkType(bits),
            })
            .collect();
        out.sort();
        out
    }
}

/// Where a cached id ends up after `removed` was destroyed. `None` if the
/// cached id was the removed node itself.
pub fn remap_after_removal(id: NodeId, removed: NodeId) -> Option<NodeId> {
    if id == removed {
        None
    } else if id > removed {
        Some(NodeId(id.0 - 1))
    } else {
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph(n: usize) -> NavGraph {
        let mut graph = NavGraph::new();
        for i in 0..n {
            graph.create_node(Vec3::new(i as f32 * 10.0, 0.0, 0.0));
        }
        graph
    }

    fn all_targets(graph: &NavGraph) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        for (i, node) in graph.nodes().iter().enumerate() {
            for l in &node.links {
                out.push((i as u32, l.target.0));
            }
        }
        out
    }

    #[test]
    fn create_node_assigns_sequential_ids() {
        let mut graph = NavGraph::new();
        let a = graph.create_node(Vec3::new(0.0, 0.0, 0.0));
        let b = graph.create_node(Vec3::new(1.0, 0.0, 0.0));
        let c = graph.create_node(Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(a, NodeId(0));
        assert_eq!(b, NodeId(1));
        assert_eq!(c, NodeId(2));
        assert_eq!(graph.node_count(), 3);
        assert!(graph.get_links(a).unwrap().is_empty());
    }

    #[test]
    fn duplicate_link_is_noop_and_keeps_first_cost() {
        let mut graph = line_graph(2);
        assert!(graph.create_link(NodeId(0), NodeId(1), 3.0).unwrap());
        assert!(!graph.create_link(NodeId(0), NodeId(1), 99.0).unwrap());
        assert_eq!(graph.get_links(NodeId(0)).unwrap(), vec![NodeId(1)]);
        assert_eq!(graph.link_cost(NodeId(0), NodeId(1)), Some(3.0));
    }

    #[test]
    fn self_link_is_rejected() {
        let mut graph = line_graph(1);
        assert!(!graph.create_link(NodeId(0), NodeId(0), 1.0).unwrap());
        graph.create_default_link(NodeId(0), NodeId(0), true).unwrap();
        assert_eq!(graph.link_count(), 0);
        assert!(!graph.is_linked(NodeId(0), NodeId(0)));
    }

    #[test]
    fn offset_moves_every_node_and_keeps_costs() {
        let mut graph = line_graph(3);
        graph.create_default_link(NodeId(0), NodeId(1), true).unwrap();
        graph.create_link(NodeId(1), NodeId(2), 7.5).unwrap();
        let generation = graph.generation();

        graph.offset(Vec3::new(1.0, -2.0, 16.0));

        assert_eq!(graph.position(NodeId(0)).unwrap(), Vec3::new(1.0, -2.0, 16.0));
        assert_eq!(graph.position(NodeId(2)).unwrap(), Vec3::new(21.0, -2.0, 16.0));
        assert_eq!(graph.link_cost(NodeId(0), NodeId(1)), Some(10.0));
        assert_eq!(graph.link_cost(NodeId(1), NodeId(2)), Some(7.5));
        assert_eq!(graph.generation(), generation);
    }

    #[test]
    fn default_link_bidirectional_uses_distance() {
        let mut graph = line_graph(2);
        graph.create_default_link(NodeId(0), NodeId(1), true).unwrap();
        assert_eq!(graph.link_cost(NodeId(0), NodeId(1)), Some(10.0));
        assert_eq!(graph.link_cost(NodeId(1), NodeId(0)), Some(10.0));
        assert_eq!(graph.link_type(NodeId(0), NodeId(1)), LinkType::BOTH);
    }

    #[test]
    fn destroy_link_is_one_directional() {
        let mut graph = line_graph(2);
        graph.create_default_link(NodeId(0), NodeId(1), true).unwrap();
        assert!(graph.destroy_link(NodeId(0), NodeId(1)).unwrap());
        assert!(!graph.is_linked(NodeId(0), NodeId(1)));
        assert!(graph.is_linked(NodeId(1), NodeId(0)));
        assert!(!graph.destroy_link(NodeId(0), NodeId(1)).unwrap());
    }

    #[test]
    fn destroy_node_renumbers_and_severs() {
        let mut graph = line_graph(5);
        graph.create_default_link(NodeId(0), NodeId(1), true).unwrap();
        graph.create_default_link(NodeId(1), NodeId(2), true).unwrap();
        graph.create_default_link(NodeId(2), NodeId(3), false).unwrap();
        graph.create_default_link(NodeId(4), NodeId(2), false).unwrap();
        graph.create_default_link(NodeId(0), NodeId(4), false).unwrap();
        let before = all_targets(&graph);
        let generation = graph.generation();

        graph.destroy_node(NodeId(2)).unwrap();

        assert_eq!(graph.node_count(), 4);
        assert!(graph.generation() > generation);
        let expected: Vec<(u32, u32)> = before
            .into_iter()
            .filter(|&(s, t)| s != 2 && t != 2)
            .map(|(s, t)| (if s > 2 { s - 1 } else { s }, if t > 2 { t - 1 } else { t }))
            .collect();
        assert_eq!(all_targets(&graph), expected);
        // Old node 4 is now node 3 and its one-way link to the removed node is gone.
        assert!(graph.get_links(NodeId(3)).unwrap().is_empty());
        assert_eq!(graph.get_links(NodeId(0)).unwrap(), vec![NodeId(1), NodeId(3)]);
    }

    #[test]
    fn destroying_last_node_empties_store() {
        let mut graph = line_graph(1);
        graph.destroy_node(NodeId(0)).unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.create_node(Vec3::ZERO), NodeId(0));
    }

    #[test]
    fn invalid_index_is_reported() {
        let mut graph = line_graph(2);
        assert!(!graph.is_linked(NodeId(7), NodeId(0)));
        assert_eq!(graph.link_cost(NodeId(7), NodeId(0)), None);
        assert!(!graph.contains(NodeId(2)));

        let err = graph.destroy_node(NodeId(5)).unwrap_err();
        assert!(matches!(err, NavError::InvalidIndex { count: 2, .. }));
        assert!(graph.create_link(NodeId(0), NodeId(9), 1.0).is_err());
        assert!(graph.position(NodeId(2)).is_err());
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn recalculate_costs_after_move() {
        let mut graph = line_graph(3);
        graph.create_default_link(NodeId(0), NodeId(1), true).unwrap();
        graph.create_default_link(NodeId(1), NodeId(2), false).unwrap();
        graph.set_position(NodeId(1), Vec3::new(0.0, 30.0, 0.0)).unwrap();
        assert_eq!(graph.link_cost(NodeId(0), NodeId(1)), Some(30.0));
        assert_eq!(graph.link_cost(NodeId(1), NodeId(0)), Some(30.0));
        let expected = Vec3::new(0.0, 30.0, 0.0).distance(Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(graph.link_cost(NodeId(1), NodeId(2)), Some(expected));
    }

    #[test]
    fn link_type_cycle() {
        assert_eq!(LinkType::NONE.cycle(), LinkType::FORWARD);
        assert_eq!(LinkType::FORWARD.cycle(), LinkType::REVERSE);
        assert_eq!(LinkType::REVERSE.cycle(), LinkType::BOTH);
        assert_eq!(LinkType::BOTH.cycle(), LinkType::NONE);
    }

    #[test]
    fn link_pairs_merge_directions() {
        let mut graph = line_graph(3);
        graph.create_default_link(NodeId(0), NodeId(1), true).unwrap();
        graph.create_default_link(NodeId(2), NodeId(1), false).unwrap();
        let pairs = graph.link_pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].link_type, LinkType::BOTH);
        assert_eq!((pairs[1].a, pairs[1].b), (NodeId(1), NodeId(2)));
        assert_eq!(pairs[1].link_type, LinkType::REVERSE);
    }

    #[test]
    fn neighbors_include_incoming() {
        let mut graph = line_graph(3);
        graph.create_default_link(NodeId(0), NodeId(1), false).unwrap();
        graph.create_default_link(NodeId(1), NodeId(2), true).unwrap();
        assert_eq!(graph.neighbors(NodeId(1)).unwrap().as_slice(), &[NodeId(0), NodeId(2)]);
        assert_eq!(graph.links_to(NodeId(1)), vec![NodeId(0), NodeId(2)]);
    }

    #[test]
    fn remap_helper() {
        assert_eq!(remap_after_removal(NodeId(3), NodeId(3)), None);
        assert_eq!(remap_after_removal(NodeId(4), NodeId(3)), Some(NodeId(3)));
        assert_eq!(remap_after_removal(NodeId(1), NodeId(3)), Some(NodeId(1)));
    }
}
