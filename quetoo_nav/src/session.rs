// Per-map navigation context.
//
// `NavSession` owns everything the navigation graph needs for one loaded
// map: the graph, the recorder, the config and the authoring mode. The host
// creates one on map load and drops it (or calls `clear`) on unload; there
// is no global state.
//
// Lifecycle:
//
// 1. `load_map` reads `ai/<map>.nav`. A missing file is normal (the map was
//    never noded) and a malformed one is logged and ignored; both leave an
//    empty graph so play continues with dumb bots.
// 2. The host spawns entities. Nothing here depends on that, but movers
//    must exist before step 3.
// 3. `nodes_ready` reports what was added since load, attaches nodes to
//    movers, runs the optimizer and checks the result: nodes stuck inside
//    solid always, and in dev mode items no node can reach.
// 4. Each player frame in dev mode goes through `roam`. `offset_nodes`
//    shifts the whole graph when map geometry moved under it.
// 5. `save` writes the graph back, only in authoring mode, and repeats the
//    check on what was written.
//
// Status messages use `tracing` at info level and problems at warn level,
// matching what a server operator would want in the console.

use crate::config::{DevMode, NavConfig};
use crate::error::{NavError, NavResult};
use crate::graph::NavGraph;
use crate::navfile::{self, nav_path};
use crate::optimize::{link_movers, optimize_nodes};
use crate::pathfinding::{PathResult, find_path, manhattan_heuristic};
use crate::query::find_closest;
use crate::recorder::{PlayerSample, Recorder, RoamReport};
use crate::storage::NavStorage;
use crate::types::{Contents, NodeId, Vec3};
use crate::world::NavWorld;
use tracing::{debug, info, warn};

/// What `load_map` found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { nodes: usize, links: usize },
    /// No `.nav` file for this map.
    Missing,
    /// A file existed but could not be used.
    Rejected(String),
}

/// An item spawn point to check for node coverage.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemSpot {
    pub class_name: String,
    pub origin: Vec3,
}

/// Problems found in the graph by `check_nodes`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeCheck {
    /// Items with no visible node nearby (only checked in dev mode).
    pub unreachable_items: Vec<ItemSpot>,
    pub nodes_in_solid: Vec<NodeId>,
}

impl NodeCheck {
    pub fn is_clean(&self) -> bool {
        self.unreachable_items.is_empty() && self.nodes_in_solid.is_empty()
    }
}

/// Summary of the post-load passes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadyReport {
    /// Nodes and links present now that were not in the file.
    pub added_nodes: usize,
    pub added_links: usize,
    pub linked_movers: u32,
    pub optimized: usize,
    pub check: NodeCheck,
}

/// Result of a successful `save`.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveReport {
    /// Size of the written file.
    pub bytes: usize,
    pub check: NodeCheck,
}

#[derive(Debug)]
pub struct NavSession {
    map: String,
    config: NavConfig,
    dev_mode: DevMode,
    graph: NavGraph,
    recorder: Recorder,
    file_nodes: usize,
    file_links: usize,
    test_path: Option<PathResult>,
}

impl NavSession {
    pub fn new(map: impl Into<String>, config: NavConfig, dev_mode: DevMode) -> Self {
        Self {
            map: map.into(),
            config,
            dev_mode,
            graph: NavGraph::new(),
            recorder: Recorder::new(),
            file_nodes: 0,
            file_links: 0,
            test_path: None,
        }
    }

    pub fn map(&self) -> &str {
        &self.map
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn dev_mode(&self) -> DevMode {
        self.dev_mode
    }

    pub fn set_dev_mode(&mut self, dev_mode: DevMode) {
        self.dev_mode = dev_mode;
    }

    pub fn graph(&self) -> &NavGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut NavGraph {
        &mut self.graph
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Node and link counts as loaded from the file.
    pub fn file_counts(&self) -> (usize, usize) {
        (self.file_nodes, self.file_links)
    }

    /// Drop all navigation state (map unload).
    pub fn clear(&mut self) {
        self.graph.clear();
        self.recorder.reset_for_map();
        self.file_nodes = 0;
        self.file_links = 0;
        self.test_path = None;
    }

    /// Load this map's `.nav` file. Only storage failures on an existing
    /// file are errors; missing and malformed files leave an empty graph.
    pub fn load_map(&mut self, storage: &dyn NavStorage) -> NavResult<LoadOutcome> {
        self.clear();
        let path = nav_path(&self.map);

        if !storage.exists(&path) {
            info!(
                "No navigation file exists for {}; bots will be dumb! \
                 Use ai_node_dev to set up nodes.",
                self.map
            );
            return Ok(LoadOutcome::Missing);
        }

        let bytes = storage.read(&path)?;
        let graph = match navfile::read_graph(&mut bytes.as_slice()) {
            Ok(graph) => graph,
            Err(err) => {
                warn!("{path}: {err}");
                return Ok(LoadOutcome::Rejected(err.to_string()));
            }
        };

        self.file_nodes = graph.node_count();
        self.file_links = graph.link_count();
        self.graph = graph;
        info!("Loaded {} nodes with {} total links.", self.file_nodes, self.file_links);

        Ok(LoadOutcome::Loaded {
            nodes: self.file_nodes,
            links: self.file_links,
        })
    }

    /// Post-load passes; call once entities (movers, items) exist.
    pub fn nodes_ready(
        &mut self,
        world: &dyn NavWorld,
        items: &[ItemSpot],
    ) -> NavResult<ReadyReport> {
        let mut report = ReadyReport::default();
        if self.graph.is_empty() {
            return Ok(report);
        }

        report.added_nodes = self.graph.node_count().saturating_sub(self.file_nodes);
        report.added_links = self.graph.link_count().saturating_sub(self.file_links);
        info!(
            "Game loaded {} additional nodes with {} new links.",
            report.added_nodes, report.added_links
        );

        report.linked_movers = link_movers(&mut self.graph, world, &self.config)?;
        info!("Linked {} movers to navigation graph.", report.linked_movers);

        let optimized = optimize_nodes(&mut self.graph, &self.config)?;
        self.recorder.forget_removed(&optimized.removed);
        self.test_path = None;
        report.optimized = optimized.count();
        info!("{} nodes optimized", report.optimized);

        report.check = self.check_nodes(world, items);
        Ok(report)
    }

    /// Item coverage (dev mode only) and nodes inside solid.
    pub fn check_nodes(&self, world: &dyn NavWorld, items: &[ItemSpot]) -> NodeCheck {
        let unreachable_items = if self.dev_mode.is_enabled() {
            self.check_items(world, items)
        } else {
            Vec::new()
        };
        NodeCheck {
            unreachable_items,
            nodes_in_solid: self.nodes_in_solid(world),
        }
    }

    /// Nodes whose position is inside solid. Each one is logged as a
    /// warning.
    pub fn nodes_in_solid(&self, world: &dyn NavWorld) -> Vec<NodeId> {
        self.graph
            .ids()
            .zip(self.graph.nodes())
            .filter(|(id, node)| {
                let solid = world.point_contents(node.position).intersects(Contents::MASK_SOLID);
                if solid {
                    warn!("Node {id} @ {} is inside of solid", node.position);
                }
                solid
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Items with no visible node within `item_check_radius`. Each one is
    /// logged as a warning.
    pub fn check_items(&self, world: &dyn NavWorld, items: &[ItemSpot]) -> Vec<ItemSpot> {
        items
            .iter()
            .filter(|item| {
                let (graph, config) = (&self.graph, &self.config);
                let found =
                    find_closest(graph, item.origin, config.item_check_radius, Some(world), config);
                if found.is_none() {
                    warn!(
                        "Entity {} @ {} appears to be unreachable by nodes",
                        item.class_name, item.origin
                    );
                }
                found.is_none()
            })
            .cloned()
            .collect()
    }

    /// Write the graph to this map's `.nav` file, then check what was
    /// written.
    ///
    /// Refused unless authoring is enabled, and when there is nothing to
    /// write. The file is encoded fully in memory first and handed to
    /// storage in a single write.
    pub fn save(
        &self,
        storage: &dyn NavStorage,
        world: &dyn NavWorld,
        items: &[ItemSpot],
    ) -> NavResult<SaveReport> {
        if self.dev_mode != DevMode::Authoring {
            warn!("Saving nodes only works with ai_node_dev set to 1.");
            return Err(NavError::SaveNotPermitted);
        }
        if self.graph.is_empty() {
            warn!("No nodes to write.");
            return Err(NavError::NothingToSave);
        }

        let path = nav_path(&self.map);
        let bytes = navfile::encode(&self.graph)?;
        storage.write(&path, &bytes)?;
        info!(
            "Saved {} nodes with {} links to {path}.",
            self.graph.node_count(),
            self.graph.link_count()
        );
        Ok(SaveReport {
            bytes: bytes.len(),
            check: self.check_nodes(world, items),
        })
    }

    /// Translate the whole graph by `delta`.
    pub fn offset_nodes(&mut self, delta: Vec3) {
        self.graph.offset(delta);
        self.test_path = None;
        info!("Offset {} nodes by {delta}.", self.graph.node_count());
    }

    /// Translate the whole graph so the last visited node lands where the
    /// player last stood. Returns the applied delta, `None` without a last
    /// node.
    pub fn offset_to_player(&mut self) -> NavResult<Option<Vec3>> {
        let Some(last) = self.recorder.last_nodes()[0] else {
            return Ok(None);
        };
        let delta = self.recorder.position() - self.graph.position(last)?;
        self.offset_nodes(delta);
        Ok(Some(delta))
    }

    /// Feed one player frame to the recorder.
    pub fn roam(&mut self, world: &dyn NavWorld, sample: &PlayerSample) -> NavResult<RoamReport> {
        let generation = self.graph.generation();
        let report = self
            .recorder
            .roam(&mut self.graph, world, &self.config, self.dev_mode, sample)?;
        if self.graph.generation() != generation {
            self.test_path = None;
        }
        Ok(report)
    }

    /// Path from the previous to the last visited node, for visualizing
    /// link directions while authoring. `None` outside dev mode.
    pub fn test_path(&mut self) -> Option<&PathResult> {
        if !self.dev_mode.is_enabled() {
            return None;
        }
        let [Some(to), Some(from)] = self.recorder.last_nodes() else {
            self.test_path = None;
            return None;
        };
        self.test_path = find_path(&self.graph, from, to, &manhattan_heuristic);
        if self.test_path.is_none() {
            debug!("no test path from {from} to {to}");
        }
        self.test_path.as_ref()
    }
}
