// Live graph authoring from player movement.
//
// With authoring enabled, a human player walks the map and the recorder
// turns their movement into nodes and links, one `roam` call per player
// frame. It is a two-state machine:
//
// - **Awaiting landing**: the player left the ground (jump, fall, jump pad,
//   teleport). Nothing is recorded until they are on a floor or in liquid,
//   at which point the landing spot is found or created and linked from the
//   takeoff node. The link is one-way (a drop can't be walked back up)
//   unless the takeoff was a water jump, or the jump/swim ended roughly
//   level with where it started.
// - **Walking**: nodes are dropped every `walking_distance` and linked both
//   ways; touching an existing node links to it; stepping on or off a mover
//   drops a one-way node. Leaving the floor drops a node at the edge and
//   switches to awaiting landing.
//
// The author can also edit the last visited nodes with latched buttons:
// ATTACK moves the last node to the player, HOOK deletes it, SCORE cycles
// the link direction between the last two nodes.
//
// In observe mode the recorder still tracks which node the player is at
// (for test paths) but never mutates the graph. Every mutation goes through
// `NavGraph`, so the store's invariants hold regardless of input.
//
// The recorder caches the last two visited node ids. Its own deletions
// clear them; deletions made elsewhere (the optimizer) must be reported
// through `forget_removed`.
//
// See also: `session.rs` which owns the recorder per map, `stuck.rs` whose
// advice is reported with each frame.

use crate::config::{DevMode, NavConfig};
use crate::error::NavResult;
use crate::graph::{LinkType, NavGraph, remap_after_removal};
use crate::query::find_closest;
use crate::stuck::{MoveSample, StuckAdvice, StuckDetector};
use crate::types::{Bounds, Buttons, Contents, EntityId, NodeId, Vec3};
use crate::world::NavWorld;
use tracing::debug;

/// Farthest coordinate a map can use. The position baseline starts here so
/// that the first sample always reads as a teleport.
pub const WORLD_EXTENT: f32 = 32768.0;

/// One frame of player state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerSample {
    pub origin: Vec3,
    pub velocity: Vec3,
    /// Player box relative to `origin`.
    pub bounds: Bounds,
    pub buttons: Buttons,
    /// Regular walking physics (not noclip, spectator, dead or frozen).
    pub normal_movement: bool,
    /// What the player stands on, if anything.
    pub ground_entity: Option<EntityId>,
    /// Frame length in milliseconds.
    pub msec: u32,
}

impl PlayerSample {
    /// A player standing still at `origin` on the world.
    pub fn standing(origin: Vec3, config: &NavConfig) -> Self {
        Self {
            origin,
            velocity: Vec3::ZERO,
            bounds: config.player_bounds,
            buttons: Buttons::NONE,
            normal_movement: true,
            ground_entity: Some(EntityId::WORLD),
            msec: 25,
        }
    }

    fn on_mover(&self) -> bool {
        self.ground_entity.is_some_and(|e| !e.is_world())
    }
}

/// Something the recorder did to the graph or its own state.
#[derive(Clone, Debug, PartialEq)]
pub enum RoamEvent {
    /// Authoring switched on or off (mode change, noclip toggle).
    RecordingChanged(bool),
    NodeCreated(NodeId),
    Linked {
        from: NodeId,
        to: NodeId,
        bidirectional: bool,
    },
    /// Touched down after being airborne.
    Landed(NodeId),
    /// Left the floor; awaiting landing.
    LeftGround { jumping: bool },
    /// Moved too far in one frame; chain broken.
    Teleported,
    NodeMoved(NodeId),
    NodeDestroyed(NodeId),
    LinkTypeChanged {
        a: NodeId,
        b: NodeId,
        link_type: LinkType,
    },
    /// Now at this existing node (observe mode tracks this too).
    Visited(NodeId),
}

/// Result of one `roam` frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoamReport {
    pub events: Vec<RoamEvent>,
    pub stuck: StuckAdvice,
}

#[derive(Clone, Debug)]
pub struct Recorder {
    position: Vec3,
    last_nodes: [Option<NodeId>; 2],
    await_landing: bool,
    is_jumping: bool,
    is_water_jump: bool,
    on_mover: bool,
    latched_buttons: Buttons,
    old_buttons: Buttons,
    buttons: Buttons,
    recording: bool,
    stuck: StuckDetector,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            position: Vec3::new(WORLD_EXTENT, WORLD_EXTENT, WORLD_EXTENT),
            last_nodes: [None, None],
            await_landing: true,
            is_jumping: false,
            is_water_jump: false,
            on_mover: false,
            latched_buttons: Buttons::NONE,
            old_buttons: Buttons::NONE,
            buttons: Buttons::NONE,
            recording: false,
            stuck: StuckDetector::new(),
        }
    }

    /// Prepare for a freshly loaded map.
    pub fn reset_for_map(&mut self) {
        self.position = Vec3::new(WORLD_EXTENT, WORLD_EXTENT, WORLD_EXTENT);
        self.last_nodes = [None, None];
        self.await_landing = true;
        self.is_jumping = false;
        self.is_water_jump = false;
        self.stuck.reset();
    }

    /// The most recent and the previous visited node.
    pub fn last_nodes(&self) -> [Option<NodeId>; 2] {
        self.last_nodes
    }

    /// Player position as of the last frame.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn is_awaiting_landing(&self) -> bool {
        self.await_landing
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Update cached node ids after `removed` were destroyed, in order.
    pub fn forget_removed(&mut self, removed: &[NodeId]) {
        for &gone in removed {
            for slot in &mut self.last_nodes {
                *slot = slot.and_then(|id| remap_after_removal(id, gone));
            }
        }
    }

    fn shift(&mut self, id: NodeId) {
        self.last_nodes[1] = self.last_nodes[0];
        self.last_nodes[0] = Some(id);
    }

    /// Nearest visible node within `radius`, or a new one at `origin`.
    fn find_or_create(
        graph: &mut NavGraph,
        world: &dyn NavWorld,
        config: &NavConfig,
        origin: Vec3,
        radius: f32,
        events: &mut Vec<RoamEvent>,
    ) -> NodeId {
        if let Some(id) = find_closest(graph, origin, radius, Some(world), config) {
            return id;
        }
        let id = graph.create_node(origin);
        events.push(RoamEvent::NodeCreated(id));
        id
    }

    /// Link the last node to `to`, if there is a last node.
    fn link_from_last(
        &self,
        graph: &mut NavGraph,
        to: NodeId,
        bidirectional: bool,
        events: &mut Vec<RoamEvent>,
    ) -> NavResult<()> {
        let Some(from) = self.last_nodes[0] else {
            return Ok(());
        };
        // Landing right back where we took off.
        if from == to {
            return Ok(());
        }
        graph.create_default_link(from, to, bidirectional)?;
        events.push(RoamEvent::Linked {
            from,
            to,
            bidirectional,
        });
        Ok(())
    }

    fn on_floor(world: &dyn NavWorld, sample: &PlayerSample, config: &NavConfig) -> bool {
        let end = sample.origin - Vec3::new(0.0, 0.0, config.ground_dist);
        let tr = world.trace(sample.origin, end, sample.bounds, Contents::MASK_SOLID);
        tr.fraction < 1.0 && tr.plane_normal.z > config.step_normal
    }

    /// Process one frame of player movement.
    pub fn roam(
        &mut self,
        graph: &mut NavGraph,
        world: &dyn NavWorld,
        config: &NavConfig,
        dev_mode: DevMode,
        sample: &PlayerSample,
    ) -> NavResult<RoamReport> {
        let mut report = RoamReport::default();
        if !dev_mode.is_enabled() {
            return Ok(report);
        }
        let events = &mut report.events;

        // Ids cached before an external edit may no longer exist.
        for slot in &mut self.last_nodes {
            *slot = slot.filter(|id| graph.contains(*id));
        }

        self.old_buttons = self.buttons;
        self.buttons = sample.buttons;
        self.latched_buttons |= self.buttons & !self.old_buttons;

        let allow_adjustments = dev_mode == DevMode::Authoring;
        let recording = allow_adjustments && sample.normal_movement;

        // Switching in or out of noclip: don't connect across the gap, and
        // don't record anything until the player is back on the floor.
        if self.recording != recording {
            self.recording = recording;
            self.position = sample.origin;
            self.last_nodes = [None, None];
            self.await_landing = true;
            self.is_jumping = false;
            self.is_water_jump = false;
            events.push(RoamEvent::RecordingChanged(recording));
        }

        let origin = sample.origin;
        let in_water = world.point_contents(origin).intersects(Contents::MASK_LIQUID);
        let on_mover = sample.on_mover();

        report.stuck = self.stuck.update(
            MoveSample {
                position: origin,
                msec: sample.msec,
                in_liquid: in_water,
                on_mover,
            },
            config,
        );

        let last_distance = match self.last_nodes[0] {
            Some(id) => origin.distance(graph.position(id)?),
            None => f32::INFINITY,
        };
        let moved = origin.distance(self.position);

        if recording {
            if self.await_landing {
                if Self::on_floor(world, sample, config) || in_water {
                    self.await_landing = false;
                    self.position = origin;

                    let radius = config.walking_distance / 2.0;
                    let landed =
                        Self::find_or_create(graph, world, config, origin, radius, events);

                    if let Some(last) = self.last_nodes[0] {
                        let bidirectional = if self.is_water_jump {
                            debug!("most likely water jump; connecting both ends");
                            true
                        } else if self.is_jumping || in_water {
                            let dz = (graph.position(last)?.z - graph.position(landed)?.z).abs();
                            dz < config.step_height || (in_water && dz < config.step_height * 3.0)
                        } else {
                            false
                        };
                        self.link_from_last(graph, landed, bidirectional, events)?;
                    }

                    self.shift(landed);
                    self.is_water_jump = false;
                    events.push(RoamEvent::Landed(landed));
                    debug!("landed at {landed}");
                }
                return Ok(report);
            }

            if moved > config.teleport_distance {
                self.last_nodes = [None, None];
                self.position = origin;
                self.await_landing = true;
                events.push(RoamEvent::Teleported);
                debug!("teleport detected; awaiting landing");
                return Ok(report);
            }

            if !Self::on_floor(world, sample, config) && !in_water {
                let jumping = sample.velocity.z > 0.0;
                let radius = config.walking_distance / 2.0;
                let id = Self::find_or_create(graph, world, config, origin, radius, events);
                self.link_from_last(graph, id, true, events)?;
                self.shift(id);

                self.await_landing = true;
                self.is_jumping = jumping;
                // Only a jump can carry a water jump out of the water.
                if !jumping {
                    self.is_water_jump = false;
                }
                events.push(RoamEvent::LeftGround { jumping });
                debug!("left ground; jumping: {jumping}");
                return Ok(report);
            }
        }

        let touch_radius = config.walking_distance / 4.0;
        let touched = find_closest(graph, origin, touch_radius, Some(world), config)
            .filter(|id| Some(*id) != self.last_nodes[0]);

        if allow_adjustments && self.latched_buttons.contains(Buttons::ATTACK) {
            if let Some(last) = self.last_nodes[0] {
                graph.set_position(last, origin)?;
                events.push(RoamEvent::NodeMoved(last));
            }
            self.latched_buttons = self.latched_buttons & !Buttons::ATTACK;
        } else if allow_adjustments && self.latched_buttons.contains(Buttons::HOOK) {
            if let Some(last) = self.last_nodes[0] {
                graph.destroy_node(last)?;
                events.push(RoamEvent::NodeDestroyed(last));
                self.position = origin;
                self.last_nodes = [None, None];
                let radius = config.walking_distance * 2.5;
                self.last_nodes[0] = find_closest(graph, origin, radius, Some(world), config);
            }
            self.latched_buttons = self.latched_buttons & !Buttons::HOOK;
        } else if allow_adjustments && self.latched_buttons.contains(Buttons::SCORE) {
            if let [Some(a), Some(b)] = self.last_nodes {
                let link_type = graph.link_type(a, b).cycle();
                graph.destroy_link(a, b)?;
                graph.destroy_link(b, a)?;
                if link_type.forward() {
                    graph.create_default_link(a, b, false)?;
                }
                if link_type.reverse() {
                    graph.create_default_link(b, a, false)?;
                }
                events.push(RoamEvent::LinkTypeChanged { a, b, link_type });
            }
            self.latched_buttons = self.latched_buttons & !Buttons::SCORE;
        } else if on_mover != self.on_mover {
            self.on_mover = on_mover;
            if recording {
                let radius = config.walking_distance / 8.0;
                let id = Self::find_or_create(graph, world, config, origin, radius, events);
                self.link_from_last(graph, id, false, events)?;
                self.shift(id);
                debug!("dropped mover node {id}");
            }
        } else if let Some(id) = touched {
            if recording {
                self.link_from_last(graph, id, !self.on_mover, events)?;
            }
            self.shift(id);
            events.push(RoamEvent::Visited(id));
        } else if last_distance > config.walking_distance && recording {
            let radius = config.walking_distance / 2.0;
            let id = Self::find_or_create(graph, world, config, origin, radius, events);
            self.link_from_last(graph, id, !self.on_mover, events)?;
            self.shift(id);
        }

        // Leaving water later might be a water jump; decided on landing.
        if in_water {
            self.is_water_jump = true;
        }

        self.position = origin;
        Ok(report)
    }
}
