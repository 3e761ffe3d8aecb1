// Data-driven navigation configuration.
//
// Every distance, threshold and probe depth the graph code uses lives in
// `NavConfig`, loadable from JSON so map authors can tune recording
// behavior without recompiling. The defaults reproduce the shipped game's
// player-movement constants (16-unit steps, 0.25-unit ground probe, a
// 32x32x56 player box) and the recorder's 128-unit node spacing.
//
// Stuck detection parameters are grouped into `StuckParams`, shared by the
// recorder and by the bot movement code in `quetoo_bots`.
//
// `DevMode` mirrors the engine's `ai_node_dev` cvar: 0 disables all
// authoring, 1 records and allows edits and saving, anything higher only
// tracks and visualizes without mutating the graph.
//
// See also: `recorder.rs` and `optimize.rs`, the main consumers;
// `session.rs`, which owns a `NavConfig` per loaded map.

use crate::error::NavResult;
use crate::types::{Bounds, Vec3};
use serde::{Deserialize, Serialize};

/// Authoring level for the navigation graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DevMode {
    /// Normal play. No recording, no saving.
    #[default]
    Off,
    /// Full authoring: record player movement, edit nodes, save.
    Authoring,
    /// Track the player against the graph (test paths, highlighting) but
    /// never mutate it.
    Observe,
}

impl DevMode {
    /// Map the integer cvar value onto a mode.
    pub fn from_level(level: i32) -> Self {
        match level {
            0 => DevMode::Off,
            1 => DevMode::Authoring,
            _ => DevMode::Observe,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != DevMode::Off
    }
}

/// Thresholds for detecting that a walking player or bot is not making
/// progress.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StuckParams {
    /// Distress added for each sample with too little movement.
    pub distress_step: f32,
    /// Distress added per stuck sample while standing on a mover, so that
    /// riding a lift does not trigger evasive moves.
    pub mover_distress_step: f32,
    /// Fraction of expected travel still counted as progress while in liquid.
    pub liquid_factor: f32,
    /// Distress above which a vertical nudge (jump) is advised.
    pub jump_threshold: f32,
    /// Distress above which a forced heading change is advised.
    pub turn_threshold: f32,
}

impl Default for StuckParams {
    fn default() -> Self {
        Self {
            distress_step: 0.2,
            mover_distress_step: 0.02,
            liquid_factor: 0.1,
            jump_threshold: 8.0,
            turn_threshold: 12.0,
        }
    }
}

/// All tunable parameters of the navigation graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavConfig {
    /// Height of a single stair step. Spatial queries ignore nodes more
    /// than two steps above or below the query point.
    pub step_height: f32,
    /// Distance below the player's feet probed for ground.
    pub ground_dist: f32,
    /// Minimum plane normal Z for a surface to count as floor.
    pub step_normal: f32,
    /// Player bounding box relative to the origin.
    pub player_bounds: Bounds,
    /// Distance walked between dropped nodes.
    pub walking_distance: f32,
    /// Movement between two samples beyond which the player is assumed to
    /// have teleported.
    pub teleport_distance: f32,
    /// How far below a node to search for a mover it rests on.
    pub mover_probe_depth: f32,
    /// Minimum dot product between neighbor directions for a chain node to
    /// be collapsed by the optimizer.
    pub collinear_dot: f32,
    /// Radius around each item inside which a node must exist, checked in
    /// dev mode by `NavSession::nodes_ready` and `NavSession::save`.
    pub item_check_radius: f32,
    /// Running speed in units per second.
    pub run_speed: f32,
    /// Multiplier applied to `run_speed` when computing expected travel.
    pub walk_speed_modifier: f32,
    /// Stuck detection thresholds.
    pub stuck: StuckParams,
}

impl Default for NavConfig {
    fn default() -> Self {
        let walking_distance = 128.0;
        Self {
            step_height: 16.0,
            ground_dist: 0.25,
            step_normal: 0.7,
            player_bounds: Bounds::new(Vec3::new(-16.0, -16.0, -24.0), Vec3::new(16.0, 16.0, 32.0)),
            walking_distance,
            teleport_distance: 64.0,
            mover_probe_depth: 128.0,
            collinear_dot: 0.9,
            item_check_radius: walking_distance * 2.5,
            run_speed: 300.0,
            walk_speed_modifier: 1.0,
            stuck: StuckParams::default(),
        }
    }
}

impl NavConfig {
    /// Parse a config from JSON. Missing fields are an error; start from
    /// `to_json(&NavConfig::default())` to get a complete template.
    pub fn from_json(json: &str) -> NavResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> NavResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
