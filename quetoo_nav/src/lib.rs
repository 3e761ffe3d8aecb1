// quetoo_nav: bot navigation graph library.
//
// A sparse waypoint graph for a first-person shooter: built by watching a
// human player walk the map, edited live, saved to a small binary file per
// map, simplified after load, and searched with A* for bot movement. It has
// no engine dependencies; collision queries and file access come in through
// the `NavWorld` and `NavStorage` traits, so the whole crate runs headless
// in tests.
//
// Module overview:
// - `types.rs`:       Vec3, Bounds, NodeId, EntityId, content and button flags.
// - `world.rs`:       NavWorld trait (traces, point contents) + BoxWorld test geometry.
// - `storage.rs`:     NavStorage trait + directory and in-memory backends.
// - `config.rs`:      NavConfig, StuckParams, DevMode, all tunable parameters.
// - `error.rs`:       NavError / NavResult.
// - `graph.rs`:       NavGraph node store: nodes, directed costed links, renumbering on delete.
// - `query.rs`:       Nearest-node lookup with height and visibility filters.
// - `pathfinding.rs`: A* search, mover gating, slow-drop detection.
// - `optimize.rs`:    Collinear chain collapsing, mover attachment with flood fill.
// - `navfile.rs`:     `.nav` binary codec.
// - `recorder.rs`:    Player-driven graph authoring state machine.
// - `stuck.rs`:       Distress accumulation and stuck advice.
// - `session.rs`:     NavSession, the per-map lifecycle (load, ready, roam, save).
//
// The companion crate `quetoo_bots` builds the bot decision loop on top.
//
// **Critical constraint: single-threaded.** A session is owned by the game
// thread. Searches allocate their own scratch space and never write the
// graph, but nothing here is `Sync`-aware and nothing needs to be.

pub mod config;
pub mod error;
pub mod graph;
pub mod navfile;
pub mod optimize;
pub mod pathfinding;
pub mod query;
pub mod recorder;
pub mod session;
pub mod storage;
pub mod stuck;
pub mod types;
pub mod world;

pub use config::{DevMode, NavConfig, StuckParams};
pub use error::{NavError, NavResult};
pub use graph::{LinkType, NavGraph, NavLink, NavNode};
pub use pathfinding::{PathResult, find_path};
pub use session::{LoadOutcome, NavSession, NodeCheck, SaveReport};
pub use types::{Bounds, Buttons, Contents, EntityId, NodeId, Vec3};
pub use world::{BoxWorld, NavWorld, TraceResult};
