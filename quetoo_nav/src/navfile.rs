// Binary `.nav` file format.
//
// One file per map at `ai/<mapname>.nav`. Everything is little-endian:
//
//   i32 magic              'Q' | '2' << 8 | 'N' << 16 | 'S' << 24
//   i32 version            2
//   u32 node_count
//   node_count times:
//     f32 x, f32 y, f32 z
//     u32 link_count
//     link_count times:
//       u32 target
//       f32 cost
//
// Movers are not stored; they are re-derived after load. Reading validates
// everything the graph relies on (targets in range, no duplicate links) so
// a corrupt file can never produce a graph that violates the store's
// invariants. Self-links, which older editors could write, are dropped.
// Counts from the file are not trusted for preallocation.
//
// See also: `session.rs` which maps load and save failures onto log
// messages, `storage.rs` for where the bytes come from.

use crate::error::{NavError, NavResult};
use crate::graph::{NavGraph, NavLink, NavNode};
use crate::types::{NodeId, Vec3};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;
use std::io::{Read, Write};
use tracing::debug;

/// File magic, "Q2NS" read as a little-endian integer.
pub const NAV_MAGIC: i32 = i32::from_le_bytes(*b"Q2NS");

/// Current format version.
pub const NAV_VERSION: i32 = 2;

/// Upper bound on speculative preallocation from header counts.
const MAX_PREALLOC: usize = 4096;

/// Path of the navigation file for `map`, relative to the game directory.
pub fn nav_path(map: &str) -> String {
    format!("ai/{map}.nav")
}

fn read_vec3<R: Read>(reader: &mut R) -> NavResult<Vec3> {
    let x = reader.read_f32::<LittleEndian>()?;
    let y = reader.read_f32::<LittleEndian>()?;
    let z = reader.read_f32::<LittleEndian>()?;
    Ok(Vec3::new(x, y, z))
}

/// Decode a graph. Truncated input surfaces as `NavError::Io` with
/// `UnexpectedEof`.
pub fn read_graph<R: Read>(reader: &mut R) -> NavResult<NavGraph> {
    let magic = reader.read_i32::<LittleEndian>()?;
    if magic != NAV_MAGIC {
        return Err(NavError::BadMagic { found: magic });
    }

    let version = reader.read_i32::<LittleEndian>()?;
    if version != NAV_VERSION {
        return Err(NavError::VersionMismatch {
            found: version,
            expected: NAV_VERSION,
        });
    }

    let count = reader.read_u32::<LittleEndian>()?;
    let mut nodes = Vec::with_capacity((count as usize).min(MAX_PREALLOC));

    for i in 0..count {
        let position = read_vec3(reader)?;
        let link_count = reader.read_u32::<LittleEndian>()?;
        let mut links: SmallVec<[NavLink; 4]> = SmallVec::new();

        for _ in 0..link_count {
            let target = reader.read_u32::<LittleEndian>()?;
            let cost = reader.read_f32::<LittleEndian>()?;
            if target >= count {
                return Err(NavError::Malformed(format!(
                    "node {i} links to {target} but the file has {count} nodes"
                )));
            }
            if target == i {
                debug!("dropping self-link on node {i}");
                continue;
            }
            if links.iter().any(|l| l.target.0 == target) {
                return Err(NavError::Malformed(format!("node {i} links to {target} twice")));
            }
            links.push(NavLink {
                target: NodeId(target),
                cost,
            });
        }

        nodes.push(NavNode {
            position,
            links,
            mover: None,
        });
    }

    Ok(NavGraph::from_nodes(nodes))
}

/// Encode a graph.
pub fn write_graph<W: Write>(writer: &mut W, graph: &NavGraph) -> NavResult<()> {
    writer.write_i32::<LittleEndian>(NAV_MAGIC)?;
    writer.write_i32::<LittleEndian>(NAV_VERSION)?;
    writer.write_u32::<LittleEndian>(len_u32(graph.node_count())?)?;

    for node in graph.nodes() {
        writer.write_f32::<LittleEndian>(node.position.x)?;
        writer.write_f32::<LittleEndian>(node.position.y)?;
        writer.write_f32::<LittleEndian>(node.position.z)?;
        writer.write_u32::<LittleEndian>(len_u32(node.links.len())?)?;
        for link in &node.links {
            writer.write_u32::<LittleEndian>(link.target.0)?;
            writer.write_f32::<LittleEndian>(link.cost)?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Encode a graph into a fresh buffer.
pub fn encode(graph: &NavGraph) -> NavResult<Vec<u8>> {
    let size = 12 + graph.node_count() * 16 + graph.link_count() * 8;
    let mut buf = Vec::with_capacity(size);
    write_graph(&mut buf, graph)?;
    Ok(buf)
}

fn len_u32(len: usize) -> NavResult<u32> {
    u32::try_from(len)
        .map_err(|_| NavError::Malformed(format!("{len} entries do not fit the file format")))
}
