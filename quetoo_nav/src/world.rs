// Engine collision capabilities consumed by the navigation graph.
//
// The graph never touches BSP data directly. Visibility checks, floor
// detection, liquid detection and mover probing all go through the
// `NavWorld` trait, which the host game implements on top of its collision
// model. Traces sweep an axis-aligned box (`Bounds::POINT` for line traces)
// from `start` to `end` and report the first blocking brush whose contents
// intersect the mask.
//
// `BoxWorld` is a small in-process implementation: a list of solid or
// liquid axis-aligned boxes, each owned by an entity (entity 0 is the static
// world, others are movers). It backs the tests and headless tooling. Box
// sweeps are reduced to ray-vs-expanded-box slab tests (Minkowski sum of the
// brush and the swept box).
//
// See also: `query.rs` for the visibility filter, `recorder.rs` for floor
// and liquid checks, `optimize.rs` and `pathfinding.rs` for mover probes.

use crate::types::{Bounds, Contents, EntityId, Vec3};

/// Result of a swept-box trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceResult {
    /// Fraction of the sweep completed before hitting something (1.0 = clear).
    pub fraction: f32,
    /// Final position of the swept origin.
    pub end: Vec3,
    /// Entity owning the brush that was hit, if any.
    pub entity: Option<EntityId>,
    /// Normal of the plane that was hit (zero when nothing was hit).
    pub plane_normal: Vec3,
    /// Contents of the brush that was hit.
    pub contents: Contents,
    /// The sweep started inside a brush.
    pub start_solid: bool,
    /// The sweep never left the brush it started in.
    pub all_solid: bool,
}

impl TraceResult {
    /// A trace that travelled the whole way without hitting anything.
    pub fn clear(end: Vec3) -> Self {
        Self {
            fraction: 1.0,
            end,
            entity: None,
            plane_normal: Vec3::ZERO,
            contents: Contents::NONE,
            start_solid: false,
            all_solid: false,
        }
    }

    pub fn hit_something(&self) -> bool {
        self.fraction < 1.0 || self.start_solid
    }

    /// The trace ended on a brush owned by a non-world entity.
    pub fn hit_mover(&self) -> Option<EntityId> {
        self.entity.filter(|e| !e.is_world())
    }
}

/// Collision queries the navigation graph needs from the engine.
pub trait NavWorld {
    /// Sweep `bounds` from `start` to `end`, stopping at brushes whose
    /// contents intersect `mask`.
    fn trace(&self, start: Vec3, end: Vec3, bounds: Bounds, mask: Contents) -> TraceResult;

    /// Union of the contents of every brush containing `point`.
    fn point_contents(&self, point: Vec3) -> Contents;
}

/// One brush of a `BoxWorld`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Brush {
    pub bounds: Bounds,
    pub contents: Contents,
    pub entity: EntityId,
}

/// A world made of axis-aligned brushes.
#[derive(Clone, Debug, Default)]
pub struct BoxWorld {
    brushes: Vec<Brush>,
}

impl BoxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a static solid brush owned by the world.
    pub fn add_solid(&mut self, mins: Vec3, maxs: Vec3) -> &mut Self {
        self.add_brush(Bounds::new(mins, maxs), Contents::SOLID, EntityId::WORLD)
    }

    /// Add a liquid volume (non-blocking for `MASK_SOLID`).
    pub fn add_liquid(&mut self, mins: Vec3, maxs: Vec3, contents: Contents) -> &mut Self {
        self.add_brush(Bounds::new(mins, maxs), contents, EntityId::WORLD)
    }

    /// Add a solid brush owned by a mover entity.
    pub fn add_mover(&mut self, entity: EntityId, mins: Vec3, maxs: Vec3) -> &mut Self {
        self.add_brush(Bounds::new(mins, maxs), Contents::SOLID, entity)
    }

    pub fn add_brush(&mut self, bounds: Bounds, contents: Contents, entity: EntityId) -> &mut Self {
        self.brushes.push(Brush {
            bounds,
            contents,
            entity,
        });
        self
    }

    /// Move every brush of `entity` by `delta` (a lift going up or down).
    pub fn translate_entity(&mut self, entity: EntityId, delta: Vec3) {
        for brush in self.brushes.iter_mut().filter(|b| b.entity == entity) {
            brush.bounds = Bounds::new(brush.bounds.mins + delta, brush.bounds.maxs + delta);
        }
    }

    pub fn brushes(&self) -> &[Brush] {
        &self.brushes
    }
}

/// Strict interior test; touching a face is not "inside".
fn strictly_inside(b: &Bounds, p: Vec3) -> bool {
    p.x > b.mins.x
        && p.x < b.maxs.x
        && p.y > b.mins.y
        && p.y < b.maxs.y
        && p.z > b.mins.z
        && p.z < b.maxs.z
}

/// Slab test of the segment `start + t * dir`, t in [0, 1], against `b`.
/// Returns the entry fraction and the entry face normal.
fn segment_entry(b: &Bounds, start: Vec3, dir: Vec3) -> Option<(f32, Vec3)> {
    let starts = [start.x, start.y, start.z];
    let dirs = [dir.x, dir.y, dir.z];
    let mins = [b.mins.x, b.mins.y, b.mins.z];
    let maxs = [b.maxs.x, b.maxs.y, b.maxs.z];

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut enter_axis = None;
    let mut enter_sign = 0.0f32;

    for axis in 0..3 {
        if dirs[axis].abs() < f32::EPSILON {
            if starts[axis] < mins[axis] || starts[axis] > maxs[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dirs[axis];
        let (t_near, t_far, sign) = if inv > 0.0 {
            ((mins[axis] - starts[axis]) * inv, (maxs[axis] - starts[axis]) * inv, -1.0)
        } else {
            ((maxs[axis] - starts[axis]) * inv, (mins[axis] - starts[axis]) * inv, 1.0)
        };
        if t_near > t_enter {
            t_enter = t_near;
            enter_axis = Some(axis);
            enter_sign = sign;
        }
        t_exit = t_exit.min(t_far);
    }

    let axis = enter_axis?;
    if t_enter > t_exit || t_enter < 0.0 || t_enter > 1.0 {
        return None;
    }
    // Grazing along a face is not a hit.
    if t_exit <= t_enter && t_exit < 1.0 {
        return None;
    }

    let mut normal = [0.0f32; 3];
    normal[axis] = enter_sign;
    Some((t_enter, Vec3::new(normal[0], normal[1], normal[2])))
}

impl NavWorld for BoxWorld {
    fn trace(&self, start: Vec3, end: Vec3, bounds: Bounds, mask: Contents) -> TraceResult {
        let dir = end - start;
        let mut best = TraceResult::clear(end);

        for brush in self.brushes.iter().filter(|b| b.contents.intersects(mask)) {
            // Minkowski sum: sweeping a box against a brush is sweeping a
            // point against the brush grown by the box extents.
            let grown = Bounds::new(
                brush.bounds.mins - bounds.maxs,
                brush.bounds.maxs - bounds.mins,
            );

            if strictly_inside(&grown, start) {
                return TraceResult {
                    fraction: 0.0,
                    end: start,
                    entity: Some(brush.entity),
                    plane_normal: Vec3::ZERO,
                    contents: brush.contents,
                    start_solid: true,
                    all_solid: strictly_inside(&grown, end),
                };
            }

            let Some((fraction, normal)) = segment_entry(&grown, start, dir) else {
                continue;
            };
            if fraction < best.fraction {
                best = TraceResult {
                    fraction,
                    end: start + dir.scale(fraction),
                    entity: Some(brush.entity),
                    plane_normal: normal,
                    contents: brush.contents,
                    start_solid: false,
                    all_solid: false,
                };
            }
        }

        best
    }

    fn point_contents(&self, point: Vec3) -> Contents {
        self.brushes
            .iter()
            .filter(|b| b.bounds.contains(point))
            .fold(Contents::NONE, |acc, b| acc | b.contents)
    }
}
