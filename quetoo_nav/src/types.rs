// Core types shared across the navigation graph.
//
// Defines world-space vectors (`Vec3`), axis-aligned bounds (`Bounds`), node
// and entity identifiers, content flags for traces and point queries, and
// the latched input buttons the recorder reacts to. All plain data types
// derive `Serialize`/`Deserialize` so they can appear in config files and
// debug dumps.
//
// Coordinates follow the engine: Z is up. Distances are in world units
// (a player is 56 units tall, a stair step is 16).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitOrAssign, Not, Sub};

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A point or direction in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    pub fn distance_squared(self, other: Self) -> f32 {
        let d = self - other;
        d.dot(d)
    }

    /// Distance ignoring the vertical axis.
    pub fn distance_xy(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Sum of absolute per-axis differences.
    pub fn manhattan_distance(self, other: Self) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }

    /// Unit vector in the same direction. The zero vector stays zero.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len > 0.0 { self.scale(1.0 / len) } else { Self::ZERO }
    }

    /// Component-wise product, used to scale bounding boxes per axis.
    pub fn scale_by(self, other: Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    /// Bit-exact equality, used by persistence tests.
    pub fn bits(self) -> [u32; 3] {
        [self.x.to_bits(), self.y.to_bits(), self.z.to_bits()]
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// An axis-aligned box. For sweeps this is relative to the moving point
/// (`mins` is usually negative); for world geometry it is absolute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Bounds {
    /// A zero-size box: traces with it are point traces.
    pub const POINT: Self = Self::new(Vec3::ZERO, Vec3::ZERO);

    pub const fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    /// Scale both corners, e.g. the half-size box used for airborne checks.
    pub fn scale(self, s: f32) -> Self {
        Self::new(self.mins.scale(s), self.maxs.scale(s))
    }

    /// Grow the box outward by `pad` on every side.
    pub fn expand(self, pad: Vec3) -> Self {
        Self::new(self.mins - pad, self.maxs + pad)
    }

    /// Translate a relative box to an absolute one at `origin`.
    pub fn at(self, origin: Vec3) -> Self {
        Self::new(origin + self.mins, origin + self.maxs)
    }

    /// Inclusive point containment.
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.mins.x
            && p.x <= self.maxs.x
            && p.y >= self.mins.y
            && p.y <= self.maxs.y
            && p.z >= self.mins.z
            && p.z <= self.maxs.z
    }

    pub fn center(&self) -> Vec3 {
        (self.mins + self.maxs).scale(0.5)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Dense index of a node in the `NavGraph`. Valid values are
/// `0..graph.node_count()`; deleting a node renumbers every higher index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

/// An engine entity number. Entity 0 is the world itself; anything else
/// that a trace can hit is a brush model (door, lift, train).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const WORLD: Self = Self(0);

    pub fn is_world(self) -> bool {
        self == Self::WORLD
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity #{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident($repr:ty) { $($(#[$fmeta:meta])* $flag:ident = $value:expr,)* }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub $repr);

        impl $name {
            pub const NONE: Self = Self(0);
            $($(#[$fmeta])* pub const $flag: Self = Self($value);)*

            /// True if any bit of `other` is set in `self`.
            pub fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// True if every bit of `other` is set in `self`.
            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                Self(!self.0)
            }
        }
    };
}

flag_set! {
    /// Brush contents reported by traces and point queries.
    Contents(u32) {
        SOLID = 1 << 0,
        WINDOW = 1 << 1,
        LAVA = 1 << 3,
        SLIME = 1 << 4,
        WATER = 1 << 5,
        PLAYER_CLIP = 1 << 16,
        MONSTER_CLIP = 1 << 17,
        /// What blocks a walking player.
        MASK_SOLID = (1 << 0) | (1 << 1) | (1 << 16),
        /// What blocks sight.
        MASK_VISIBLE = (1 << 0) | (1 << 1),
        /// Anything a player can swim in.
        MASK_LIQUID = (1 << 3) | (1 << 4) | (1 << 5),
    }
}

flag_set! {
    /// Player command buttons.
    Buttons(u16) {
        ATTACK = 1 << 0,
        WALK = 1 << 1,
        HOOK = 1 << 2,
        SCORE = 1 << 3,
    }
}
