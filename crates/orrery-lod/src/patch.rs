//! Patch identity, parametric extent and cached per-frame state.

use std::fmt;

use glam::DVec3;
use orrery_debug::Subject;

use crate::Side;

/// Stable identity of a patch: root face, level and grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId {
    pub face: u8,
    pub lod: u8,
    pub x: u32,
    pub y: u32,
}

impl PatchId {
    pub const fn root(face: u8) -> Self {
        Self { face, lod: 0, x: 0, y: 0 }
    }

    pub fn parent(&self) -> Option<PatchId> {
        (self.lod > 0).then(|| PatchId {
            face: self.face,
            lod: self.lod - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }

    /// The ancestor at `lod`, or `self` when `lod` is not coarser.
    pub fn ancestor(&self, lod: u8) -> PatchId {
        if lod >= self.lod {
            return *self;
        }
        let shift = self.lod - lod;
        PatchId {
            face: self.face,
            lod,
            x: self.x >> shift,
            y: self.y >> shift,
        }
    }

    #[must_use]
    pub fn child(&self, quadrant: Quadrant) -> PatchId {
        let (dx, dy) = quadrant.offset();
        PatchId {
            face: self.face,
            lod: self.lod + 1,
            x: self.x * 2 + dx,
            y: self.y * 2 + dy,
        }
    }

    pub fn rect(&self) -> ParamRect {
        let cells = (1u64 << self.lod) as f64;
        ParamRect {
            x0: self.x as f64 / cells,
            y0: self.y as f64 / cells,
            x1: (self.x + 1) as f64 / cells,
            y1: (self.y + 1) as f64 / cells,
        }
    }

    pub fn subject(&self) -> Subject {
        Subject::Patch {
            face: self.face,
            lod: self.lod,
            x: self.x,
            y: self.y,
        }
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}/{}", self.face, self.lod, self.x, self.y)
    }
}

/// Child position inside its parent. Children are stored in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    BottomLeft = 0,
    BottomRight = 1,
    TopRight = 2,
    TopLeft = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
        Quadrant::TopRight,
        Quadrant::TopLeft,
    ];

    pub fn offset(self) -> (u32, u32) {
        match self {
            Quadrant::BottomLeft => (0, 0),
            Quadrant::BottomRight => (1, 0),
            Quadrant::TopRight => (1, 1),
            Quadrant::TopLeft => (0, 1),
        }
    }

    /// The two children touching `side` of their parent.
    pub fn bordering(side: Side) -> [Quadrant; 2] {
        match side {
            Side::North => [Quadrant::TopLeft, Quadrant::TopRight],
            Side::East => [Quadrant::TopRight, Quadrant::BottomRight],
            Side::South => [Quadrant::BottomLeft, Quadrant::BottomRight],
            Side::West => [Quadrant::BottomLeft, Quadrant::TopLeft],
        }
    }
}

/// Rectangle in face parametric space, `[0, 1]²` for a root.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl ParamRect {
    pub const UNIT: ParamRect = ParamRect { x0: 0.0, y0: 0.0, x1: 1.0, y1: 1.0 };

    /// Extent of the edge on `side`, along the axis that edge runs on.
    pub fn span(&self, side: Side) -> (f64, f64) {
        if side.runs_along_x() {
            (self.x0, self.x1)
        } else {
            (self.y0, self.y1)
        }
    }

    pub fn area(&self) -> f64 {
        (self.x1 - self.x0) * (self.y1 - self.y0)
    }

    pub fn intersection_area(&self, other: &ParamRect) -> f64 {
        let w = self.x1.min(other.x1) - self.x0.max(other.x0);
        let h = self.y1.min(other.y1) - self.y0.max(other.y0);
        w.max(0.0) * h.max(0.0)
    }
}

/// Axis-aligned box in body-local metres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl PatchBox {
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    pub fn expand(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Radius of the sphere around [`center`](Self::center) enclosing the box.
    pub fn radius(&self) -> f64 {
        (self.max - self.min).length() * 0.5
    }

    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }

    /// Distance from `p` to the box, 0 inside.
    pub fn distance_to(&self, p: DVec3) -> f64 {
        (p.clamp(self.min, self.max) - p).length()
    }
}

/// Shape of a patch on its surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchGeometry {
    /// Undisplaced center point.
    pub center: DVec3,
    /// Surface normal at the center.
    pub normal: DVec3,
    /// Edge length in metres.
    pub length: f64,
    /// Cosine of the widest angle between `normal` and the surface normals
    /// over the patch.
    pub offset: f64,
    pub bbox: PatchBox,
}

/// Arena handle of a patch inside one [`LodQuadtree`](crate::LodQuadtree).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchKey(pub(crate) u32);

impl PatchKey {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node of the patch quadtree.
#[derive(Clone, Debug)]
pub struct Patch {
    pub id: PatchId,
    pub parent: Option<PatchKey>,
    pub(crate) children: Option<[PatchKey; 4]>,
    pub(crate) neighbours: [Vec<PatchKey>; 4],
    pub geometry: PatchGeometry,
    pub min_height: f64,
    pub max_height: f64,
    /// Segments per edge, indexed by [`Side::index`].
    pub outer: [u32; 4],
    pub shown: bool,
    /// The renderer holds everything needed to draw this patch.
    pub instance_ready: bool,
    pub visible: bool,
    pub apparent_size: f64,
    pub distance: f64,
}

impl Patch {
    pub(crate) fn new(id: PatchId, parent: Option<PatchKey>, geometry: PatchGeometry) -> Self {
        Self {
            id,
            parent,
            children: None,
            neighbours: Default::default(),
            geometry,
            min_height: 0.0,
            max_height: 0.0,
            outer: [1; 4],
            shown: false,
            instance_ready: false,
            visible: false,
            apparent_size: 0.0,
            distance: f64::INFINITY,
        }
    }

    pub fn lod(&self) -> u8 {
        self.id.lod
    }

    pub fn rect(&self) -> ParamRect {
        self.id.rect()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Children in [`Quadrant::ALL`] order.
    pub fn children(&self) -> Option<[PatchKey; 4]> {
        self.children
    }

    pub fn neighbours(&self, side: Side) -> &[PatchKey] {
        &self.neighbours[side.index()]
    }

    pub fn outer_level(&self, side: Side) -> u32 {
        self.outer[side.index()]
    }
}
