use std::fmt;
use std::ops::Range;

use glam::{DQuat, DVec3};
use orrery_math::{Vec3I128, WorldPosition};

use crate::ContentFlags;
use crate::dynamics::{Orbit, Rotation};
use crate::octree::OctreeId;

/// Index of an anchor in its [`AnchorTree`](crate::AnchorTree).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u32);

impl AnchorId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an anchor's content is traversed.
#[derive(Clone, Debug, PartialEq)]
pub enum AnchorKind {
    /// A single object.
    Body,
    /// Ordered children stored as a range in the tree's side array.
    System { children: Range<u32> },
    /// Children indexed by a static spatial octree.
    Octree { octree: OctreeId, children: Range<u32> },
}

/// Value of `update_id` before the first update.
pub const NEVER_UPDATED: u64 = u64::MAX;

/// Observer-relative state, recomputed once per frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorState {
    /// Unit vector from the anchor towards the observer.
    pub vector_to_obs: DVec3,
    /// Anchor position relative to the observer, metres.
    pub rel_position: DVec3,
    pub distance_to_obs: f64,
    /// Depth along the camera forward axis, metres.
    pub z_distance: f64,
    /// Apparent radius in pixels.
    pub visible_size: f64,
    pub app_magnitude: f64,
    /// Irradiance at the observer, W/m².
    pub point_radiance: f64,
    pub orientation: DQuat,
    pub in_view: bool,
    pub resolved: bool,
    pub visible: bool,
    pub was_visible: bool,
    pub was_resolved: bool,
    /// Last orbit and rotation evaluation succeeded.
    pub dynamics_ok: bool,
    pub update_id: u64,
}

impl Default for AnchorState {
    fn default() -> Self {
        Self {
            vector_to_obs: DVec3::ZERO,
            rel_position: DVec3::ZERO,
            distance_to_obs: f64::INFINITY,
            z_distance: f64::INFINITY,
            visible_size: 0.0,
            app_magnitude: f64::INFINITY,
            point_radiance: 0.0,
            orientation: DQuat::IDENTITY,
            in_view: false,
            resolved: false,
            visible: false,
            was_visible: false,
            was_resolved: false,
            dynamics_ok: true,
            update_id: NEVER_UPDATED,
        }
    }
}

/// One object placed in world space.
#[derive(Debug)]
pub struct Anchor {
    pub id: AnchorId,
    pub name: String,
    pub parent: Option<AnchorId>,
    pub kind: AnchorKind,
    pub flags: ContentFlags,
    /// Intrinsic luminosity, watts.
    pub luminosity: f64,
    /// Largest luminosity of any descendant; zero for bodies.
    pub max_child_luminosity: f64,
    /// Bounding radius, metres.
    pub radius: f64,
    /// Offset from the parent, millimetres.
    pub local_position: Vec3I128,
    /// Absolute position, millimetres.
    pub position: WorldPosition,
    pub orbit: Option<Box<dyn Orbit>>,
    pub rotation: Option<Box<dyn Rotation>>,
    /// Drawn behind everything else (sky, distant galaxies).
    pub background: bool,
    /// Reported as visible even when culled.
    pub visibility_override: bool,
    /// Systems are entered even when culled.
    pub force_update: bool,
    pub color: [f32; 3],
    pub state: AnchorState,
}

impl Anchor {
    pub fn is_system(&self) -> bool {
        matches!(self.kind, AnchorKind::System { .. })
    }

    /// Luminosity used for point-source tests: own or brightest descendant.
    pub fn effective_luminosity(&self) -> f64 {
        self.luminosity.max(self.max_child_luminosity)
    }

    pub fn is_fresh(&self, frame_id: u64) -> bool {
        self.state.update_id == frame_id
    }
}

/// Description of an anchor to add to an [`AnchorTreeBuilder`](crate::AnchorTreeBuilder).
#[derive(Debug)]
pub struct AnchorDesc {
    pub(crate) name: String,
    pub(crate) shape: DescShape,
    pub(crate) flags: ContentFlags,
    pub(crate) luminosity: f64,
    pub(crate) radius: f64,
    pub(crate) local_position: Vec3I128,
    pub(crate) orbit: Option<Box<dyn Orbit>>,
    pub(crate) rotation: Option<Box<dyn Rotation>>,
    pub(crate) background: bool,
    pub(crate) visibility_override: bool,
    pub(crate) force_update: bool,
    pub(crate) color: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DescShape {
    Body,
    System,
    Octree { bounds: Option<(WorldPosition, i128)> },
}

impl AnchorDesc {
    fn with_shape(name: impl Into<String>, shape: DescShape, flags: ContentFlags) -> Self {
        Self {
            name: name.into(),
            shape,
            flags,
            luminosity: 0.0,
            radius: 0.0,
            local_position: Vec3I128::ZERO,
            orbit: None,
            rotation: None,
            background: false,
            visibility_override: false,
            force_update: false,
            color: [1.0, 1.0, 1.0],
        }
    }

    pub fn body(name: impl Into<String>) -> Self {
        Self::with_shape(name, DescShape::Body, ContentFlags::NONE)
    }

    /// A system; a zero radius is replaced by the extent of its children.
    pub fn system(name: impl Into<String>) -> Self {
        Self::with_shape(name, DescShape::System, ContentFlags::SYSTEM)
    }

    /// An octree container whose root cube encloses all its children.
    pub fn octree(name: impl Into<String>) -> Self {
        Self::with_shape(
            name,
            DescShape::Octree { bounds: None },
            ContentFlags::SYSTEM | ContentFlags::VIRTUAL,
        )
    }

    /// Fix the octree root cube instead of fitting it to the children.
    pub fn octree_bounds(mut self, center: WorldPosition, half_extent: i128) -> Self {
        if let DescShape::Octree { bounds } = &mut self.shape {
            *bounds = Some((center, half_extent));
        }
        self
    }

    pub fn flags(mut self, flags: ContentFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Luminosity in watts used for point-source visibility (reflected light for planets).
    pub fn luminosity(mut self, watts: f64) -> Self {
        self.luminosity = watts;
        self
    }

    /// A light source of the given luminosity.
    pub fn emissive(self, watts: f64) -> Self {
        self.luminosity(watts).flags(ContentFlags::EMISSIVE)
    }

    pub fn radius(mut self, meters: f64) -> Self {
        self.radius = meters;
        self
    }

    pub fn at(mut self, local: Vec3I128) -> Self {
        self.local_position = local;
        self
    }

    pub fn at_meters(self, local: DVec3) -> Self {
        self.at(Vec3I128::from_meters(local))
    }

    pub fn orbit(mut self, orbit: impl Orbit + 'static) -> Self {
        self.orbit = Some(Box::new(orbit));
        self
    }

    pub fn rotation(mut self, rotation: impl Rotation + 'static) -> Self {
        self.rotation = Some(Box::new(rotation));
        self
    }

    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    pub fn visibility_override(mut self) -> Self {
        self.visibility_override = true;
        self
    }

    pub fn force_update(mut self) -> Self {
        self.force_update = true;
        self
    }

    pub fn color(mut self, rgb: [f32; 3]) -> Self {
        self.color = rgb;
        self
    }
}
