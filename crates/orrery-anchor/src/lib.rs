//! Anchors, the star octree, and the traversers that select what is visible.
//!
//! An [`AnchorTree`] is an arena of anchors linked by [`AnchorId`]. Systems
//! keep their children as a range of a shared side array; octree containers
//! additionally index their children in a static [`Octree`]. Each frame a
//! [`FrameContext`] is built from the observer and the [`CoreConfig`], and an
//! [`UpdateTraverser`] walks the tree, refreshing observer-relative state and
//! collecting the visible anchors.
//!
//! [`CoreConfig`]: orrery_config::CoreConfig

mod anchor;
pub mod dynamics;
mod flags;
pub mod octree;
mod observer;
mod traverser;
pub mod traversers;
mod tree;

pub use anchor::{Anchor, AnchorDesc, AnchorId, AnchorKind, AnchorState, NEVER_UPDATED};
pub use flags::ContentFlags;
pub use observer::{Frustum, Lens, Observer};
pub use octree::{NodeId, Octree, OctreeId, OctreeLeaf};
pub use traverser::Traverser;
pub use traversers::{
    FindClosestSystemTraverser, FindLightSourceTraverser, FindShadowCastersTraverser,
    LightSource, UpdateTraverser,
};
pub use tree::{AnchorTree, AnchorTreeBuilder, FrameContext, TreeError};
