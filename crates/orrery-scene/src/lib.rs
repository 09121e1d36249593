//! Per-frame scene assembly.
//!
//! A [`Universe`] owns the anchor tree and the surfaces of approached
//! bodies. Each [`Universe::frame`] runs the update traversal, refines the
//! surface quadtrees, streams their patch data, and hands the visible set
//! to a [`SceneManager`] that slices it into depth-ordered render passes.

mod error;
mod manager;
mod mover;
mod pass;
mod region;
mod render;
mod sprite;
mod surface;
mod universe;

pub use error::{RendererError, SceneError};
pub use manager::{
    DynamicSceneManager, MIN_NEAR, SceneInput, SceneManager, StaticSceneManager, scene_manager_for,
};
pub use mover::SurfaceMover;
pub use pass::{DepthRange, RegionKind, RenderPass, SceneNode};
pub use region::RegionSceneManager;
pub use render::Renderer;
pub use sprite::{PointSprite, anchor_from_oid, oid_color};
pub use surface::{PatchDraw, SurfaceBody, SurfaceDraw, SurfaceSources};
pub use universe::{Frame, Universe};
