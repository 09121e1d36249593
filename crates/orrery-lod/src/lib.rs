//! Level of detail for body surfaces: a quadtree of square patches per
//! surface root, split and merged by screen-space size, with explicit
//! neighbour sets so the renderer can stitch adjacent levels without cracks.

mod cube_face;
mod culling;
mod patch;
mod policy;
mod quadtree;
mod side;
mod surface;

pub use cube_face::CubeFace;
pub use culling::{CullingFrustum, HorizonCulling, LensCulling, NoCulling};
pub use patch::{ParamRect, Patch, PatchBox, PatchGeometry, PatchId, PatchKey, Quadrant};
pub use policy::{LodPolicy, ScreenSpacePolicy};
pub use quadtree::{LodChanges, LodError, LodQuadtree, LodUpdate, PatchView};
pub use side::Side;
pub use surface::{EdgeLink, Surface};
