//! Concrete visitors over the anchor tree.

mod closest;
mod light;
mod shadow;
mod update;

pub use closest::FindClosestSystemTraverser;
pub use light::{FindLightSourceTraverser, LightSource};
pub use shadow::FindShadowCastersTraverser;
pub use update::UpdateTraverser;
