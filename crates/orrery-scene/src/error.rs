use orrery_anchor::TreeError;
use orrery_patchdata::LoadError;

/// Failures of the rendering back end. The core cannot recover from these;
/// the host re-initializes or exits.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("renderer initialization failed: {0}")]
    Init(String),

    #[error("device lost")]
    DeviceLost,

    #[error("shader requires version {required}, device supports {available}")]
    ShaderVersion { required: u32, available: u32 },

    #[error("render pass {sort_index} rejected: {reason}")]
    Pass { sort_index: u32, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("failed to build anchor tree: {0}")]
    Tree(#[from] TreeError),

    #[error("failed to open surface data: {0}")]
    Data(#[from] LoadError),

    #[error(transparent)]
    Renderer(#[from] RendererError),
}
