use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading patch data.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to parse procedural source: {0}")]
    Procedural(#[from] ron::error::SpannedError),

    #[error("source {0} cannot provide this layer")]
    Unsupported(String),

    #[error("unusable texture dimensions {width}x{height}")]
    BadDimensions { width: u32, height: u32 },
}
