//! Configuration for the Orrery core.
//!
//! Settings persist to disk as `config.ron`, can be overridden from the command
//! line, and are frozen once per frame into an immutable [`CoreConfig`] that the
//! traversers, LOD policies and scene managers read.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, CoreConfig, DataConfig, DebugConfig, HeightmapFilter, LodConfig, MAX_PATCH_LOD,
    MAX_TESSELLATION_LEVEL, OctreeConfig, SceneManagerKind,
};
pub use error::ConfigError;
