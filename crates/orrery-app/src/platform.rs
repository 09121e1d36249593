//! OS directory resolution.
//!
//! Config, data, cache and log locations follow platform conventions (XDG on
//! Linux, Known Folders on Windows, Library on macOS) via `dirs`.

use std::io;
use std::path::{Path, PathBuf};

use orrery_scene::{RendererError, SceneError};

/// Errors resolving or creating the application directories.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("could not determine OS configuration directory")]
    NoConfigDir,

    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Process exit status for a run that stopped on `error`.
///
/// Only a renderer that never started is non-zero.
pub fn exit_status(error: Option<&SceneError>) -> u8 {
    match error {
        Some(SceneError::Renderer(RendererError::Init(_) | RendererError::ShaderVersion { .. })) => 1,
        _ => 0,
    }
}

/// OS-specific directory paths for Orrery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDirs {
    /// `config.ron`.
    pub config_dir: PathBuf,
    /// Heightmap and color tile pyramids.
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Log files and frame statistics snapshots.
    pub log_dir: PathBuf,
}

const APP_NAME: &str = "orrery";

/// File name of the frame statistics snapshot written on exit.
pub const STATS_FILE_NAME: &str = "frame_stats.json";

impl PlatformDirs {
    /// Resolve platform-specific directories without creating them.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NoConfigDir`] if the OS does not expose a
    /// configuration directory.
    pub fn resolve() -> Result<Self, PlatformError> {
        let app_config = dirs::config_dir()
            .ok_or(PlatformError::NoConfigDir)?
            .join(APP_NAME);
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| app_config.clone())
            .join(APP_NAME);
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| app_config.clone())
            .join(APP_NAME);

        Ok(Self {
            config_dir: app_config.join("config"),
            data_dir,
            cache_dir,
            log_dir: app_config.join("logs"),
        })
    }

    /// Directories rooted under `root`, for tests and `--config` overrides.
    pub fn resolve_with_root(root: &Path) -> Self {
        let app_dir = root.join(APP_NAME);
        Self {
            config_dir: app_dir.join("config"),
            data_dir: app_dir.join("data"),
            cache_dir: app_dir.join("cache"),
            log_dir: app_dir.join("logs"),
        }
    }

    /// Create every directory on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Io`] if any directory cannot be created.
    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        for dir in [&self.config_dir, &self.data_dir, &self.cache_dir, &self.log_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn stats_path(&self) -> PathBuf {
        self.log_dir.join(STATS_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_absolute() {
        let Ok(dirs) = PlatformDirs::resolve() else {
            // Minimal containers may have no HOME.
            return;
        };
        assert!(dirs.config_dir.is_absolute());
        assert!(dirs.data_dir.is_absolute());
        assert!(dirs.cache_dir.is_absolute());
        assert!(dirs.log_dir.is_absolute());
        assert!(dirs.config_dir.ends_with("config"));
    }

    #[test]
    fn test_create_dirs_under_root() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = PlatformDirs::resolve_with_root(tmp.path());
        dirs.create_dirs().unwrap();
        assert!(dirs.config_dir.is_dir());
        assert!(dirs.data_dir.is_dir());
        assert!(dirs.cache_dir.is_dir());
        assert!(dirs.log_dir.is_dir());
        assert_eq!(dirs.stats_path().parent(), Some(dirs.log_dir.as_path()));
    }

    #[test]
    fn test_only_renderer_startup_is_fatal() {
        assert_eq!(exit_status(None), 0);
        let init = SceneError::from(RendererError::Init("no device".into()));
        assert_eq!(exit_status(Some(&init)), 1);
        let shader = SceneError::from(RendererError::ShaderVersion {
            required: 460,
            available: 450,
        });
        assert_eq!(exit_status(Some(&shader)), 1);

        let pass = SceneError::from(RendererError::Pass {
            sort_index: 2,
            reason: "bad depth".into(),
        });
        assert_eq!(exit_status(Some(&pass)), 0);
        assert_eq!(exit_status(Some(&SceneError::from(RendererError::DeviceLost))), 0);
        let tree = orrery_anchor::AnchorTreeBuilder::new(orrery_anchor::AnchorDesc::body("rock")).unwrap_err();
        assert_eq!(exit_status(Some(&SceneError::from(tree))), 0);
    }

    #[test]
    fn test_create_dirs_twice() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = PlatformDirs::resolve_with_root(tmp.path());
        dirs.create_dirs().unwrap();
        dirs.create_dirs().unwrap();
    }
}
