//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, SceneManagerKind};

/// Orrery command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "orrery", about = "Orrery astronomy core")]
pub struct CliArgs {
    /// Viewport width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// Viewport height in pixels.
    #[arg(long)]
    pub height: Option<u32>,

    /// Vertical field of view at startup, degrees.
    #[arg(long)]
    pub fov: Option<f64>,

    /// Limiting apparent magnitude.
    #[arg(long)]
    pub magnitude: Option<f64>,

    /// Scene manager variant.
    #[arg(long, value_enum)]
    pub scene_manager: Option<SceneManagerKind>,

    /// Map the nearest depth to 1.0.
    #[arg(long)]
    pub inverse_z: Option<bool>,

    /// Background load workers (0 = auto).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Number of frames to simulate before exiting.
    #[arg(long)]
    pub frames: Option<u64>,

    /// Seed of the generated star field and terrain.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Heightmap source: an image, a `{face}_{lod}_{x}_{y}` tile template, or a `.proc` file.
    #[arg(long)]
    pub heightmap: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.core.viewport_width = w;
        }
        if let Some(h) = args.height {
            self.core.viewport_height = h;
        }
        if let Some(fov) = args.fov {
            self.core.default_fov = fov;
        }
        if let Some(mag) = args.magnitude {
            self.core.lowest_app_magnitude = mag;
        }
        if let Some(kind) = args.scene_manager {
            self.core.scene_manager = kind;
        }
        if let Some(inverse) = args.inverse_z {
            self.core.use_inverse_z = inverse;
        }
        if let Some(workers) = args.workers {
            self.data.workers = workers;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            width: Some(1920),
            magnitude: Some(9.0),
            scene_manager: Some(SceneManagerKind::Static),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.core.viewport_width, 1920);
        assert_eq!(config.core.lowest_app_magnitude, 9.0);
        assert_eq!(config.core.scene_manager, SceneManagerKind::Static);
        // Non-overridden fields retain defaults
        assert_eq!(config.core.viewport_height, 720);
        assert!(config.core.use_inverse_z);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from([
            "orrery",
            "--scene-manager",
            "dynamic",
            "--inverse-z",
            "false",
            "--frames",
            "10",
            "--seed",
            "7",
        ]);
        assert_eq!(args.scene_manager, Some(SceneManagerKind::Dynamic));
        assert_eq!(args.inverse_z, Some(false));
        assert_eq!(args.frames, Some(10));
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.heightmap, None);
    }
}
