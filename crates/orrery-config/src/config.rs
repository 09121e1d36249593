//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest `lod.max_level`; a patch edge never exceeds `2^16` segments.
pub const MAX_TESSELLATION_LEVEL: u32 = 16;

/// Deepest addressable patch level for `lod.max_lod` and `data.max_lod`.
/// Patch coordinates are `u32` cell indices at that level.
pub const MAX_PATCH_LOD: u8 = 30;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Options read by the per-frame core.
    pub core: CoreConfig,
    /// Surface quadtree settings.
    pub lod: LodConfig,
    /// Patch data streaming settings.
    pub data: DataConfig,
    /// Star octree construction.
    pub octree: OctreeConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Which scene manager builds the render passes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum SceneManagerKind {
    /// One pass with the configured near and far planes.
    Static,
    /// One pass whose planes hug the visible bodies.
    Dynamic,
    /// One pass per depth region.
    #[default]
    Region,
}

/// Options captured once per frame and shared by every core stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Minimum near distance in metres.
    pub near_plane: f64,
    /// Far plane in metres, used when `infinite_far_plane` is false.
    pub far_plane: f64,
    /// Static and Dynamic managers use an infinite far plane.
    pub infinite_far_plane: bool,
    /// Limiting apparent magnitude for point sources.
    pub lowest_app_magnitude: f64,
    /// Labels are only emitted for sources this many magnitudes brighter than the limit.
    pub label_magnitude_offset: f64,
    /// Apparent radius in pixels above which a body is drawn as a resolved body.
    pub min_body_size: f64,
    /// Vertical field of view bounds, degrees.
    pub max_fov: f64,
    pub min_fov: f64,
    /// Vertical field of view at startup, degrees.
    pub default_fov: f64,
    /// Viewport size in pixels.
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Scene units per metre divisor applied to region depths.
    pub world_scale: f64,
    pub scene_manager: SceneManagerKind,
    /// Emit object-id colors as a secondary render target.
    pub color_picking: bool,
    /// Map the nearest depth to 1.0 instead of 0.0.
    pub use_inverse_z: bool,
    /// Recorded for the renderer; the core does not interpret it.
    pub shader_min_version: u32,
}

/// Surface quadtree configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Inner tessellation exponent; a patch edge has `2^max_level` segments.
    pub max_level: u32,
    /// Split when a patch covers more pixels than this.
    pub split_threshold_px: f64,
    /// Merge when a parent would cover less than `split_threshold_px * merge_hysteresis`.
    pub merge_hysteresis: f64,
    /// Deepest patch level.
    pub max_lod: u8,
    /// Cull patches behind the horizon in addition to the view frustum.
    pub horizon_culling: bool,
    /// Multiplier on the horizon distance before culling.
    pub horizon_scale: f64,
}

/// Patch data streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Background load workers; 0 picks one less than the CPU count.
    pub workers: usize,
    /// Capacity of the bounded submission queue.
    pub queue_capacity: usize,
    /// Deepest level the data sources provide.
    pub max_lod: u8,
    /// Edge size in texels of procedural tiles.
    pub texture_size: u32,
    /// Heightmap sampling filter.
    pub heightmap_filter: HeightmapFilter,
    /// Metres per unit of normalized height.
    pub height_scale: f32,
}

/// Interpolation used when sampling heightmaps between texels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum HeightmapFilter {
    Nearest,
    #[default]
    Bilinear,
    Smoothstep,
    Quintic,
}

/// Star octree configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OctreeConfig {
    /// A node splits when it holds more leaves than this.
    pub leaf_threshold: usize,
    /// Nodes never split below this edge length, metres.
    pub min_cube_size: f64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write a JSON frame statistics snapshot on exit.
    pub export_frame_stats: bool,
}

// --- Default implementations ---

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            near_plane: 1e-6,
            far_plane: 1e12,
            infinite_far_plane: true,
            lowest_app_magnitude: 6.0,
            label_magnitude_offset: 1.0,
            min_body_size: 2.0,
            max_fov: 120.0,
            min_fov: 0.001,
            default_fov: 40.0,
            viewport_width: 1280,
            viewport_height: 720,
            world_scale: 1.0,
            scene_manager: SceneManagerKind::Region,
            color_picking: false,
            use_inverse_z: true,
            shader_min_version: 330,
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            max_level: 5,
            split_threshold_px: 384.0,
            merge_hysteresis: 0.5,
            max_lod: 20,
            horizon_culling: true,
            horizon_scale: 1.05,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: 64,
            max_lod: 12,
            texture_size: 64,
            heightmap_filter: HeightmapFilter::Bilinear,
            height_scale: 10_000.0,
        }
    }
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            leaf_threshold: 8,
            min_cube_size: 1.0e6,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            export_frame_stats: false,
        }
    }
}

// --- Validation ---

impl CoreConfig {
    /// Reject combinations no frame could be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: String| Err(ConfigError::Invalid { field, reason });

        if !(self.near_plane > 0.0) {
            return invalid("near_plane", format!("must be positive, got {}", self.near_plane));
        }
        if !self.infinite_far_plane && self.far_plane <= self.near_plane {
            return invalid(
                "far_plane",
                format!("{} is not beyond near_plane {}", self.far_plane, self.near_plane),
            );
        }
        if !(self.min_fov > 0.0) || self.max_fov >= 180.0 {
            return invalid(
                "fov",
                format!("bounds [{}, {}] outside (0, 180)", self.min_fov, self.max_fov),
            );
        }
        if self.min_fov >= self.max_fov {
            return invalid(
                "min_fov",
                format!("{} is not below max_fov {}", self.min_fov, self.max_fov),
            );
        }
        if !(self.min_body_size > 0.0) {
            return invalid("min_body_size", format!("must be positive, got {}", self.min_body_size));
        }
        if !(self.world_scale > 0.0) {
            return invalid("world_scale", format!("must be positive, got {}", self.world_scale));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return invalid(
                "viewport",
                format!("{}x{} is empty", self.viewport_width, self.viewport_height),
            );
        }
        Ok(())
    }
}

impl Config {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.core.validate()?;
        if self.lod.merge_hysteresis <= 0.0 || self.lod.merge_hysteresis >= 1.0 {
            return Err(ConfigError::Invalid {
                field: "lod.merge_hysteresis",
                reason: format!("{} outside (0, 1)", self.lod.merge_hysteresis),
            });
        }
        if self.lod.max_level > MAX_TESSELLATION_LEVEL {
            return Err(ConfigError::Invalid {
                field: "lod.max_level",
                reason: format!("{} exceeds {MAX_TESSELLATION_LEVEL}", self.lod.max_level),
            });
        }
        for (field, lod) in [("lod.max_lod", self.lod.max_lod), ("data.max_lod", self.data.max_lod)] {
            if lod > MAX_PATCH_LOD {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{lod} exceeds {MAX_PATCH_LOD}"),
                });
            }
        }
        if self.data.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "data.queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let new_config = read_config(&config_path)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("lowest_app_magnitude: 6.0"));
        assert!(ron_str.contains("scene_manager: Region"));
    }

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(core: (min_body_size: 4.0), debug: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.core.min_body_size, 4.0);
        assert_eq!(config.core.max_fov, CoreConfig::default().max_fov);
        assert_eq!(config.lod, LodConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_fov() {
        let mut core = CoreConfig::default();
        core.min_fov = 90.0;
        core.max_fov = 30.0;
        let err = core.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "min_fov", .. }));
    }

    #[test]
    fn test_validate_rejects_non_positive_near() {
        let mut core = CoreConfig::default();
        core.near_plane = 0.0;
        assert!(matches!(
            core.validate(),
            Err(ConfigError::Invalid { field: "near_plane", .. })
        ));
        core.near_plane = f64::NAN;
        assert!(core.validate().is_err());
    }

    #[test]
    fn test_validate_finite_far_plane() {
        let mut core = CoreConfig::default();
        core.infinite_far_plane = false;
        core.far_plane = core.near_plane / 2.0;
        assert!(core.validate().is_err());
        core.far_plane = 1e9;
        assert!(core.validate().is_ok());
    }

    #[test]
    fn test_validate_merge_hysteresis() {
        let mut config = Config::default();
        config.lod.merge_hysteresis = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_caps_levels() {
        let mut config = Config::default();
        config.lod.max_level = MAX_TESSELLATION_LEVEL;
        config.lod.max_lod = MAX_PATCH_LOD;
        config.data.max_lod = MAX_PATCH_LOD;
        assert!(config.validate().is_ok());

        config.lod.max_level = 40;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "lod.max_level", .. })
        ));

        config.lod.max_level = 5;
        config.lod.max_lod = MAX_PATCH_LOD + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "lod.max_lod", .. })
        ));

        config.lod.max_lod = 20;
        config.data.max_lod = 200;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "data.max_lod", .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.core.scene_manager = SceneManagerKind::Dynamic;
        config.data.heightmap_filter = HeightmapFilter::Quintic;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.core.lowest_app_magnitude = 8.5;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().core.lowest_app_magnitude, 8.5);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
