//! Where patch textures come from.

use std::path::{Path, PathBuf};

use orrery_lod::PatchId;
use serde::{Deserialize, Serialize};

use crate::LoadError;

/// fBm noise settings of a procedural source, stored as RON in a `.proc`
/// file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProceduralParams {
    pub seed: u32,
    pub octaves: u32,
    /// Frequency of the first octave, in cycles per body radius.
    pub frequency: f64,
    pub lacunarity: f64,
    pub persistence: f64,
    /// Edge size of generated tiles in texels.
    pub size: u32,
    pub max_lod: u8,
}

impl Default for ProceduralParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 6,
            frequency: 2.0,
            lacunarity: 2.0,
            persistence: 0.5,
            size: 64,
            max_lod: 12,
        }
    }
}

/// Texture source of a surface layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    /// One image covering the whole surface root.
    File(PathBuf),
    /// A tile pyramid; `template` holds `{face}`, `{lod}`, `{x}` and `{y}`
    /// placeholders.
    Virtual { template: String, max_lod: u8 },
    /// Tiles synthesized from noise.
    Procedural(ProceduralParams),
}

impl TextureSource {
    /// Pick the source kind from a path: `.proc` files describe procedural
    /// sources, paths with a `{lod}` placeholder are tile pyramids, anything
    /// else is a single image.
    pub fn from_spec(spec: &str, max_lod: u8) -> Result<Self, LoadError> {
        let path = Path::new(spec);
        if path.extension().is_some_and(|e| e == "proc") {
            let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let params: ProceduralParams = ron::from_str(&contents)?;
            return Ok(TextureSource::Procedural(params));
        }
        if spec.contains("{lod}") {
            return Ok(TextureSource::Virtual {
                template: spec.to_string(),
                max_lod,
            });
        }
        Ok(TextureSource::File(path.to_path_buf()))
    }

    /// Deepest level this source provides data for.
    pub fn max_lod(&self) -> u8 {
        match self {
            TextureSource::File(_) => 0,
            TextureSource::Virtual { max_lod, .. } => *max_lod,
            TextureSource::Procedural(p) => p.max_lod,
        }
    }

    /// File backing the data of patch `id`, when the source is file based.
    pub fn path_for(&self, id: PatchId) -> Option<PathBuf> {
        match self {
            TextureSource::File(path) => Some(path.clone()),
            TextureSource::Virtual { template, .. } => Some(PathBuf::from(
                template
                    .replace("{face}", &id.face.to_string())
                    .replace("{lod}", &id.lod.to_string())
                    .replace("{x}", &id.x.to_string())
                    .replace("{y}", &id.y.to_string()),
            )),
            TextureSource::Procedural(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TextureSource::File(path) => path.display().to_string(),
            TextureSource::Virtual { template, .. } => template.clone(),
            TextureSource::Procedural(p) => format!("procedural(seed {})", p.seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_picks_kind() {
        assert_eq!(
            TextureSource::from_spec("earth.png", 9).unwrap(),
            TextureSource::File(PathBuf::from("earth.png"))
        );
        let tiles = TextureSource::from_spec("tiles/{face}/{lod}/{x}_{y}.png", 9).unwrap();
        assert_eq!(tiles.max_lod(), 9);
        assert_eq!(
            tiles.path_for(PatchId { face: 2, lod: 3, x: 5, y: 1 }),
            Some(PathBuf::from("tiles/2/3/5_1.png"))
        );
    }

    #[test]
    fn test_factory_reads_procedural_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moon.proc");
        std::fs::write(&path, "(seed: 7, octaves: 3)").unwrap();
        let source = TextureSource::from_spec(path.to_str().unwrap(), 9).unwrap();
        let TextureSource::Procedural(params) = source else {
            panic!("expected procedural source");
        };
        assert_eq!(params.seed, 7);
        assert_eq!(params.octaves, 3);
        assert_eq!(params.size, ProceduralParams::default().size);
    }

    #[test]
    fn test_missing_procedural_file_is_io_error() {
        let err = TextureSource::from_spec("/nonexistent/x.proc", 0).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_single_file_covers_root_only() {
        assert_eq!(TextureSource::File("a.png".into()).max_lod(), 0);
    }
}
