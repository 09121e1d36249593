//! Decoding and synthesis of patch textures. Runs on loader threads.

use std::sync::Arc;

use glam::DVec3;
use noise::{NoiseFn, Simplex};
use orrery_lod::{PatchId, Surface};

use crate::{DataLayer, LoadError, PatchTexture, ProceduralParams, TextureSource};

/// Everything a loader needs to produce one patch texture.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub source: Arc<TextureSource>,
    pub surface: Surface,
    pub patch: PatchId,
    pub layer: DataLayer,
}

/// Produces patch textures from a source.
pub trait DataLoader: Send + Sync {
    fn load_texture(&self, request: &LoadRequest, srgb: bool) -> Result<PatchTexture, LoadError>;

    /// Heightmap samples are returned exactly as stored.
    fn load_heightmap(&self, request: &LoadRequest) -> Result<PatchTexture, LoadError>;

    fn load(&self, request: &LoadRequest) -> Result<PatchTexture, LoadError> {
        match request.layer {
            DataLayer::Heightmap => self.load_heightmap(request),
            DataLayer::Color => self.load_texture(request, true),
        }
    }
}

/// Loads image files with `image` and synthesizes procedural tiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceLoader;

impl DataLoader for SourceLoader {
    fn load_texture(&self, request: &LoadRequest, srgb: bool) -> Result<PatchTexture, LoadError> {
        if let TextureSource::Procedural(params) = &*request.source {
            let heights = procedural_heights(params, request);
            let mut texels = Vec::with_capacity(heights.len() * 4);
            for h in heights {
                texels.extend_from_slice(&ramp(h as f32 / u16::MAX as f32));
            }
            let n = params.size.max(2);
            return PatchTexture::rgba8(n, n, srgb, texels);
        }
        let path = request
            .source
            .path_for(request.patch)
            .ok_or_else(|| LoadError::Unsupported(request.source.describe()))?;
        let img = image::open(&path)?.to_rgba8();
        let (w, h) = img.dimensions();
        PatchTexture::rgba8(w, h, srgb, img.into_raw())
    }

    fn load_heightmap(&self, request: &LoadRequest) -> Result<PatchTexture, LoadError> {
        if let TextureSource::Procedural(params) = &*request.source {
            let n = params.size.max(2);
            return PatchTexture::gray16(n, n, procedural_heights(params, request));
        }
        let path = request
            .source
            .path_for(request.patch)
            .ok_or_else(|| LoadError::Unsupported(request.source.describe()))?;
        let img = image::open(&path)?.to_luma16();
        let (w, h) = img.dimensions();
        PatchTexture::gray16(w, h, img.into_raw())
    }
}

/// Heights over the patch rectangle, edge texels on the patch edges so that
/// neighbouring tiles agree along shared borders.
fn procedural_heights(params: &ProceduralParams, request: &LoadRequest) -> Vec<u16> {
    let noise = Simplex::new(params.seed);
    let n = params.size.max(2);
    let rect = request.patch.rect();
    let radius = request.surface.radius();
    let face = request.patch.face;

    let mut max_amplitude = 0.0;
    let mut amp = 1.0;
    for _ in 0..params.octaves {
        max_amplitude += amp;
        amp *= params.persistence;
    }
    let max_amplitude: f64 = if max_amplitude > 0.0 { max_amplitude } else { 1.0 };

    let mut samples = Vec::with_capacity((n * n) as usize);
    for j in 0..n {
        let y = rect.y0 + (rect.y1 - rect.y0) * j as f64 / (n - 1) as f64;
        for i in 0..n {
            let x = rect.x0 + (rect.x1 - rect.x0) * i as f64 / (n - 1) as f64;
            let p = request.surface.point(face, x, y, 0.0) / radius;
            let h = fbm(&noise, p, params) / max_amplitude;
            samples.push((((h + 1.0) * 0.5).clamp(0.0, 1.0) * u16::MAX as f64).round() as u16);
        }
    }
    samples
}

fn fbm(noise: &Simplex, p: DVec3, params: &ProceduralParams) -> f64 {
    let mut total = 0.0;
    let mut frequency = params.frequency;
    let mut amplitude = 1.0;
    for _ in 0..params.octaves {
        total += noise.get([p.x * frequency, p.y * frequency, p.z * frequency]) * amplitude;
        frequency *= params.lacunarity;
        amplitude *= params.persistence;
    }
    total
}

/// Lowland to highland color ramp.
fn ramp(h: f32) -> [u8; 4] {
    const LOW: [f32; 3] = [70.0, 62.0, 52.0];
    const HIGH: [f32; 3] = [232.0, 226.0, 214.0];
    let c = |i: usize| (LOW[i] + (HIGH[i] - LOW[i]) * h.clamp(0.0, 1.0)).round() as u8;
    [c(0), c(1), c(2), 255]
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_lod::Quadrant;

    fn request(patch: PatchId, layer: DataLayer) -> LoadRequest {
        LoadRequest {
            source: Arc::new(TextureSource::Procedural(ProceduralParams {
                seed: 3,
                size: 9,
                ..ProceduralParams::default()
            })),
            surface: Surface::CubeSphere { radius: 1000.0 },
            patch,
            layer,
        }
    }

    #[test]
    fn test_procedural_is_deterministic() {
        let id = PatchId::root(4).child(Quadrant::TopLeft);
        let a = SourceLoader.load(&request(id, DataLayer::Heightmap)).unwrap();
        let b = SourceLoader.load(&request(id, DataLayer::Heightmap)).unwrap();
        assert_eq!(a, b);
        assert_eq!((a.width, a.height), (9, 9));
    }

    /// Adjacent tiles produce identical samples along their shared edge.
    #[test]
    fn test_procedural_edges_match() {
        let root = PatchId::root(0);
        let left = SourceLoader
            .load_heightmap(&request(root.child(Quadrant::BottomLeft), DataLayer::Heightmap))
            .unwrap();
        let right = SourceLoader
            .load_heightmap(&request(root.child(Quadrant::BottomRight), DataLayer::Heightmap))
            .unwrap();
        for row in 0..9 {
            assert_eq!(left.height_texel(8, row), right.height_texel(0, row));
        }
    }

    #[test]
    fn test_procedural_color_layer() {
        let tex = SourceLoader
            .load(&request(PatchId::root(1), DataLayer::Color))
            .unwrap();
        assert!(!tex.is_heightmap());
        assert!(tex.srgb);
    }

    #[test]
    fn test_missing_file_fails() {
        let req = LoadRequest {
            source: Arc::new(TextureSource::File("/nonexistent/height.png".into())),
            ..request(PatchId::root(0), DataLayer::Heightmap)
        };
        assert!(SourceLoader.load(&req).is_err());
    }
}
