//! CPU-side patch textures.

use crate::LoadError;

/// Raw texels. Heightmaps keep their 16-bit samples untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum TexelData {
    Gray16(Vec<u16>),
    Rgba8(Vec<u8>),
}

/// A decoded patch texture.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchTexture {
    pub width: u32,
    pub height: u32,
    pub srgb: bool,
    pub data: TexelData,
}

/// Height statistics of a heightmap, in normalized units `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl PatchTexture {
    pub fn gray16(width: u32, height: u32, samples: Vec<u16>) -> Result<Self, LoadError> {
        if width == 0 || height == 0 || samples.len() != (width * height) as usize {
            return Err(LoadError::BadDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            srgb: false,
            data: TexelData::Gray16(samples),
        })
    }

    pub fn rgba8(width: u32, height: u32, srgb: bool, texels: Vec<u8>) -> Result<Self, LoadError> {
        if width == 0 || height == 0 || texels.len() != (width * height * 4) as usize {
            return Err(LoadError::BadDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            srgb,
            data: TexelData::Rgba8(texels),
        })
    }

    /// Flat zero-height stand-in.
    pub fn default_height() -> Self {
        Self {
            width: 1,
            height: 1,
            srgb: false,
            data: TexelData::Gray16(vec![0]),
        }
    }

    /// Opaque white stand-in.
    pub fn default_color() -> Self {
        Self {
            width: 1,
            height: 1,
            srgb: true,
            data: TexelData::Rgba8(vec![255; 4]),
        }
    }

    pub fn is_heightmap(&self) -> bool {
        matches!(self.data, TexelData::Gray16(_))
    }

    /// Normalized height of texel `(x, y)`, clamped to the edges. Color
    /// textures report their red channel.
    pub fn height_texel(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        let i = y * self.width as usize + x;
        match &self.data {
            TexelData::Gray16(s) => s[i] as f32 / u16::MAX as f32,
            TexelData::Rgba8(t) => t[i * 4] as f32 / u8::MAX as f32,
        }
    }

    /// RGBA of texel `(x, y)`; heightmaps are expanded to gray.
    pub fn color_texel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let i = y * self.width as usize + x;
        match &self.data {
            TexelData::Gray16(s) => {
                let g = (s[i] >> 8) as u8;
                [g, g, g, 255]
            }
            TexelData::Rgba8(t) => [t[i * 4], t[i * 4 + 1], t[i * 4 + 2], t[i * 4 + 3]],
        }
    }

    pub fn height_stats(&self) -> Option<HeightStats> {
        let TexelData::Gray16(samples) = &self.data else {
            return None;
        };
        let mut min = u16::MAX;
        let mut max = 0u16;
        let mut sum = 0u64;
        for &s in samples {
            min = min.min(s);
            max = max.max(s);
            sum += s as u64;
        }
        let scale = u16::MAX as f32;
        Some(HeightStats {
            min: min as f32 / scale,
            max: max as f32 / scale,
            mean: (sum as f64 / samples.len() as f64) as f32 / scale,
        })
    }
}
