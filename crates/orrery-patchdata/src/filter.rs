use orrery_config::HeightmapFilter;

use crate::PatchTexture;

/// Normalized height at texture coordinates `(u, v)` in `[0, 1]²`, where
/// `0` and `1` fall on the centers of the edge texels.
pub fn sample_height(texture: &PatchTexture, u: f64, v: f64, filter: HeightmapFilter) -> f32 {
    let x = u.clamp(0.0, 1.0) * (texture.width - 1) as f64;
    let y = v.clamp(0.0, 1.0) * (texture.height - 1) as f64;

    if filter == HeightmapFilter::Nearest {
        return texture.height_texel(x.round() as i64, y.round() as i64);
    }

    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (weight(x - x0, filter), weight(y - y0, filter));
    let (ix, iy) = (x0 as i64, y0 as i64);
    let h00 = texture.height_texel(ix, iy) as f64;
    let h10 = texture.height_texel(ix + 1, iy) as f64;
    let h01 = texture.height_texel(ix, iy + 1) as f64;
    let h11 = texture.height_texel(ix + 1, iy + 1) as f64;
    let bottom = h00 + (h10 - h00) * fx;
    let top = h01 + (h11 - h01) * fx;
    (bottom + (top - bottom) * fy) as f32
}

fn weight(t: f64, filter: HeightmapFilter) -> f64 {
    match filter {
        HeightmapFilter::Nearest | HeightmapFilter::Bilinear => t,
        HeightmapFilter::Smoothstep => t * t * (3.0 - 2.0 * t),
        HeightmapFilter::Quintic => t * t * t * (t * (t * 6.0 - 15.0) + 10.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> PatchTexture {
        PatchTexture::gray16(2, 1, vec![0, u16::MAX]).unwrap()
    }

    #[test]
    fn test_filters_agree_on_texel_centers() {
        for filter in [
            HeightmapFilter::Nearest,
            HeightmapFilter::Bilinear,
            HeightmapFilter::Smoothstep,
            HeightmapFilter::Quintic,
        ] {
            assert_eq!(sample_height(&step(), 0.0, 0.0, filter), 0.0);
            assert_eq!(sample_height(&step(), 1.0, 0.0, filter), 1.0);
            if filter != HeightmapFilter::Nearest {
                assert!((sample_height(&step(), 0.5, 0.0, filter) - 0.5).abs() < 1e-6);
            }
        }
    }

    /// Each filter weights an off-center sample differently.
    #[test]
    fn test_filters_differ_between_texels() {
        let at = |f| sample_height(&step(), 0.25, 0.0, f);
        let nearest = at(HeightmapFilter::Nearest);
        let linear = at(HeightmapFilter::Bilinear);
        let smooth = at(HeightmapFilter::Smoothstep);
        let quintic = at(HeightmapFilter::Quintic);
        assert_eq!(nearest, 0.0);
        assert!((linear - 0.25).abs() < 1e-6);
        assert!((smooth - 0.15625).abs() < 1e-6);
        assert!((quintic - 0.103515625).abs() < 1e-6);
    }
}
