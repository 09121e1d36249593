//! Point sprites for unresolved anchors and object-id picking colors.

use glam::DVec3;
use orrery_anchor::{Anchor, AnchorId};
use orrery_config::CoreConfig;

/// Largest sprite drawn, pixels.
const MAX_SPRITE_PX: f32 = 8.0;

/// An anchor too small to resolve, drawn as a dot.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSprite {
    pub anchor: AnchorId,
    /// Camera-relative position in scene units.
    pub scene_pos: DVec3,
    pub color: [f32; 4],
    /// Diameter in pixels.
    pub size: f32,
    pub oid_color: Option<[u8; 4]>,
    /// Bright enough to carry a label.
    pub label: bool,
}

impl PointSprite {
    /// Size and opacity grow with brightness above the magnitude limit.
    pub fn new(anchor: &Anchor, config: &CoreConfig) -> Self {
        let margin = (config.lowest_app_magnitude - anchor.state.app_magnitude).max(0.0) as f32;
        let size = (1.0 + 0.4 * margin).min(MAX_SPRITE_PX);
        let alpha = (0.25 + 0.75 * margin).min(1.0);
        let [r, g, b] = anchor.color;
        Self {
            anchor: anchor.id,
            scene_pos: anchor.state.rel_position / config.world_scale,
            color: [r, g, b, alpha],
            size,
            oid_color: config.color_picking.then(|| oid_color(anchor.id)),
            label: anchor.state.app_magnitude
                <= config.lowest_app_magnitude - config.label_magnitude_offset,
        }
    }
}

/// Color written to the picking target for `id`. Zero stays free for "no
/// object".
pub fn oid_color(id: AnchorId) -> [u8; 4] {
    let v = id.0.wrapping_add(1);
    [v as u8, (v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8]
}

pub fn anchor_from_oid(color: [u8; 4]) -> Option<AnchorId> {
    let v = u32::from_le_bytes(color);
    v.checked_sub(1).map(AnchorId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_round_trip() {
        for id in [0, 1, 255, 256, 70_000, u32::MAX - 1] {
            assert_eq!(anchor_from_oid(oid_color(AnchorId(id))), Some(AnchorId(id)));
        }
        assert_eq!(anchor_from_oid([0; 4]), None);
    }
}
