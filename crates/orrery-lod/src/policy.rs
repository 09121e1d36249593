use orrery_config::LodConfig;

use crate::Patch;

/// Per-patch level-of-detail decisions, evaluated once per frame with the
/// patch's `apparent_size` in pixels and `distance` in metres.
pub trait LodPolicy {
    fn should_split(&self, patch: &Patch, apparent_size: f64, distance: f64) -> bool;

    /// Asked of a parent whose children are all leaves.
    fn should_merge(&self, patch: &Patch, apparent_size: f64, distance: f64) -> bool;

    fn should_remove(&self, patch: &Patch, apparent_size: f64, distance: f64) -> bool;

    fn should_instanciate(&self, patch: &Patch, apparent_size: f64, distance: f64) -> bool;
}

/// Splits patches larger than a pixel threshold, merges below a fraction of
/// it, and shows exactly the patches that pass culling.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSpacePolicy {
    pub split_threshold_px: f64,
    pub merge_hysteresis: f64,
    pub max_lod: u8,
}

impl ScreenSpacePolicy {
    pub fn from_config(config: &LodConfig) -> Self {
        Self {
            split_threshold_px: config.split_threshold_px,
            merge_hysteresis: config.merge_hysteresis,
            max_lod: config.max_lod,
        }
    }
}

impl LodPolicy for ScreenSpacePolicy {
    fn should_split(&self, patch: &Patch, apparent_size: f64, _distance: f64) -> bool {
        patch.visible && patch.lod() < self.max_lod && apparent_size > self.split_threshold_px
    }

    fn should_merge(&self, patch: &Patch, apparent_size: f64, _distance: f64) -> bool {
        !patch.visible || apparent_size < self.split_threshold_px * self.merge_hysteresis
    }

    fn should_remove(&self, patch: &Patch, _apparent_size: f64, _distance: f64) -> bool {
        patch.shown && !patch.visible
    }

    fn should_instanciate(&self, patch: &Patch, _apparent_size: f64, _distance: f64) -> bool {
        !patch.shown && patch.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PatchId, Surface};

    fn patch(visible: bool) -> Patch {
        let surface = Surface::Flat { size: 10.0 };
        let id = PatchId::root(0);
        let mut p = Patch::new(id, None, surface.geometry(id, 0.0, 0.0));
        p.visible = visible;
        p
    }

    /// Split and merge thresholds leave a dead band between them.
    #[test]
    fn test_hysteresis_band() {
        let policy = ScreenSpacePolicy::from_config(&LodConfig::default());
        let p = patch(true);
        let t = policy.split_threshold_px;
        assert!(policy.should_split(&p, t * 1.1, 1.0));
        assert!(!policy.should_split(&p, t * 0.9, 1.0));
        assert!(!policy.should_merge(&p, t * 0.9, 1.0));
        assert!(policy.should_merge(&p, t * policy.merge_hysteresis * 0.9, 1.0));
    }

    #[test]
    fn test_culled_patches_are_hidden_and_merged() {
        let policy = ScreenSpacePolicy::from_config(&LodConfig::default());
        let mut p = patch(false);
        assert!(!policy.should_split(&p, 1e9, 1.0));
        assert!(policy.should_merge(&p, 1e9, 1.0));
        p.shown = true;
        assert!(policy.should_remove(&p, 0.0, 1.0));
        assert!(!policy.should_instanciate(&p, 0.0, 1.0));
    }
}
