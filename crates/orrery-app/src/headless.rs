//! A renderer that validates and logs render commands instead of drawing.

use orrery_config::CoreConfig;
use orrery_debug::FrameStats;
use orrery_scene::{Frame, RenderPass, Renderer, RendererError};
use tracing::{debug, info, trace};

/// Shading language version the headless back end claims to support.
pub const HEADLESS_SHADER_VERSION: u32 = 450;

/// Checks each frame the way a GPU back end would consume it: passes in
/// `sort_index` order, depth slices inside `[0, 1]`, clip planes ordered.
#[derive(Debug)]
pub struct HeadlessRenderer {
    shader_version: u32,
    initialized: bool,
    color_picking: bool,
    frames: u64,
    passes: u64,
    last_stats: Option<FrameStats>,
}

impl HeadlessRenderer {
    pub fn new(shader_version: u32) -> Self {
        Self {
            shader_version,
            initialized: false,
            color_picking: false,
            frames: 0,
            passes: 0,
            last_stats: None,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn last_stats(&self) -> Option<&FrameStats> {
        self.last_stats.as_ref()
    }

    fn check_pass(&self, index: usize, pass: &RenderPass) -> Result<(), String> {
        if pass.sort_index as usize != index {
            return Err(format!("out of order at position {index}"));
        }
        if pass.depth_range.min() < 0.0 || pass.depth_range.max() > 1.0 {
            return Err(format!("depth range {:?} outside [0, 1]", pass.depth_range));
        }
        if let Some(far) = pass.lens.far
            && far <= pass.lens.near
        {
            return Err(format!("far plane {far} not beyond near plane {}", pass.lens.near));
        }
        if self.color_picking && pass.nodes.iter().any(|n| n.oid_color.is_none()) {
            return Err("node without object id color".to_string());
        }
        Ok(())
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new(HEADLESS_SHADER_VERSION)
    }
}

impl Renderer for HeadlessRenderer {
    fn init(&mut self, config: &CoreConfig) -> Result<(), RendererError> {
        if config.shader_min_version > self.shader_version {
            return Err(RendererError::ShaderVersion {
                required: config.shader_min_version,
                available: self.shader_version,
            });
        }
        self.color_picking = config.color_picking;
        self.initialized = true;
        info!(
            shader_version = self.shader_version,
            color_picking = self.color_picking,
            "headless renderer ready"
        );
        Ok(())
    }

    fn render(&mut self, frame: &Frame) -> Result<(), RendererError> {
        if !self.initialized {
            return Err(RendererError::Init("render called before init".to_string()));
        }
        for (index, pass) in frame.passes.iter().enumerate() {
            self.check_pass(index, pass)
                .map_err(|reason| RendererError::Pass {
                    sort_index: pass.sort_index,
                    reason,
                })?;
            trace!(
                sort_index = pass.sort_index,
                kind = ?pass.kind,
                near = pass.near,
                far = pass.far,
                nodes = pass.nodes.len(),
                points = pass.points.len(),
                "pass"
            );
        }
        for surface in &frame.surfaces {
            trace!(
                anchor = surface.anchor.0,
                patches = surface.patches.len(),
                refresh = surface.refresh.len(),
                "surface"
            );
        }
        self.frames += 1;
        self.passes += frame.passes.len() as u64;
        self.last_stats = Some(frame.stats.clone());
        Ok(())
    }

    fn shutdown(&mut self) {
        debug!(frames = self.frames, passes = self.passes, "headless renderer shut down");
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use orrery_anchor::Lens;
    use orrery_scene::{DepthRange, RegionKind};

    use super::*;

    fn pass(sort_index: u32, depth_range: DepthRange) -> RenderPass {
        RenderPass {
            kind: RegionKind::Whole,
            near: 1.0,
            far: 10.0,
            lens: Lens::from_config(&CoreConfig::default()).with_clip(0.99, Some(10.1)),
            depth_range,
            sort_index,
            nodes: Vec::new(),
            points: Vec::new(),
        }
    }

    fn frame(passes: Vec<RenderPass>) -> Frame {
        Frame {
            visible: Vec::new(),
            passes,
            surfaces: Vec::new(),
            stats: FrameStats::default(),
        }
    }

    #[test]
    fn test_init_rejects_newer_shaders() {
        let mut renderer = HeadlessRenderer::new(330);
        let config = CoreConfig {
            shader_min_version: 450,
            ..CoreConfig::default()
        };
        let err = renderer.init(&config).unwrap_err();
        assert!(matches!(
            err,
            RendererError::ShaderVersion {
                required: 450,
                available: 330
            }
        ));
    }

    #[test]
    fn test_render_before_init_fails() {
        let mut renderer = HeadlessRenderer::default();
        assert!(matches!(renderer.render(&frame(Vec::new())), Err(RendererError::Init(_))));
    }

    #[test]
    fn test_render_counts_passes() {
        let mut renderer = HeadlessRenderer::default();
        renderer.init(&CoreConfig::default()).unwrap();
        let passes = vec![pass(0, DepthRange::slice(0, 2, true)), pass(1, DepthRange::slice(1, 2, true))];
        renderer.render(&frame(passes)).unwrap();
        assert_eq!(renderer.frames(), 1);
        assert_eq!(renderer.passes(), 2);
        assert!(renderer.last_stats().is_some());
    }

    #[test]
    fn test_out_of_order_pass_is_rejected() {
        let mut renderer = HeadlessRenderer::default();
        renderer.init(&CoreConfig::default()).unwrap();
        let passes = vec![pass(1, DepthRange::FULL)];
        let err = renderer.render(&frame(passes)).unwrap_err();
        assert!(matches!(err, RendererError::Pass { sort_index: 1, .. }));
        assert_eq!(renderer.frames(), 0);
    }
}
