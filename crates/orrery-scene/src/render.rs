use orrery_config::CoreConfig;

use crate::{Frame, RendererError};

/// Consumer of the per-frame render commands.
pub trait Renderer {
    /// Called once before the first frame.
    fn init(&mut self, config: &CoreConfig) -> Result<(), RendererError>;

    /// Draw every pass of `frame` in `sort_index` order.
    fn render(&mut self, frame: &Frame) -> Result<(), RendererError>;

    fn shutdown(&mut self) {}
}
