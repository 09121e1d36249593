//! Headless host for the Orrery core.
//!
//! Resolves platform directories, builds a deterministic demo universe, and
//! drives it with a fixed-timestep loop that hands every frame to a
//! [`Renderer`](orrery_scene::Renderer).

pub mod demo;
pub mod frame_loop;
pub mod headless;
pub mod platform;
