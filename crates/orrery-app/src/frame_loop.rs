//! Fixed-timestep frame loop.
//!
//! Simulation advances in fixed steps of [`FIXED_DT`] wall seconds through an
//! accumulator; each frame is then built once at the interpolated simulation
//! time. A `time_scale` maps wall seconds to simulated seconds so orbits
//! visibly move in a short run.

use std::time::Instant;

use tracing::warn;

/// Fixed simulation step: 60 Hz.
pub const FIXED_DT: f64 = 1.0 / 60.0;

/// Longest wall-clock frame accepted; slower frames are clamped and the
/// simulation slows down instead of running dozens of catch-up steps.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// Timing handed to the render callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Progress into the next fixed step, in `[0, 1)`.
    pub alpha: f64,
    /// Simulated seconds at which to build the frame.
    pub sim_time: f64,
}

#[derive(Debug)]
pub struct FrameLoop {
    previous: Option<Instant>,
    accumulator: f64,
    /// Simulated seconds; advances `FIXED_DT * time_scale` per step.
    sim_time: f64,
    time_scale: f64,
    frame_count: u64,
    update_count: u64,
}

impl FrameLoop {
    pub fn new(time_scale: f64) -> Self {
        Self {
            previous: None,
            accumulator: 0.0,
            sim_time: 0.0,
            time_scale,
            frame_count: 0,
            update_count: 0,
        }
    }

    /// Measure the wall time since the previous tick and [`advance`](Self::advance) by it.
    pub fn tick(&mut self, update_fn: impl FnMut(f64, f64), render_fn: impl FnMut(FrameTime)) {
        let now = Instant::now();
        let frame_time = self
            .previous
            .map_or(0.0, |prev| now.duration_since(prev).as_secs_f64());
        self.previous = Some(now);
        self.advance(frame_time, update_fn, render_fn);
    }

    /// Run the fixed steps covered by `frame_time` wall seconds, then render once.
    ///
    /// `update_fn(dt, sim_time)` receives the simulated step length and the
    /// simulated time at the start of the step.
    pub fn advance(
        &mut self,
        frame_time: f64,
        mut update_fn: impl FnMut(f64, f64),
        mut render_fn: impl FnMut(FrameTime),
    ) {
        let mut frame_time = frame_time.max(0.0);
        if frame_time > MAX_FRAME_TIME {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            frame_time = MAX_FRAME_TIME;
        }
        self.accumulator += frame_time;

        let step = FIXED_DT * self.time_scale;
        while self.accumulator >= FIXED_DT {
            update_fn(step, self.sim_time);
            self.sim_time += step;
            self.accumulator -= FIXED_DT;
            self.update_count += 1;
        }

        let alpha = self.alpha();
        render_fn(FrameTime {
            alpha,
            sim_time: self.sim_time + alpha * step,
        });
        self.frame_count += 1;
    }

    pub fn alpha(&self) -> f64 {
        if self.accumulator > 0.0 {
            self.accumulator / FIXED_DT
        } else {
            0.0
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new(1.0)
    }
}
