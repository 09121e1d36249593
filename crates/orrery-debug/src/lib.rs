//! Diagnostics for the Orrery core.
//!
//! Invariant violations detected while building a frame are reported on a
//! structured channel instead of aborting the frame; per-frame counters are
//! collected into a serializable [`FrameStats`] snapshot.

mod diagnostic;
mod stats;

pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSink, Subject, diagnostic_channel};
pub use stats::{DebugError, FrameStats};
