use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

/// Class of invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// An anchor refers to a parent that does not exist.
    MissingParent,
    /// An anchor lies outside the octree cube it was assigned to.
    LeafOutsideCube,
    /// An orbit or rotation could not be evaluated.
    DynamicsFailed,
    /// Two neighbouring patches differ by more than one level.
    UnbalancedNeighbours,
    /// A patch neighbour set is not mirrored by the neighbour.
    AsymmetricNeighbours,
    /// A patch data load failed and ancestor data is shown instead.
    LoadFailed,
}

/// What the diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    Anchor(u32),
    OctreeNode(u32),
    Patch { face: u8, lod: u8, x: u32, y: u32 },
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Anchor(id) => write!(f, "anchor#{id}"),
            Subject::OctreeNode(id) => write!(f, "octree#{id}"),
            Subject::Patch { face, lod, x, y } => write!(f, "patch[{face}]{lod}/{x}/{y}"),
        }
    }
}

/// One structured report `{kind, subject, context}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub subject: Subject,
    pub context: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: Subject, context: impl Into<String>) -> Self {
        Self {
            kind,
            subject,
            context: context.into(),
        }
    }
}

/// Sending half of the diagnostic channel.
///
/// Reporting never blocks the simulation thread: when the channel is full or
/// nobody listens the report is still logged, then counted as dropped.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    sender: Option<Sender<Diagnostic>>,
    reported: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

/// Create a bounded diagnostic channel.
pub fn diagnostic_channel(capacity: usize) -> (DiagnosticSink, Receiver<Diagnostic>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let sink = DiagnosticSink {
        sender: Some(tx),
        ..Default::default()
    };
    (sink, rx)
}

impl DiagnosticSink {
    /// A sink with no receiver; reports are only logged.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        tracing::error!(
            kind = ?diagnostic.kind,
            subject = %diagnostic.subject,
            "{}",
            diagnostic.context
        );
        self.reported.fetch_add(1, Ordering::Relaxed);

        let Some(sender) = &self.sender else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        match sender.try_send(diagnostic) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Total reports since creation, including dropped ones.
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }

    /// Reports that could not be delivered.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_delivers() {
        let (sink, rx) = diagnostic_channel(4);
        sink.report(Diagnostic::new(
            DiagnosticKind::MissingParent,
            Subject::Anchor(7),
            "parent 99 does not exist",
        ));
        let d = rx.try_recv().unwrap();
        assert_eq!(d.kind, DiagnosticKind::MissingParent);
        assert_eq!(d.subject, Subject::Anchor(7));
        assert_eq!(sink.reported(), 1);
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let (sink, rx) = diagnostic_channel(1);
        for i in 0..3 {
            sink.report(Diagnostic::new(
                DiagnosticKind::LeafOutsideCube,
                Subject::Anchor(i),
                "",
            ));
        }
        assert_eq!(rx.len(), 1);
        assert_eq!(sink.reported(), 3);
        assert_eq!(sink.dropped(), 2);
    }

    #[test]
    fn test_detached_sink_counts_drops() {
        let sink = DiagnosticSink::detached();
        sink.report(Diagnostic::new(
            DiagnosticKind::LoadFailed,
            Subject::Patch { face: 2, lod: 3, x: 1, y: 4 },
            "missing tile",
        ));
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn test_subject_display() {
        let s = Subject::Patch { face: 2, lod: 3, x: 1, y: 4 };
        assert_eq!(s.to_string(), "patch[2]3/1/4");
        assert_eq!(Subject::Anchor(5).to_string(), "anchor#5");
    }

    #[test]
    fn test_diagnostic_serializes() {
        let d = Diagnostic::new(DiagnosticKind::UnbalancedNeighbours, Subject::OctreeNode(1), "x");
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("UnbalancedNeighbours"));
    }
}
