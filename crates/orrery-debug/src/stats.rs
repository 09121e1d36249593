use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors writing a statistics snapshot.
#[derive(Debug, thiserror::Error)]
pub enum DebugError {
    #[error("failed to serialize frame stats: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write frame stats: {0}")]
    Write(#[from] std::io::Error),
}

/// Counters for one frame of the core pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub frame_id: u64,
    pub sim_time: f64,
    pub visible_anchors: u32,
    pub resolved_anchors: u32,
    pub point_sprites: u32,
    pub regions: u32,
    pub patches_shown: u32,
    pub patches_split: u32,
    pub patches_merged: u32,
    pub loads_submitted: u32,
    pub loads_completed: u32,
    pub loads_in_flight: u32,
    pub loads_skipped: u32,
    pub diagnostics: u64,
}

impl FrameStats {
    pub fn to_json(&self) -> Result<String, DebugError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the snapshot as pretty JSON.
    pub fn export(&self, path: &Path) -> Result<(), DebugError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_json_fields() {
        let stats = FrameStats {
            frame_id: 42,
            regions: 4,
            ..Default::default()
        };
        let json = stats.to_json().unwrap();
        assert!(json.contains("\"frame_id\": 42"));
        assert!(json.contains("\"regions\": 4"));
    }

    #[test]
    fn test_export_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats").join("frame.json");
        let stats = FrameStats {
            frame_id: 3,
            patches_shown: 16,
            ..Default::default()
        };
        stats.export(&path).unwrap();
        let back: FrameStats =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, stats);
    }
}
