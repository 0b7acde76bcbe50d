/*!
 * Durable per-segment completion record.
 *
 * The checkpoint lives next to the structure snapshot in the document's
 * project directory and is always rewritten as a whole, so a file left
 * behind by an interrupted run can be read back in full.
 */

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::document::model::{ContentSegment, SegmentList};
use crate::errors::CheckpointError;
use crate::file_utils::FileManager;
use crate::session::models::{FailedSegment, ProgressStats, ResumeOutcome, SegmentStatus};

/// File name of the checkpoint inside a project directory
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Serialized checkpoint content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Hash of the document this checkpoint belongs to
    pub document_hash: String,
    /// When this checkpoint was started
    pub start_time: String,
    /// Ids translated successfully
    #[serde(default)]
    pub completed_segments: BTreeSet<u64>,
    /// Last failure per id
    #[serde(default)]
    pub failed_segments: Vec<FailedSegment>,
    /// Segment count of the document
    #[serde(default)]
    pub total_segments: usize,
    /// Time of the last write
    #[serde(default)]
    pub last_update: String,
}

impl CheckpointState {
    fn new(document_hash: &str) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            document_hash: document_hash.to_string(),
            start_time: now.clone(),
            completed_segments: BTreeSet::new(),
            failed_segments: Vec::new(),
            total_segments: 0,
            last_update: now,
        }
    }
}

/// Checkpoint store bound to one document
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: CheckpointState,
}

impl CheckpointStore {
    /// Open the checkpoint in `project_dir`, starting fresh when it is missing,
    /// unreadable or belongs to other content
    pub fn open(project_dir: &Path, document_hash: &str) -> (Self, ResumeOutcome) {
        let path = project_dir.join(CHECKPOINT_FILE);

        let (state, outcome) = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (CheckpointState::new(document_hash), ResumeOutcome::Fresh)
            }
            Err(e) => {
                warn!("Cannot read checkpoint {}: {}", path.display(), e);
                (CheckpointState::new(document_hash), ResumeOutcome::Corrupt(e.to_string()))
            }
            Ok(content) => match serde_json::from_str::<CheckpointState>(&content) {
                Ok(state) if state.document_hash == document_hash => {
                    let outcome = ResumeOutcome::Resumed {
                        completed: state.completed_segments.len(),
                        failed: state.failed_segments.len(),
                    };
                    (state, outcome)
                }
                Ok(_) => {
                    info!("Checkpoint belongs to different content, starting over");
                    (CheckpointState::new(document_hash), ResumeOutcome::DocumentChanged)
                }
                Err(e) => {
                    warn!("Checkpoint {} is corrupt, starting over: {}", path.display(), e);
                    (CheckpointState::new(document_hash), ResumeOutcome::Corrupt(e.to_string()))
                }
            },
        };

        (Self { path, state }, outcome)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    /// Record the number of segments in the document
    pub fn register_total(&mut self, total: usize) {
        self.state.total_segments = total;
    }

    pub fn mark_completed(&mut self, segment_id: u64) {
        self.state.completed_segments.insert(segment_id);
        self.state.failed_segments.retain(|f| f.segment_id != segment_id);
    }

    pub fn mark_failed(&mut self, segment_id: u64, reason: impl Into<String>) {
        self.state.completed_segments.remove(&segment_id);
        self.state.failed_segments.retain(|f| f.segment_id != segment_id);
        self.state.failed_segments.push(FailedSegment {
            segment_id,
            error: reason.into(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    pub fn status(&self, segment_id: u64) -> SegmentStatus {
        if self.state.completed_segments.contains(&segment_id) {
            return SegmentStatus::Completed;
        }
        match self.state.failed_segments.iter().find(|f| f.segment_id == segment_id) {
            Some(failed) => SegmentStatus::Failed(failed.error.clone()),
            None => SegmentStatus::Pending,
        }
    }

    /// Segments that still need translating, in document order.
    ///
    /// A segment is pending when its id is not completed, or when it is marked
    /// completed but its text is empty or a failure placeholder. Such stale
    /// completions are dropped from the record.
    pub fn get_pending<'a>(&mut self, segments: &'a SegmentList) -> Vec<&'a ContentSegment> {
        let mut pending = Vec::new();
        let mut demoted = 0;

        for segment in segments {
            let completed = self.state.completed_segments.contains(&segment.segment_id);
            if completed && !segment.is_translated() {
                self.state.completed_segments.remove(&segment.segment_id);
                demoted += 1;
                pending.push(segment);
            } else if !completed {
                pending.push(segment);
            }
        }

        if demoted > 0 {
            debug!("{} completed segments carried no usable translation", demoted);
        }
        pending
    }

    pub fn progress_stats(&self) -> ProgressStats {
        let total = self.state.total_segments;
        let completed = self.state.completed_segments.len();
        ProgressStats {
            total,
            completed,
            failed: self.state.failed_segments.len(),
            pending: total.saturating_sub(completed),
        }
    }

    /// Forget all progress
    pub fn reset(&mut self) {
        let total = self.state.total_segments;
        self.state = CheckpointState::new(&self.state.document_hash);
        self.state.total_segments = total;
    }

    /// Stamp the update time and serialize the state without touching the disk
    pub fn encode(&mut self) -> Result<Vec<u8>, CheckpointError> {
        self.state.last_update = Utc::now().to_rfc3339();
        Ok(serde_json::to_vec_pretty(&self.state)?)
    }

    /// Write the checkpoint atomically
    pub fn persist(&mut self) -> Result<(), CheckpointError> {
        let json = self.encode()?;
        FileManager::write_atomic(&self.path, &json).map_err(|source| CheckpointError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}
