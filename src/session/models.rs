/*!
 * Checkpoint records and progress reporting types.
 */

use serde::{Deserialize, Serialize};

/// Status of one segment as seen by the checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentStatus {
    /// Not translated yet, or failed and waiting for another run
    Pending,
    /// Translated successfully
    Completed,
    /// Last attempt failed with the given reason
    Failed(String),
}

/// Failure record kept in the checkpoint file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedSegment {
    /// Segment id
    pub segment_id: u64,
    /// Error text of the last failed attempt
    pub error: String,
    /// RFC 3339 time of the failure
    pub timestamp: String,
}

/// Outcome of opening a checkpoint for a document
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    /// No checkpoint existed, a new one was started
    Fresh,
    /// A checkpoint for the same document was loaded
    Resumed {
        /// Segments already completed
        completed: usize,
        /// Segments recorded as failed
        failed: usize,
    },
    /// A checkpoint existed for other content and was discarded
    DocumentChanged,
    /// The checkpoint file could not be read and was discarded
    Corrupt(String),
}

impl ResumeOutcome {
    pub fn is_resumed(&self) -> bool {
        matches!(self, Self::Resumed { .. })
    }
}

/// Snapshot of translation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressStats {
    /// Segments known to the checkpoint
    pub total: usize,
    /// Completed segments
    pub completed: usize,
    /// Segments whose last attempt failed
    pub failed: usize,
    /// Segments still to do (includes failed ones)
    pub pending: usize,
}

impl ProgressStats {
    /// Calculate completion percentage
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }

    /// Whether every segment is completed
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

impl std::fmt::Display for ProgressStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} completed ({:.1}%), {} failed, {} pending",
            self.completed,
            self.total,
            self.completion_percentage(),
            self.failed,
            self.pending
        )
    }
}
