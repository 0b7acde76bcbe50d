/*!
 * Persisted run state.
 *
 * This module provides:
 * - The checkpoint store (per-segment completion and failure record)
 * - The structure snapshot of the segment list
 * - Progress reporting types
 */

pub mod checkpoint;
pub mod models;
pub mod structure;

// Re-export main types
pub use checkpoint::{CheckpointState, CheckpointStore};
pub use models::{FailedSegment, ProgressStats, ResumeOutcome, SegmentStatus};
pub use structure::StructureStore;
