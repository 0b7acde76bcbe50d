/*!
 * Full-snapshot persistence of the segment list.
 */

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::model::SegmentList;
use crate::errors::CheckpointError;
use crate::file_utils::FileManager;

/// File name of the structure snapshot inside a project directory
pub const STRUCTURE_FILE: &str = "structure_map.json";

#[derive(Serialize)]
struct StructureRecordRef<'a> {
    document_hash: &'a str,
    updated_at: String,
    segments: &'a SegmentList,
}

#[derive(Deserialize)]
struct StructureRecord {
    document_hash: String,
    segments: SegmentList,
}

/// Reads and writes `structure_map.json`
#[derive(Debug, Clone)]
pub struct StructureStore {
    path: PathBuf,
    document_hash: String,
}

impl StructureStore {
    pub fn new(project_dir: &Path, document_hash: &str) -> Self {
        Self {
            path: project_dir.join(STRUCTURE_FILE),
            document_hash: document_hash.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached segment list.
    ///
    /// Returns `None` when the snapshot is missing, unreadable, belongs to other
    /// content, is empty or breaks a segment invariant.
    pub fn load(&self) -> Option<SegmentList> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Cannot read structure cache {}: {}", self.path.display(), e);
                }
                return None;
            }
        };

        let record: StructureRecord = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!("Structure cache {} is corrupt, re-segmenting: {}", self.path.display(), e);
                return None;
            }
        };

        if record.document_hash != self.document_hash {
            debug!("Structure cache belongs to different content");
            return None;
        }
        if record.segments.is_empty() {
            return None;
        }
        if let Err(e) = record.segments.validate() {
            warn!("Structure cache rejected: {}", e);
            return None;
        }

        Some(record.segments)
    }

    /// Serialize the snapshot without touching the disk
    pub fn encode(&self, segments: &SegmentList) -> Result<Vec<u8>, CheckpointError> {
        let record = StructureRecordRef {
            document_hash: &self.document_hash,
            updated_at: Utc::now().to_rfc3339(),
            segments,
        };
        Ok(serde_json::to_vec_pretty(&record)?)
    }

    /// Rewrite the whole snapshot atomically
    pub fn save(&self, segments: &SegmentList) -> Result<(), CheckpointError> {
        let json = self.encode(segments)?;
        FileManager::write_atomic(&self.path, &json).map_err(|source| CheckpointError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}
