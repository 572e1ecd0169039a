use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use jobstream_core::JobId;
use jobstream_logging::{stream_info, stream_warn};
use serde::{Deserialize, Serialize};

use crate::filename::draft_filename;
use crate::persist::{AtomicFileWriter, PersistError};

/// Unsaved result edits for one job, kept on disk until saved or discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDraft {
    pub job_id: JobId,
    pub content: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DraftStore {
    writer: AtomicFileWriter,
}

impl DraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    pub fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.writer.dir().join(draft_filename(job_id))
    }

    /// Unreadable or foreign draft files are reported and treated as absent.
    pub fn load(&self, job_id: &JobId) -> Result<Option<StoredDraft>, PersistError> {
        let path = self.path_for(job_id);
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str::<StoredDraft>(&content) {
            Ok(draft) if &draft.job_id == job_id => Ok(Some(draft)),
            Ok(draft) => {
                stream_warn!(
                    "Draft file {:?} belongs to job {}, expected {}",
                    path,
                    draft.job_id,
                    job_id
                );
                Ok(None)
            }
            Err(err) => {
                stream_warn!("Failed to parse draft from {:?}: {}", path, err);
                Ok(None)
            }
        }
    }

    pub fn save(&self, job_id: &JobId, content: &str) -> Result<StoredDraft, PersistError> {
        let draft = StoredDraft {
            job_id: job_id.clone(),
            content: content.to_string(),
            saved_at: Utc::now(),
        };
        let encoded =
            serde_json::to_vec_pretty(&draft).map_err(|err| PersistError::Encode(err.to_string()))?;
        let path = self.writer.write(&draft_filename(job_id), &encoded)?;
        stream_info!("Saved draft for job {} to {:?}", job_id, path);
        Ok(draft)
    }

    /// Returns `false` when no draft existed.
    pub fn clear(&self, job_id: &JobId) -> Result<bool, PersistError> {
        let removed = self.writer.remove(&draft_filename(job_id))?;
        if removed {
            stream_info!("Cleared draft for job {}", job_id);
        }
        Ok(removed)
    }
}
