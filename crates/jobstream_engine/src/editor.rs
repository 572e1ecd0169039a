use jobstream_core::{DraftHistory, JobId};
use thiserror::Error;

use crate::drafts::DraftStore;
use crate::persist::PersistError;
use crate::rest::{ApiError, GatewayClient, JobVersion};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("edited result is not valid JSON: {0}")]
    InvalidJson(String),
}

/// How the job result maps to editable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// A JSON string; edited verbatim.
    Text,
    /// Any other JSON value; edited as pretty-printed JSON.
    Json,
}

/// Result text under edit: undo history in memory, draft mirrored on disk.
#[derive(Debug)]
pub struct ResultEditor {
    job_id: JobId,
    kind: ResultKind,
    history: DraftHistory,
    store: DraftStore,
}

impl ResultEditor {
    /// Starts from the saved result, picking up a local draft if one survived.
    pub fn open(
        job_id: JobId,
        saved: Option<&serde_json::Value>,
        store: DraftStore,
    ) -> Result<Self, EditorError> {
        let (kind, baseline) = result_to_text(saved)?;
        let history = match store.load(&job_id)? {
            Some(draft) if draft.content != baseline => {
                DraftHistory::restored(baseline, draft.content)
            }
            Some(_) => {
                store.clear(&job_id)?;
                DraftHistory::new(baseline)
            }
            None => DraftHistory::new(baseline),
        };
        Ok(Self {
            job_id,
            kind,
            history,
            store,
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        self.history.current()
    }

    pub fn is_dirty(&self) -> bool {
        self.history.is_dirty()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn edit(&mut self, text: impl Into<String>) -> Result<(), EditorError> {
        if self.history.edit(text) {
            self.sync_draft()?;
        }
        Ok(())
    }

    /// Undo and redo history lives in memory only. A host that reopens the
    /// editor per command (like the CLI) can step back to the saved text once;
    /// hosts that keep the editor alive get the full history.
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let moved = self.history.undo();
        if moved {
            self.sync_draft()?;
        }
        Ok(moved)
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let moved = self.history.redo();
        if moved {
            self.sync_draft()?;
        }
        Ok(moved)
    }

    /// Sends the current text to the backend; the local draft is cleared only
    /// after the backend accepted it.
    pub async fn save(&mut self, client: &GatewayClient) -> Result<JobVersion, EditorError> {
        let value = self.current_value()?;
        let version = client.save_result(&self.job_id, &value).await?;
        self.history.mark_saved();
        self.store.clear(&self.job_id)?;
        Ok(version)
    }

    pub fn discard(&mut self) -> Result<(), EditorError> {
        self.history.discard();
        self.store.clear(&self.job_id)?;
        Ok(())
    }

    /// Adopts a result that changed remotely (e.g. a restored version).
    pub fn rebase(&mut self, saved: Option<&serde_json::Value>) -> Result<(), EditorError> {
        let (kind, baseline) = result_to_text(saved)?;
        self.kind = kind;
        self.history.rebase(baseline);
        self.store.clear(&self.job_id)?;
        Ok(())
    }

    fn current_value(&self) -> Result<serde_json::Value, EditorError> {
        match self.kind {
            ResultKind::Text => Ok(serde_json::Value::String(self.text().to_string())),
            ResultKind::Json => serde_json::from_str(self.text())
                .map_err(|err| EditorError::InvalidJson(err.to_string())),
        }
    }

    fn sync_draft(&self) -> Result<(), EditorError> {
        if self.history.is_dirty() {
            self.store.save(&self.job_id, self.history.current())?;
        } else {
            self.store.clear(&self.job_id)?;
        }
        Ok(())
    }
}

fn result_to_text(saved: Option<&serde_json::Value>) -> Result<(ResultKind, String), EditorError> {
    match saved {
        None | Some(serde_json::Value::Null) => Ok((ResultKind::Text, String::new())),
        Some(serde_json::Value::String(text)) => Ok((ResultKind::Text, text.clone())),
        Some(other) => serde_json::to_string_pretty(other)
            .map(|text| (ResultKind::Json, text))
            .map_err(|err| EditorError::InvalidJson(err.to_string())),
    }
}
