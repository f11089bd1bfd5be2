//! File-backed reference implementation of [`CheckpointStore`]: one directory
//! per workflow, one file per checkpoint, atomic tempfile+fsync+rename
//! writes, JSON canonicalized per RFC 8785 (JCS) before it touches disk.
//!
//! Checkpoint files are named by their zero-padded sequence number so a
//! plain lexicographic directory listing is already the numeric order the
//! "latest checkpoint" lookup needs.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};

use sf_core::types::WorkflowId;
use sf_schema::workflow::WorkflowState;

use crate::error::{CheckpointError, CheckpointResult};
use crate::store::{CheckpointStore, WorkflowMetadata};

const SEQ_WIDTH: usize = 20;

pub struct FileStore {
    root: Utf8PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn workflow_dir(&self, workflow_id: &WorkflowId) -> Utf8PathBuf {
        self.root.join(workflow_id.as_str())
    }

    fn checkpoints_dir(&self, workflow_id: &WorkflowId) -> Utf8PathBuf {
        self.workflow_dir(workflow_id).join("checkpoints")
    }

    fn checkpoint_path(&self, workflow_id: &WorkflowId, seq: u64) -> Utf8PathBuf {
        self.checkpoints_dir(workflow_id)
            .join(format!("{seq:0width$}.json", width = SEQ_WIDTH))
    }

    fn metadata_path(&self, workflow_id: &WorkflowId) -> Utf8PathBuf {
        self.workflow_dir(workflow_id).join("metadata.json")
    }
}

fn canonical_json<T: serde::Serialize>(value: &T) -> CheckpointResult<String> {
    serde_json_canonicalizer::to_string(value).map_err(|e| CheckpointError::Serialize(e.to_string()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Utf8Path) -> CheckpointResult<T> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| CheckpointError::Deserialize(e.to_string()))
}

fn write_atomic(path: &Utf8Path, content: &str) -> CheckpointResult<()> {
    sf_core::atomic_write::write_file_atomic(path, content)
        .map_err(|e| CheckpointError::Io(std::io::Error::other(e.to_string())))?;
    Ok(())
}

fn seqs_in_dir(dir: &Utf8Path) -> CheckpointResult<Vec<u64>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut seqs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(".json") else { continue };
        if let Ok(seq) = stem.parse::<u64>() {
            seqs.push(seq);
        }
    }
    seqs.sort_unstable();
    Ok(seqs)
}

#[async_trait]
impl CheckpointStore for FileStore {
    async fn put_checkpoint(
        &self,
        workflow_id: &WorkflowId,
        seq: u64,
        snapshot: &WorkflowState,
    ) -> CheckpointResult<()> {
        let path = self.checkpoint_path(workflow_id, seq);
        let json = canonical_json(snapshot)?;
        let workflow_id = workflow_id.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &json))
            .await
            .map_err(|e| CheckpointError::Io(std::io::Error::other(e.to_string())))?
            .map_err(|e| {
                tracing::warn!(%workflow_id, seq, error = %e, "checkpoint write failed");
                e
            })
    }

    async fn get_checkpoint(
        &self,
        workflow_id: &WorkflowId,
        seq: Option<u64>,
    ) -> CheckpointResult<WorkflowState> {
        let dir = self.checkpoints_dir(workflow_id);
        let workflow_id = workflow_id.clone();
        tokio::task::spawn_blocking(move || {
            let existing = seqs_in_dir(&dir)?;
            if existing.is_empty() {
                return Err(CheckpointError::NoCheckpoints(workflow_id.clone()));
            }
            let seq = match seq {
                Some(seq) => seq,
                None => *existing.last().expect("checked non-empty above"),
            };
            let path = dir.join(format!("{seq:0width$}.json", width = SEQ_WIDTH));
            if !path.exists() {
                return Err(CheckpointError::SeqNotFound { workflow_id, seq });
            }
            read_json(&path)
        })
        .await
        .map_err(|e| CheckpointError::Io(std::io::Error::other(e.to_string())))?
    }

    async fn list_checkpoints(&self, workflow_id: &WorkflowId) -> CheckpointResult<Vec<u64>> {
        seqs_in_dir(&self.checkpoints_dir(workflow_id))
    }

    async fn put_workflow_metadata(&self, metadata: &WorkflowMetadata) -> CheckpointResult<()> {
        let path = self.metadata_path(&metadata.workflow_id);
        let json = canonical_json(metadata)?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &json))
            .await
            .map_err(|e| CheckpointError::Io(std::io::Error::other(e.to_string())))?
    }

    async fn get_workflow_metadata(&self, workflow_id: &WorkflowId) -> CheckpointResult<WorkflowMetadata> {
        let path = self.metadata_path(workflow_id);
        if !path.exists() {
            return Err(CheckpointError::NoMetadata(workflow_id.clone()));
        }
        read_json(&path)
    }

    async fn list_workflows(&self) -> CheckpointResult<Vec<WorkflowId>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(WorkflowId::new(name));
                }
            }
        }
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }

    async fn delete_workflow(&self, workflow_id: &WorkflowId) -> CheckpointResult<()> {
        let dir = self.workflow_dir(workflow_id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) | Err(_) if !dir.exists() => Ok(()),
            Err(e) => Err(CheckpointError::Io(e)),
        }
    }
}
