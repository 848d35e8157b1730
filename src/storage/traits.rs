use crate::common::error::{PipelineError, Result};
use crate::domain::RawRecord;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A stored row. Typed records go through serde on the way in and out.
pub type Row = Value;

/// Read side of the raw staging area populated by the external bulk loader
#[async_trait]
pub trait RawStagingStore: Send + Sync {
    /// All raw rows for a source entity, in no guaranteed order
    async fn read(&self, entity: &str) -> Result<Vec<RawRecord>>;
}

/// Metadata about a committed relation version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationVersion {
    pub relation: String,
    /// Increments with every successful replace on this store instance
    pub version: u64,
    pub row_count: usize,
    /// SHA-256 over the canonical NDJSON rendering of the rows
    pub fingerprint: String,
}

/// Conformed and published stores share this contract.
///
/// `replace` builds the new relation contents off to the side and swaps them in
/// as a single step, so `read` observes either the previous committed version
/// or the new one, never a partial write.
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Human-readable store name used in logs and errors
    fn name(&self) -> &str;

    async fn replace(&self, relation: &str, rows: Vec<Row>) -> Result<RelationVersion>;

    async fn read(&self, relation: &str) -> Result<Vec<Row>>;

    /// Current committed version of a relation, if it was ever published
    async fn version(&self, relation: &str) -> Result<Option<RelationVersion>>;

    /// Claim exclusive write access for one run. The claim is released when the
    /// guard drops; a second claim while one is held fails with `RunInProgress`.
    fn try_begin_run(&self) -> Result<RunGuard>;
}

/// Releases a store's run claim on drop
pub struct RunGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl RunGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for RunGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunGuard")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Canonical fingerprint of a relation's contents.
/// Object keys serialize in sorted order, so equal rows hash equally.
pub fn fingerprint_rows(rows: &[Row]) -> Result<String> {
    let mut hasher = Sha256::new();
    for row in rows {
        hasher.update(serde_json::to_string(row)?.as_bytes());
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Read a relation and deserialize every row into `T`
pub async fn read_records<T: DeserializeOwned>(
    store: &dyn RelationStore,
    relation: &str,
) -> Result<Vec<T>> {
    let rows = store.read(relation).await?;
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            serde_json::from_value(row)
                .map_err(|e| PipelineError::schema(relation, format!("row {}: {}", index, e)))
        })
        .collect()
}

/// Serialize typed records and replace the relation with them
pub async fn replace_records<T: Serialize>(
    store: &dyn RelationStore,
    relation: &str,
    records: &[T],
) -> Result<RelationVersion> {
    let rows = records
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::write(relation, e))?;
    store.replace(relation, rows).await
}
