use super::traits::{fingerprint_rows, RawStagingStore, RelationStore, RelationVersion, Row, RunGuard};
use crate::common::error::{PipelineError, Result};
use crate::domain::RawRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// In-memory raw staging area for development/testing
#[derive(Default)]
pub struct InMemoryRawStagingStore {
    entities: RwLock<HashMap<String, Vec<RawRecord>>>,
}

impl InMemoryRawStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Land an extract for an entity, as the bulk loader would
    pub fn load(&self, entity: &str, records: Vec<RawRecord>) -> Result<()> {
        let mut entities = self
            .entities
            .write()
            .map_err(|_| PipelineError::write(entity, "raw staging lock poisoned"))?;
        debug!("Loaded {} raw rows into {}", records.len(), entity);
        entities.insert(entity.to_string(), records);
        Ok(())
    }
}

#[async_trait]
impl RawStagingStore for InMemoryRawStagingStore {
    async fn read(&self, entity: &str) -> Result<Vec<RawRecord>> {
        let entities = self
            .entities
            .read()
            .map_err(|_| PipelineError::read(entity, "raw staging lock poisoned"))?;
        entities
            .get(entity)
            .cloned()
            .ok_or_else(|| PipelineError::MissingRelation(entity.to_string()))
    }
}

/// A committed, immutable relation snapshot
struct Snapshot {
    meta: RelationVersion,
    rows: Arc<Vec<Row>>,
}

/// In-memory relation store. Each relation is an `Arc` snapshot that `replace`
/// swaps under the write lock once the new contents are fully built.
pub struct InMemoryRelationStore {
    name: String,
    relations: RwLock<HashMap<String, Snapshot>>,
    writer: Arc<AtomicBool>,
}

impl InMemoryRelationStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            relations: RwLock::new(HashMap::new()),
            writer: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl RelationStore for InMemoryRelationStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn replace(&self, relation: &str, rows: Vec<Row>) -> Result<RelationVersion> {
        // Stage: everything that can fail happens before the swap
        let fingerprint = fingerprint_rows(&rows).map_err(|e| PipelineError::write(relation, e))?;
        let row_count = rows.len();
        let staged = Arc::new(rows);

        let mut relations = self
            .relations
            .write()
            .map_err(|_| PipelineError::write(relation, "store lock poisoned"))?;
        let version = relations
            .get(relation)
            .map(|s| s.meta.version + 1)
            .unwrap_or(1);
        let meta = RelationVersion {
            relation: relation.to_string(),
            version,
            row_count,
            fingerprint,
        };
        relations.insert(
            relation.to_string(),
            Snapshot {
                meta: meta.clone(),
                rows: staged,
            },
        );

        debug!(
            "Committed {}.{} v{} ({} rows)",
            self.name, relation, version, row_count
        );
        Ok(meta)
    }

    async fn read(&self, relation: &str) -> Result<Vec<Row>> {
        let snapshot = {
            let relations = self
                .relations
                .read()
                .map_err(|_| PipelineError::read(relation, "store lock poisoned"))?;
            relations
                .get(relation)
                .map(|s| s.rows.clone())
                .ok_or_else(|| PipelineError::MissingRelation(relation.to_string()))?
        };
        Ok(snapshot.as_ref().clone())
    }

    async fn version(&self, relation: &str) -> Result<Option<RelationVersion>> {
        let relations = self
            .relations
            .read()
            .map_err(|_| PipelineError::read(relation, "store lock poisoned"))?;
        Ok(relations.get(relation).map(|s| s.meta.clone()))
    }

    fn try_begin_run(&self) -> Result<RunGuard> {
        if self
            .writer
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::RunInProgress(self.name.clone()));
        }
        let writer = self.writer.clone();
        Ok(RunGuard::new(move || writer.store(false, Ordering::Release)))
    }
}
