use super::traits::{fingerprint_rows, RawStagingStore, RelationStore, RelationVersion, Row, RunGuard};
use crate::common::error::{PipelineError, Result};
use crate::domain::RawRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EXTENSION: &str = "ndjson";
const RUN_LOCK_FILE: &str = ".run.lock";

fn relation_path(dir: &Path, relation: &str) -> PathBuf {
    dir.join(format!("{}.{}", relation, EXTENSION))
}

/// Non-blocking exclusive lock; `Ok(false)` when another handle holds it.
/// Released when the file is closed.
#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor belongs to `file`, which outlives the call
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
    match file.try_lock() {
        Ok(()) => Ok(true),
        Err(std::fs::TryLockError::WouldBlock) => Ok(false),
        Err(std::fs::TryLockError::Error(e)) => Err(e),
    }
}

async fn read_lines(path: &Path, relation: &str) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PipelineError::read(relation, e)),
    }
}

/// Raw staging area laid out as one NDJSON extract per entity, as produced by
/// the bulk loader. Row numbers are the 1-based line numbers in the file.
pub struct FileRawStagingStore {
    dir: PathBuf,
}

impl FileRawStagingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl RawStagingStore for FileRawStagingStore {
    async fn read(&self, entity: &str) -> Result<Vec<RawRecord>> {
        let path = relation_path(&self.dir, entity);
        let content = read_lines(&path, entity)
            .await?
            .ok_or_else(|| PipelineError::MissingRelation(entity.to_string()))?;

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
                PipelineError::schema(entity, format!("line {}: {}", index + 1, e))
            })?;
            records.push(RawRecord::from_value(index as u64 + 1, value));
        }

        debug!("Read {} raw rows from {}", records.len(), path.display());
        Ok(records)
    }
}

/// Relation store backed by one NDJSON file per relation.
///
/// `replace` writes a hidden temp file next to the target and renames it over
/// the target, so readers see either the old file or the complete new one.
pub struct FileRelationStore {
    name: String,
    dir: PathBuf,
    versions: Mutex<HashMap<String, u64>>,
}

impl FileRelationStore {
    pub fn new(name: &str, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!("Opened {} store at {}", name, dir.display());
        Ok(Self {
            name: name.to_string(),
            dir,
            versions: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_version(&self, relation: &str) -> Result<u64> {
        let mut versions = self
            .versions
            .lock()
            .map_err(|_| PipelineError::write(relation, "version lock poisoned"))?;
        let version = versions.entry(relation.to_string()).or_insert(0);
        *version += 1;
        Ok(*version)
    }
}

#[async_trait]
impl RelationStore for FileRelationStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn replace(&self, relation: &str, rows: Vec<Row>) -> Result<RelationVersion> {
        let mut body = String::new();
        for row in &rows {
            body.push_str(&serde_json::to_string(row).map_err(|e| PipelineError::write(relation, e))?);
            body.push('\n');
        }
        let fingerprint = fingerprint_rows(&rows).map_err(|e| PipelineError::write(relation, e))?;

        let target = relation_path(&self.dir, relation);
        let staged = self
            .dir
            .join(format!(".{}.{}.{}", relation, Uuid::new_v4().simple(), EXTENSION));

        if let Err(e) = tokio::fs::write(&staged, body.as_bytes()).await {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(PipelineError::write(relation, e));
        }
        if let Err(e) = tokio::fs::rename(&staged, &target).await {
            warn!("Discarding staged file {}: {}", staged.display(), e);
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(PipelineError::write(relation, e));
        }

        let version = self.next_version(relation)?;
        debug!(
            "Committed {} v{} ({} rows) to {}",
            relation,
            version,
            rows.len(),
            target.display()
        );
        Ok(RelationVersion {
            relation: relation.to_string(),
            version,
            row_count: rows.len(),
            fingerprint,
        })
    }

    async fn read(&self, relation: &str) -> Result<Vec<Row>> {
        let content = read_lines(&relation_path(&self.dir, relation), relation)
            .await?
            .ok_or_else(|| PipelineError::MissingRelation(relation.to_string()))?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(index, line)| {
                serde_json::from_str(line)
                    .map_err(|e| PipelineError::schema(relation, format!("row {}: {}", index, e)))
            })
            .collect()
    }

    async fn version(&self, relation: &str) -> Result<Option<RelationVersion>> {
        let rows = match self.read(relation).await {
            Ok(rows) => rows,
            Err(PipelineError::MissingRelation(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let version = self
            .versions
            .lock()
            .map_err(|_| PipelineError::read(relation, "version lock poisoned"))?
            .get(relation)
            .copied()
            .unwrap_or(0);
        Ok(Some(RelationVersion {
            relation: relation.to_string(),
            version,
            row_count: rows.len(),
            fingerprint: fingerprint_rows(&rows)?,
        }))
    }

    /// Claims the store with an exclusive advisory lock on `.run.lock`. The
    /// lock dies with its holder, so a file left behind by a crashed run does
    /// not block the next one.
    fn try_begin_run(&self) -> Result<RunGuard> {
        let lock_path = self.dir.join(RUN_LOCK_FILE);
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if !try_lock_exclusive(&file)? {
            return Err(PipelineError::RunInProgress(self.name.clone()));
        }

        // Holder's pid, for operators only
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        debug!("Claimed run lock on {} store", self.name);

        Ok(RunGuard::new(move || drop(file)))
    }
}
