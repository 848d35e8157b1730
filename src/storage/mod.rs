pub mod file;
pub mod in_memory;
pub mod traits;

pub use file::{FileRawStagingStore, FileRelationStore};
pub use in_memory::{InMemoryRawStagingStore, InMemoryRelationStore};
pub use traits::{
    fingerprint_rows, read_records, replace_records, RawStagingStore, RelationStore,
    RelationVersion, Row, RunGuard,
};
