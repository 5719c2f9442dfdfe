//! Storage backends
//!
//! A store executes `QueryDescription`s for one entity type. The retrieval
//! façade only talks to this trait, so the same pipeline runs against SQLite
//! or an in-memory collection.

mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::orm::{Entity, QueryDescription};

pub use memory::MemoryStore;
pub use sqlite::{Database, SqliteStore};

#[async_trait]
pub trait Store<E: Entity>: Send + Sync {
    /// Run the query and decode every matching row.
    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<E>>;

    /// Count rows matching the query's conditions. Order and bounds are ignored.
    async fn count(&self, query: &QueryDescription) -> Result<i64>;
}
