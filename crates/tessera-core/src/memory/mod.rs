//! In-memory collaborators
//!
//! Reference implementations of the traits in [`crate::external`], used by the
//! CLI and by tests. They record what the engine asked of them so callers can
//! assert on exact repository traffic.

mod processor;
mod repository;
mod templates;
mod transactions;

pub use processor::RecordingResourceProcessor;
pub use repository::{InMemoryRepository, RepositoryCall};
pub use templates::InMemoryTemplateCatalog;
pub use transactions::{InMemoryTransaction, InMemoryTransactionManager};
