//! Tessera Core - write sessions over a persistent resource tree
//!
//! This crate provides the session engine and everything it needs:
//! - Resource identity and template metadata
//! - Snapshots with lazily resolved parents and persistency state
//! - A per-session unit of work tracking new, dirty and deleted snapshots
//! - The `WriteSession` facade with atomic save/discard
//! - Collaborator traits and in-memory reference implementations
//! - Canonical errors and the logging facility

pub mod errors;
pub mod external;
pub mod logging_facility;
pub mod memory;
pub mod model;
pub mod session;

// Re-export commonly used types
pub use errors::{ExError, ExErrorKind, Result, SessionError};
pub use external::{
    ChangeSet, LinkHandle, NoopResourceProcessor, Repository, ResourceProcessor, ResourceRecord,
    TemplateCatalog, Transaction, TransactionManager,
};
pub use model::{AttachmentId, HandlerType, ResourceId, Template, TemplateId, TemplateKind};
pub use session::{
    ContainerHandle, LedgerEntry, ResourceHandle, SessionEnvironment, SessionStatus,
    SnapshotStatus, WriteSession,
};
