//! Write sessions over the resource tree
//!
//! Callers open a [`WriteSession`], address resources through
//! [`ResourceHandle`]s and [`ContainerHandle`]s, and finish with
//! `save_changes` or `discard_changes`. Snapshots live in a session-owned
//! arena; handles are keys into it, tagged with the owning session.

mod arena;
pub mod attachments;
mod context;
mod factory;
pub mod members;
pub mod parent;
pub mod persistency;
pub mod snapshot;
pub mod unit_of_work;
mod write_session;

pub use attachments::{Attachment, AttachmentCollection};
pub use members::{Member, MemberCollection};
pub use parent::ParentState;
pub use persistency::{LinkDiff, Links, PersistencyState, SnapshotStatus};
pub use snapshot::{ContainerHandle, ResourceHandle, Snapshot, SnapshotKey, SnapshotKind};
pub use unit_of_work::LedgerEntry;
pub use write_session::{SessionEnvironment, SessionStatus, WriteSession};
