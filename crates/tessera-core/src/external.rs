//! Collaborators the session engine consumes
//!
//! The engine never owns durable state. It reads resources lazily through a
//! [`Repository`], consults a [`TemplateCatalog`] for resource shapes, replays
//! its diffs on commit, and delegates atomicity to a [`TransactionManager`].
//! Publication side effects happen in a [`ResourceProcessor`].
//!
//! All collaborators report failures as [`ExError`]; the engine wraps them in
//! the matching `SessionError` variant and never retries.

use serde::{Deserialize, Serialize};

use crate::errors::ExError;
use crate::model::{AttachmentId, HandlerType, ResourceId, Template, TemplateId};

/// Opaque handle to a persisted link (attachment or membership)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkHandle(pub u64);

/// A resource as loaded from the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    /// Resource this one is attached to, or a member of
    #[serde(default)]
    pub parent: Option<ResourceId>,
    #[serde(default)]
    pub attachments: Vec<(AttachmentId, ResourceId)>,
    #[serde(default)]
    pub members: Vec<ResourceId>,
}

impl ResourceRecord {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            parent: None,
            attachments: Vec::new(),
            members: Vec::new(),
        }
    }
}

/// Persistent store of resources and their links
pub trait Repository {
    /// Load one resource, `None` when it does not exist
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying store fails.
    fn load_resource(&mut self, id: &ResourceId) -> Result<Option<ResourceRecord>, ExError>;

    /// Attach `child` to `owner` under `attachment_id`, creating `child` if needed
    ///
    /// # Errors
    ///
    /// Returns an error when `owner` is unknown or the slot is taken.
    fn attach(
        &mut self,
        owner: &ResourceId,
        attachment_id: &AttachmentId,
        child: &ResourceId,
    ) -> Result<LinkHandle, ExError>;

    /// Remove an attachment link (and the resource it pointed to)
    ///
    /// # Errors
    ///
    /// Returns an error when the handle is unknown.
    fn detach(&mut self, owner: &ResourceId, handle: LinkHandle) -> Result<(), ExError>;

    /// Add `member` to container `owner`, creating `member` if needed
    ///
    /// # Errors
    ///
    /// Returns an error when `owner` is unknown or already holds `member`.
    fn add_member(&mut self, owner: &ResourceId, member: &ResourceId)
        -> Result<LinkHandle, ExError>;

    /// Remove a membership link (and the member resource)
    ///
    /// # Errors
    ///
    /// Returns an error when the handle is unknown.
    fn remove_member(&mut self, owner: &ResourceId, handle: LinkHandle) -> Result<(), ExError>;

    /// Locate the persisted attachment `attachment_id` of `owner`
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying store fails.
    fn find_attachment(
        &mut self,
        owner: &ResourceId,
        attachment_id: &AttachmentId,
    ) -> Result<Option<LinkHandle>, ExError>;

    /// Locate the persisted membership of `member` in `owner`
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying store fails.
    fn find_member(
        &mut self,
        owner: &ResourceId,
        member: &ResourceId,
    ) -> Result<Option<LinkHandle>, ExError>;
}

/// Read-only template metadata
pub trait TemplateCatalog {
    fn template_of_id(&self, template_id: &TemplateId) -> Option<&Template>;

    fn template_of_handler_type(&self, handler_type: &HandlerType) -> Option<&Template>;
}

/// The external transaction a write session commits or rolls back
pub trait Transaction {
    /// # Errors
    ///
    /// Returns an error when the transaction cannot be committed.
    fn commit(&mut self) -> Result<(), ExError>;

    /// # Errors
    ///
    /// Returns an error when the transaction cannot be rolled back.
    fn rollback(&mut self) -> Result<(), ExError>;
}

pub trait TransactionManager {
    fn current_transaction(&mut self) -> &mut dyn Transaction;
}

/// Resources touched by one committed session, in unit-of-work order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub created: Vec<ResourceId>,
    pub updated: Vec<ResourceId>,
    pub deleted: Vec<ResourceId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Commit-time side effects (endpoint publication and retirement)
pub trait ResourceProcessor {
    /// # Errors
    ///
    /// Returns an error when the side effects cannot be applied; the session
    /// then rolls back instead of committing.
    fn process(&mut self, changes: &ChangeSet) -> Result<(), ExError>;
}

/// Processor with no side effects
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResourceProcessor;

impl ResourceProcessor for NoopResourceProcessor {
    fn process(&mut self, _changes: &ChangeSet) -> Result<(), ExError> {
        Ok(())
    }
}
