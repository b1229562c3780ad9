//! Write session facade
//!
//! A [`WriteSession`] owns the snapshots of one batch of edits and borrows its
//! collaborators mutably for its whole lifetime:
//!
//! ```text
//! Active --save_changes--> Completed
//!   |
//!   +----discard_changes--> Aborted
//! ```
//!
//! `find`, `resolve` and every mutator require an active session.
//!
//! ## Logging Ownership
//!
//! The session owns lifecycle logging for `save_changes`, `discard_changes`
//! and `delete`. Lazy resolution logs its own start/end pair, and the unit of
//! work emits one debug event per registration.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tessera_core_types::SessionId;

use super::arena::SnapshotArena;
use super::attachments::Attachment;
use super::context::SessionContext;
use super::factory::SnapshotFactory;
use super::members::Member;
use super::snapshot::{ContainerHandle, ResourceHandle, Snapshot, SnapshotKey};
use super::unit_of_work::{LedgerEntry, UnitOfWork};
use crate::errors::{Result, SessionError};
use crate::external::{ChangeSet, Repository, ResourceProcessor, TemplateCatalog, TransactionManager};
use crate::model::{AttachmentId, HandlerType, ResourceId};
use crate::{log_op_end, log_op_error, log_op_start};

/// Collaborators a session borrows for its lifetime
pub struct SessionEnvironment<'env> {
    pub repository: &'env mut dyn Repository,
    pub templates: &'env dyn TemplateCatalog,
    pub transactions: &'env mut dyn TransactionManager,
    pub processor: &'env mut dyn ResourceProcessor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Aborted => "aborted",
        }
    }
}

pub struct WriteSession<'env> {
    id: SessionId,
    status: SessionStatus,
    opened_at: DateTime<Utc>,
    env: SessionEnvironment<'env>,
    arena: SnapshotArena,
    unit_of_work: UnitOfWork,
}

impl<'env> WriteSession<'env> {
    pub fn open(env: SessionEnvironment<'env>) -> Self {
        let id = SessionId::new();
        tracing::debug!(session_id = %id, "write session opened");
        Self {
            id,
            status: SessionStatus::Active,
            opened_at: Utc::now(),
            env,
            arena: SnapshotArena::default(),
            unit_of_work: UnitOfWork::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Number of snapshots this session has materialized
    pub fn snapshot_count(&self) -> usize {
        self.arena.len()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.status == SessionStatus::Active {
            Ok(())
        } else {
            Err(SessionError::SessionNotActive {
                session_id: self.id,
                status: self.status.as_str(),
            })
        }
    }

    fn check_handle(&self, handle: ResourceHandle) -> Result<SnapshotKey> {
        if handle.session_id() != self.id {
            return Err(SessionError::SessionMismatch {
                expected: self.id,
                found: handle.session_id(),
            });
        }
        self.arena.get(handle.key())?;
        Ok(handle.key())
    }

    fn context(&mut self) -> SessionContext<'_, 'env> {
        SessionContext {
            session: self.id,
            status: self.status,
            arena: &mut self.arena,
            unit_of_work: &mut self.unit_of_work,
            repository: &mut *self.env.repository,
            factory: SnapshotFactory::new(self.env.templates),
        }
    }

    fn handle(&self, key: SnapshotKey) -> ResourceHandle {
        ResourceHandle::new(self.id, key)
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    /// Snapshot of the resource called `name` handled by `handler_type`
    ///
    /// A cache miss yields an unloaded reference; the repository is only
    /// consulted on the first accessor call.
    ///
    /// # Errors
    ///
    /// `SessionNotActive`, or `UnknownHandler` when no template is registered
    /// for `handler_type`.
    pub fn find(&mut self, name: &str, handler_type: &HandlerType) -> Result<ResourceHandle> {
        self.ensure_active()?;
        let template = SnapshotFactory::new(self.env.templates).template_of_handler(handler_type)?;
        let id = ResourceId::new(name, template.id().clone());
        self.resolve(&id)
    }

    /// # Errors
    ///
    /// As [`find`](Self::find), plus `IncompatibleSnapshotType` when the
    /// resource is not a container.
    pub fn find_container(
        &mut self,
        name: &str,
        handler_type: &HandlerType,
    ) -> Result<ContainerHandle> {
        let handle = self.find(name, handler_type)?;
        self.as_container(handle)
    }

    /// Snapshot of `id`, from the session cache or as a fresh reference
    ///
    /// # Errors
    ///
    /// `SessionNotActive`, or `UnknownTemplate` when the id names no
    /// registered template.
    pub fn resolve(&mut self, id: &ResourceId) -> Result<ResourceHandle> {
        self.ensure_active()?;
        let key = self.context().lookup_or_reference(id)?;
        Ok(self.handle(key))
    }

    /// # Errors
    ///
    /// `IncompatibleSnapshotType` when the snapshot is not a container.
    pub fn as_container(&self, handle: ResourceHandle) -> Result<ContainerHandle> {
        let snapshot = self.snapshot(handle)?;
        if snapshot.is_container() {
            Ok(ContainerHandle::new(handle))
        } else {
            Err(SessionError::IncompatibleSnapshotType {
                resource: snapshot.id().clone(),
                expected: "container",
            })
        }
    }

    /// Identity and status of a snapshot, without resolving it
    pub fn snapshot(&self, handle: ResourceHandle) -> Result<&Snapshot> {
        let key = self.check_handle(handle)?;
        self.arena.get(key)
    }

    // ---------------------------------------------------------------------
    // Reads
    //
    // Reads of already loaded snapshots work in every status. Once the
    // session is completed or aborted a read that would need a repository
    // load fails with `SessionNotActive`.
    // ---------------------------------------------------------------------

    pub fn is_root(&mut self, handle: ResourceHandle) -> Result<bool> {
        Ok(self.parent(handle)?.is_none())
    }

    pub fn parent(&mut self, handle: ResourceHandle) -> Result<Option<ResourceHandle>> {
        let key = self.check_handle(handle)?;
        let parent = self.context().resolve_parent(key)?;
        Ok(parent.map(|parent| self.handle(parent)))
    }

    pub fn attachments(&mut self, handle: ResourceHandle) -> Result<Vec<Attachment>> {
        let key = self.check_handle(handle)?;
        let mut context = self.context();
        Ok(context.readable(key)?.persistency.attachments())
    }

    pub fn attachment_by_id(
        &mut self,
        handle: ResourceHandle,
        attachment_id: &AttachmentId,
    ) -> Result<Option<Attachment>> {
        let key = self.check_handle(handle)?;
        let mut context = self.context();
        Ok(context
            .readable(key)?
            .persistency
            .attachment_by_id(attachment_id)
            .cloned())
    }

    pub fn attachment_by_resource(
        &mut self,
        handle: ResourceHandle,
        resource: &ResourceId,
    ) -> Result<Option<Attachment>> {
        let key = self.check_handle(handle)?;
        let mut context = self.context();
        Ok(context
            .readable(key)?
            .persistency
            .attachment_by_resource(resource)
            .cloned())
    }

    pub fn members(&mut self, container: ContainerHandle) -> Result<Vec<Member>> {
        let key = self.check_handle(container.as_resource())?;
        let mut context = self.context();
        Ok(context.readable(key)?.persistency.members())
    }

    pub fn has_member(&mut self, container: ContainerHandle, member: &ResourceId) -> Result<bool> {
        let key = self.check_handle(container.as_resource())?;
        let mut context = self.context();
        Ok(context.readable(key)?.persistency.has_member(member))
    }

    /// The earliest member added in this session that is still a member
    pub fn primary_new_member(&mut self, container: ContainerHandle) -> Result<Option<Member>> {
        let key = self.check_handle(container.as_resource())?;
        let mut context = self.context();
        Ok(context
            .readable(key)?
            .persistency
            .primary_new_member()
            .cloned())
    }

    /// Which ledger list holds a snapshot, if any
    pub fn ledger_entry(&self, handle: ResourceHandle) -> Result<Option<LedgerEntry>> {
        let key = self.check_handle(handle)?;
        Ok(self.unit_of_work.ledger_entry(key))
    }

    /// What `save_changes` would report right now
    pub fn pending_changes(&mut self) -> ChangeSet {
        self.context().change_set()
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Create a child resource in the attachment slot `attachment_id` of `owner`
    ///
    /// # Errors
    ///
    /// `SessionNotActive`, `AlreadyDeleted`, `UnknownAttachment`,
    /// `UnknownHandler`, `IncompatibleHandler`, `DuplicateAttachmentId` or
    /// `NameInUse`.
    pub fn create_attached_resource(
        &mut self,
        owner: ResourceHandle,
        attachment_id: &AttachmentId,
        name: &str,
        handler_type: &HandlerType,
    ) -> Result<ResourceHandle> {
        self.ensure_active()?;
        let key = self.check_handle(owner)?;
        let child = self
            .context()
            .create_attached_resource(key, attachment_id, name, handler_type)?;
        Ok(self.handle(child))
    }

    /// Detach and delete the child in `attachment_id`; `false` when the slot is empty
    pub fn remove_attachment(
        &mut self,
        owner: ResourceHandle,
        attachment_id: &AttachmentId,
    ) -> Result<bool> {
        self.ensure_active()?;
        let key = self.check_handle(owner)?;
        self.context().remove_attachment(key, attachment_id)
    }

    /// Unlink the child in `attachment_id` without deleting it
    pub fn soft_detach(
        &mut self,
        owner: ResourceHandle,
        attachment_id: &AttachmentId,
    ) -> Result<Option<ResourceHandle>> {
        self.ensure_active()?;
        let key = self.check_handle(owner)?;
        let child = self.context().soft_detach(key, attachment_id)?;
        Ok(child.map(|child| self.handle(child)))
    }

    /// # Errors
    ///
    /// `SessionNotActive`, `AlreadyDeleted` or `NameInUse`.
    pub fn add_member(&mut self, container: ContainerHandle, name: &str) -> Result<ResourceHandle> {
        self.ensure_active()?;
        let key = self.check_handle(container.as_resource())?;
        let member = self.context().add_member(key, name)?;
        Ok(self.handle(member))
    }

    /// Unlink and delete a member; `false` when it is not a member
    pub fn remove_member(&mut self, container: ContainerHandle, member: &ResourceId) -> Result<bool> {
        self.ensure_active()?;
        let key = self.check_handle(container.as_resource())?;
        self.context().remove_member(key, member)
    }

    /// Unlink a member without deleting it
    pub fn soft_remove_member(
        &mut self,
        container: ContainerHandle,
        member: &ResourceId,
    ) -> Result<Option<ResourceHandle>> {
        self.ensure_active()?;
        let key = self.check_handle(container.as_resource())?;
        let removed = self.context().soft_remove_member(key, member)?;
        Ok(removed.map(|removed| self.handle(removed)))
    }

    /// Mark a snapshot dirty
    pub fn modify(&mut self, handle: ResourceHandle) -> Result<()> {
        self.ensure_active()?;
        let key = self.check_handle(handle)?;
        self.context().modify(key)
    }

    /// Delete a snapshot together with everything attached to it or held in it
    ///
    /// # Errors
    ///
    /// `SessionNotActive`, `AlreadyDeleted`, or a resolution failure.
    pub fn delete(&mut self, handle: ResourceHandle) -> Result<()> {
        self.ensure_active()?;
        let key = self.check_handle(handle)?;
        let resource = self.arena.get(key)?.id().clone();

        log_op_start!("delete", resource = %resource);
        let start = Instant::now();

        self.context().delete(key).map_err(|e| {
            log_op_error!(
                "delete",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                resource = %resource
            );
            e
        })?;

        log_op_end!(
            "delete",
            duration_ms = start.elapsed().as_millis() as u64,
            resource = %resource
        );
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Completion
    // ---------------------------------------------------------------------

    /// Replay every change against the repository and commit
    ///
    /// On a replay or processing failure the transaction is rolled back and
    /// the original error returned. The session is completed either way.
    ///
    /// # Errors
    ///
    /// `SessionNotActive`, `Repository`, `UnresolvableReference`,
    /// `ResourceProcessing` or `TransactionFailure`.
    pub fn save_changes(&mut self) -> Result<ChangeSet> {
        self.ensure_active()?;
        log_op_start!("save_changes", session_id = %self.id);
        let start = Instant::now();
        self.status = SessionStatus::Completed;

        let changes = self.commit().map_err(|e| {
            log_op_error!(
                "save_changes",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                session_id = %self.id
            );
            e
        })?;

        log_op_end!(
            "save_changes",
            duration_ms = start.elapsed().as_millis() as u64,
            session_id = %self.id,
            new_count = changes.created.len(),
            dirty_count = changes.updated.len(),
            deleted_count = changes.deleted.len()
        );
        Ok(changes)
    }

    fn commit(&mut self) -> Result<ChangeSet> {
        let replayed = {
            let mut context = self.context();
            context.replay().map(|()| context.change_set())
        };
        let processed = replayed.and_then(|changes| {
            self.env
                .processor
                .process(&changes)
                .map(|()| changes)
                .map_err(SessionError::ResourceProcessing)
        });

        match processed {
            Ok(changes) => {
                self.env
                    .transactions
                    .current_transaction()
                    .commit()
                    .map_err(SessionError::TransactionFailure)?;
                Ok(changes)
            }
            Err(err) => {
                if let Err(rollback) = self.env.transactions.current_transaction().rollback() {
                    tracing::warn!(
                        session_id = %self.id,
                        err.code = rollback.code(),
                        "rollback after failed save also failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Roll back without touching the repository
    ///
    /// A no-op once the session is no longer active, whether it was saved or
    /// already discarded.
    ///
    /// # Errors
    ///
    /// `TransactionFailure` when the rollback fails.
    pub fn discard_changes(&mut self) -> Result<()> {
        if self.status != SessionStatus::Active {
            return Ok(());
        }
        log_op_start!("discard_changes", session_id = %self.id);
        let start = Instant::now();
        self.status = SessionStatus::Aborted;

        self.env
            .transactions
            .current_transaction()
            .rollback()
            .map_err(SessionError::TransactionFailure)
            .map_err(|e| {
                log_op_error!(
                    "discard_changes",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    session_id = %self.id
                );
                e
            })?;

        log_op_end!(
            "discard_changes",
            duration_ms = start.elapsed().as_millis() as u64,
            session_id = %self.id
        );
        Ok(())
    }

    /// Discard if still active; failures are logged, never returned
    pub fn close(mut self) {
        if self.status != SessionStatus::Active {
            return;
        }
        if let Err(err) = self.discard_changes() {
            tracing::warn!(session_id = %self.id, error = %err, "discard on close failed");
        }
    }
}

impl std::fmt::Debug for WriteSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteSession")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("opened_at", &self.opened_at)
            .field("snapshots", &self.arena.len())
            .finish_non_exhaustive()
    }
}
