//! Operations over the snapshots of one session
//!
//! A [`SessionContext`] is a short-lived bundle of everything a snapshot
//! operation may touch: the arena, the unit of work, the repository (for lazy
//! loads) and the factory. The write session builds one per call, so no
//! operation ever reaches for ambient state.

use std::collections::HashSet;
use std::time::Instant;

use tessera_core_types::SessionId;

use super::arena::SnapshotArena;
use super::attachments::Attachment;
use super::factory::SnapshotFactory;
use super::members::Member;
use super::parent::ParentState;
use super::persistency::{Links, PersistencyState, SnapshotStatus};
use super::snapshot::{ResourceHandle, Snapshot, SnapshotKey};
use super::unit_of_work::{UnitOfWork, UnitOfWorkVisitor};
use super::write_session::SessionStatus;
use crate::errors::{Result, SessionError};
use crate::external::{ChangeSet, Repository, ResourceRecord};
use crate::model::{AttachmentId, HandlerType, ResourceId};
use crate::{log_op_end, log_op_error, log_op_start};

pub(crate) struct SessionContext<'a, 'env> {
    pub(crate) session: SessionId,
    pub(crate) status: SessionStatus,
    pub(crate) arena: &'a mut SnapshotArena,
    pub(crate) unit_of_work: &'a mut UnitOfWork,
    pub(crate) repository: &'a mut (dyn Repository + 'env),
    pub(crate) factory: SnapshotFactory<'env>,
}

impl SessionContext<'_, '_> {
    fn handle(&self, key: SnapshotKey) -> ResourceHandle {
        ResourceHandle::new(self.session, key)
    }

    fn snapshot(&self, key: SnapshotKey) -> Result<&Snapshot> {
        self.arena.get(key)
    }

    fn snapshot_mut(&mut self, key: SnapshotKey) -> Result<&mut Snapshot> {
        self.arena.get_mut(key)
    }

    fn resource_id(&self, key: SnapshotKey) -> Result<ResourceId> {
        Ok(self.snapshot(key)?.id().clone())
    }

    fn is_deleted(&self, key: SnapshotKey) -> Result<bool> {
        Ok(self.snapshot(key)?.is_deleted())
    }

    // ---------------------------------------------------------------------
    // Lookup and resolution
    // ---------------------------------------------------------------------

    /// Cached snapshot for `id`, or a fresh persistent reference to it
    pub(crate) fn lookup_or_reference(&mut self, id: &ResourceId) -> Result<SnapshotKey> {
        if let Some(key) = self.arena.lookup(id) {
            return Ok(key);
        }
        let snapshot = self.factory.new_persistent_reference(id.clone())?;
        self.arena.insert(snapshot, self.session)
    }

    /// Reference to a child seen while loading `owner`; its parent is known
    fn child_reference(&mut self, id: &ResourceId, owner: SnapshotKey) -> Result<SnapshotKey> {
        let key = self.lookup_or_reference(id)?;
        let child = self.snapshot_mut(key)?;
        if !child.parent.is_resolved() {
            child.parent = ParentState::ChildOf(owner);
        }
        Ok(key)
    }

    /// Load a persistent reference on first access; at most one load per snapshot
    ///
    /// # Errors
    ///
    /// `UnresolvableReference` when the repository does not know the resource,
    /// `SessionNotActive` when the session has already been saved or discarded.
    pub(crate) fn ensure_resolved(&mut self, key: SnapshotKey) -> Result<()> {
        if self.snapshot(key)?.status() != SnapshotStatus::PersistentReference {
            return Ok(());
        }
        if self.status != SessionStatus::Active {
            return Err(SessionError::SessionNotActive {
                session_id: self.session,
                status: self.status.as_str(),
            });
        }
        let id = self.resource_id(key)?;
        let start = Instant::now();
        log_op_start!("resolve", resource = %id);

        match self.load(key, &id) {
            Ok(()) => {
                log_op_end!(
                    "resolve",
                    duration_ms = start.elapsed().as_millis() as u64,
                    resource = %id
                );
                Ok(())
            }
            Err(err) => {
                log_op_error!(
                    "resolve",
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    resource = %id
                );
                Err(err)
            }
        }
    }

    fn load(&mut self, key: SnapshotKey, id: &ResourceId) -> Result<()> {
        let record = self
            .repository
            .load_resource(id)
            .map_err(SessionError::Repository)?
            .ok_or_else(|| SessionError::UnresolvableReference {
                resource: id.clone(),
            })?;
        let ResourceRecord {
            parent,
            attachments,
            members,
            ..
        } = record;

        let mut links = Links::default();
        for (attachment_id, child_id) in attachments {
            let child = self.child_reference(&child_id, key)?;
            let handle = self.handle(child);
            links
                .attachments
                .attach(id, Attachment::new(attachment_id, child_id, handle))?;
        }
        for member_id in members {
            let member = self.child_reference(&member_id, key)?;
            let handle = self.handle(member);
            links
                .members
                .add(id, Member::new(member_id, handle), false)?;
        }

        self.snapshot_mut(key)?.persistency = PersistencyState::persistent(links, parent);
        Ok(())
    }

    /// Parent of a snapshot, loading the snapshot if its parent is still lazy
    pub(crate) fn resolve_parent(&mut self, key: SnapshotKey) -> Result<Option<SnapshotKey>> {
        if let Some(parent) = self.snapshot(key)?.parent.resolved() {
            return Ok(parent);
        }
        self.ensure_resolved(key)?;
        let persisted = self.snapshot(key)?.persistency.persisted_parent().cloned();
        let parent = match persisted {
            Some(parent_id) => Some(self.lookup_or_reference(&parent_id)?),
            None => None,
        };
        // Loading the parent may already have pinned this snapshot to it.
        let snapshot = self.snapshot_mut(key)?;
        if !snapshot.parent.is_resolved() {
            snapshot.parent = ParentState::from_parent(parent);
        }
        Ok(snapshot.parent.resolved().flatten())
    }

    /// Resolved, not-deleted snapshot ready for a creating mutation
    fn ensure_mutable(&mut self, key: SnapshotKey) -> Result<()> {
        let snapshot = self.snapshot(key)?;
        if snapshot.is_deleted() {
            return Err(SessionError::AlreadyDeleted {
                resource: snapshot.id().clone(),
            });
        }
        self.ensure_resolved(key)
    }

    /// A new resource id must not clash with a live snapshot of this session
    fn ensure_id_available(&self, owner: &ResourceId, id: &ResourceId) -> Result<()> {
        if let Some(existing) = self.arena.lookup(id) {
            if !self.is_deleted(existing)? {
                return Err(SessionError::NameInUse {
                    resource: owner.clone(),
                    name: id.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Snapshot accessor for reads: resolves unless deleted
    pub(crate) fn readable(&mut self, key: SnapshotKey) -> Result<&Snapshot> {
        if !self.is_deleted(key)? {
            self.ensure_resolved(key)?;
        }
        self.snapshot(key)
    }

    // ---------------------------------------------------------------------
    // Attachments
    // ---------------------------------------------------------------------

    /// # Errors
    ///
    /// `AlreadyDeleted`, `UnknownAttachment`, `UnknownHandler`,
    /// `IncompatibleHandler`, `DuplicateAttachmentId` or `NameInUse`.
    pub(crate) fn create_attached_resource(
        &mut self,
        owner: SnapshotKey,
        attachment_id: &AttachmentId,
        name: &str,
        handler_type: &HandlerType,
    ) -> Result<SnapshotKey> {
        self.ensure_mutable(owner)?;
        let owner_id = self.resource_id(owner)?;

        let owner_template = self.factory.template(owner_id.template_id())?;
        let slot_template = owner_template
            .attached_template(attachment_id)
            .ok_or_else(|| SessionError::UnknownAttachment {
                resource: owner_id.clone(),
                attachment_id: attachment_id.clone(),
            })?;
        let handler_template = self.factory.template_of_handler(handler_type)?;
        if handler_template.id() != slot_template {
            return Err(SessionError::IncompatibleHandler {
                attachment_id: attachment_id.clone(),
                handler_type: handler_type.clone(),
                expected: slot_template.clone(),
            });
        }

        self.snapshot(owner)?
            .persistency
            .check_can_attach(&owner_id, attachment_id, name)?;
        let child_id = ResourceId::new(name, slot_template.clone());
        self.ensure_id_available(&owner_id, &child_id)?;

        let child = self.factory.new_transient(child_id.clone(), Some(owner))?;
        let child_key = self.arena.insert(child, self.session)?;
        let attachment = Attachment::new(attachment_id.clone(), child_id.clone(), self.handle(child_key));
        self.snapshot_mut(owner)?
            .persistency
            .attach(&owner_id, attachment)?;

        self.unit_of_work.register_dirty(owner, &owner_id)?;
        self.unit_of_work.register_new(child_key, &child_id)?;
        Ok(child_key)
    }

    /// Unlink an attachment without deleting the child; the child is detached
    pub(crate) fn soft_detach(
        &mut self,
        owner: SnapshotKey,
        attachment_id: &AttachmentId,
    ) -> Result<Option<SnapshotKey>> {
        if self.is_deleted(owner)? {
            return Ok(None);
        }
        self.ensure_resolved(owner)?;
        let Some(detached) = self.snapshot_mut(owner)?.persistency.detach(attachment_id) else {
            return Ok(None);
        };

        let child = detached.resource().key();
        self.snapshot_mut(child)?.parent = ParentState::Detached;
        let owner_id = self.resource_id(owner)?;
        self.unit_of_work.register_dirty(owner, &owner_id)?;
        Ok(Some(child))
    }

    /// Detach, then delete the detached subtree
    pub(crate) fn remove_attachment(
        &mut self,
        owner: SnapshotKey,
        attachment_id: &AttachmentId,
    ) -> Result<bool> {
        match self.soft_detach(owner, attachment_id)? {
            Some(child) => {
                self.delete_subtree(child)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ---------------------------------------------------------------------
    // Members
    // ---------------------------------------------------------------------

    /// # Errors
    ///
    /// `AlreadyDeleted`, `IncompatibleSnapshotType` when `container` holds no
    /// members, or `NameInUse`.
    pub(crate) fn add_member(&mut self, container: SnapshotKey, name: &str) -> Result<SnapshotKey> {
        self.ensure_mutable(container)?;
        let container_id = self.resource_id(container)?;

        let template = self.factory.template(container_id.template_id())?;
        let member_template =
            template
                .member_template()
                .ok_or_else(|| SessionError::IncompatibleSnapshotType {
                    resource: container_id.clone(),
                    expected: "container",
                })?;
        let member_id = ResourceId::new(name, member_template.clone());
        if self.snapshot(container)?.persistency.has_member(&member_id) {
            return Err(SessionError::NameInUse {
                resource: container_id,
                name: name.to_string(),
            });
        }
        self.ensure_id_available(&container_id, &member_id)?;

        let member = self.factory.new_transient(member_id.clone(), Some(container))?;
        let member_key = self.arena.insert(member, self.session)?;
        let link = Member::new(member_id.clone(), self.handle(member_key));
        self.snapshot_mut(container)?
            .persistency
            .add_member(&container_id, link)?;

        self.unit_of_work.register_dirty(container, &container_id)?;
        self.unit_of_work.register_new(member_key, &member_id)?;
        Ok(member_key)
    }

    /// Unlink a member without deleting it; the member is detached
    pub(crate) fn soft_remove_member(
        &mut self,
        container: SnapshotKey,
        member: &ResourceId,
    ) -> Result<Option<SnapshotKey>> {
        if self.is_deleted(container)? {
            return Ok(None);
        }
        self.ensure_resolved(container)?;
        let Some(removed) = self.snapshot_mut(container)?.persistency.remove_member(member) else {
            return Ok(None);
        };

        let member_key = removed.resource().key();
        self.snapshot_mut(member_key)?.parent = ParentState::Detached;
        let container_id = self.resource_id(container)?;
        self.unit_of_work.register_dirty(container, &container_id)?;
        self.mark_membership_owner_dirty(container)?;
        Ok(Some(member_key))
    }

    pub(crate) fn remove_member(
        &mut self,
        container: SnapshotKey,
        member: &ResourceId,
    ) -> Result<bool> {
        match self.soft_remove_member(container, member)? {
            Some(member_key) => {
                self.delete_subtree(member_key)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// A membership-aware container reports member removals to its own parent
    fn mark_membership_owner_dirty(&mut self, container: SnapshotKey) -> Result<()> {
        if !self.snapshot(container)?.is_membership_aware() {
            return Ok(());
        }
        if let Some(grandparent) = self.resolve_parent(container)? {
            let grandparent_id = self.resource_id(grandparent)?;
            self.unit_of_work
                .register_dirty(grandparent, &grandparent_id)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub(crate) fn modify(&mut self, key: SnapshotKey) -> Result<()> {
        let snapshot = self.snapshot(key)?;
        if snapshot.is_deleted() {
            return Err(SessionError::AlreadyDeleted {
                resource: snapshot.id().clone(),
            });
        }
        let id = snapshot.id().clone();
        self.unit_of_work.register_dirty(key, &id)
    }

    /// Unlink a snapshot from its parent, then delete it with all descendants
    pub(crate) fn delete(&mut self, key: SnapshotKey) -> Result<()> {
        let id = self.resource_id(key)?;
        if self.is_deleted(key)? {
            return Err(SessionError::AlreadyDeleted { resource: id });
        }

        if let Some(parent) = self.resolve_parent(key)? {
            self.ensure_resolved(parent)?;
            let held_by = self
                .snapshot(parent)?
                .persistency
                .attachment_by_resource(&id)
                .filter(|attachment| attachment.resource().key() == key)
                .map(|attachment| attachment.id().clone());
            match held_by {
                Some(attachment_id) => {
                    self.soft_detach(parent, &attachment_id)?;
                }
                None => {
                    self.soft_remove_member(parent, &id)?;
                }
            }
        }

        self.delete_subtree(key)
    }

    /// Mark `root` and every descendant deleted, descendants first
    pub(crate) fn delete_subtree(&mut self, root: SnapshotKey) -> Result<()> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        self.collect_leaf_first(root, &mut visited, &mut order)?;

        for key in order {
            let snapshot = self.snapshot_mut(key)?;
            snapshot.parent = ParentState::Orphan;
            snapshot.persistency = PersistencyState::Deleted;
            let id = snapshot.id().clone();
            self.unit_of_work.register_deleted(key, &id);
        }
        Ok(())
    }

    /// Post-order walk: attachments, then members, then the node itself
    fn collect_leaf_first(
        &mut self,
        key: SnapshotKey,
        visited: &mut HashSet<SnapshotKey>,
        order: &mut Vec<SnapshotKey>,
    ) -> Result<()> {
        if !visited.insert(key) || self.is_deleted(key)? {
            return Ok(());
        }
        self.ensure_resolved(key)?;

        let (attached, members) = match self.snapshot(key)?.persistency.links() {
            Some(links) => (
                links
                    .attachments()
                    .iter()
                    .map(|attachment| attachment.resource().key())
                    .collect::<Vec<_>>(),
                links
                    .members()
                    .iter()
                    .map(|member| member.resource().key())
                    .collect::<Vec<_>>(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        for child in attached.into_iter().chain(members) {
            self.collect_leaf_first(child, visited, order)?;
        }
        order.push(key);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------------

    /// Push every snapshot's changes, in arena order so parents precede children
    ///
    /// Detached subtrees are skipped: the owner's unlink already removed
    /// them from the repository.
    pub(crate) fn replay(&mut self) -> Result<()> {
        for (index, snapshot) in self.arena.iter().enumerate() {
            if self.arena.is_detached(SnapshotKey::new(index)) {
                tracing::debug!(resource = %snapshot.id(), "skipping detached snapshot");
                continue;
            }
            snapshot
                .persistency
                .save_changes(snapshot.id(), &mut *self.repository)?;
        }
        Ok(())
    }

    pub(crate) fn change_set(&self) -> ChangeSet {
        let mut builder = ChangeSetBuilder {
            arena: &*self.arena,
            changes: ChangeSet::default(),
        };
        self.unit_of_work.accept(&mut builder);
        builder.changes
    }
}

struct ChangeSetBuilder<'a> {
    arena: &'a SnapshotArena,
    changes: ChangeSet,
}

impl ChangeSetBuilder<'_> {
    fn id_of(&self, key: SnapshotKey) -> Option<ResourceId> {
        self.arena.get(key).ok().map(|snapshot| snapshot.id().clone())
    }

    /// New or dirty snapshot that will actually be written back
    fn replayed_id_of(&self, key: SnapshotKey) -> Option<ResourceId> {
        if self.arena.is_detached(key) {
            return None;
        }
        self.id_of(key)
    }
}

impl UnitOfWorkVisitor for ChangeSetBuilder<'_> {
    fn visit_new(&mut self, key: SnapshotKey) {
        if let Some(id) = self.replayed_id_of(key) {
            self.changes.created.push(id);
        }
    }

    fn visit_dirty(&mut self, key: SnapshotKey) {
        if let Some(id) = self.replayed_id_of(key) {
            self.changes.updated.push(id);
        }
    }

    fn visit_deleted(&mut self, key: SnapshotKey) {
        if let Some(id) = self.id_of(key) {
            self.changes.deleted.push(id);
        }
    }
}
