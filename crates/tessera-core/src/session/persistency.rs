//! Link-to-truth state of a snapshot
//!
//! ```text
//! PersistentReference --resolve--> Persistent --delete--> Deleted
//!                         Transient -----------delete--> Deleted
//! ```
//!
//! `Persistent` records every link change in a [`LinkDiff`] so that saving
//! replays exactly the net changes. `Transient` keeps no diff: saving pushes
//! all of its links once, since none of them exist in the repository yet.

use super::attachments::{Attachment, AttachmentCollection};
use super::members::{Member, MemberCollection};
use crate::errors::{Result, SessionError};
use crate::external::Repository;
use crate::model::{AttachmentId, ResourceId};

/// Observable phase of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStatus {
    PersistentReference,
    Persistent,
    Transient,
    Deleted,
}

/// Attachments and members of a resolved snapshot
#[derive(Debug, Clone, Default)]
pub struct Links {
    pub(crate) attachments: AttachmentCollection,
    pub(crate) members: MemberCollection,
}

impl Links {
    pub fn attachments(&self) -> &AttachmentCollection {
        &self.attachments
    }

    pub fn members(&self) -> &MemberCollection {
        &self.members
    }
}

/// Net link changes of a persistent snapshot since it was loaded
///
/// Adding and then removing the same link (or the reverse) cancels out, so
/// each set only ever holds changes that still need a repository call. Links
/// compare by snapshot as well as by id: a child deleted and re-created under
/// the same name is a different link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDiff {
    new_attachments: Vec<Attachment>,
    deleted_attachments: Vec<Attachment>,
    new_members: Vec<Member>,
    deleted_members: Vec<Member>,
}

impl LinkDiff {
    pub fn new_attachments(&self) -> &[Attachment] {
        &self.new_attachments
    }

    pub fn deleted_attachments(&self) -> &[Attachment] {
        &self.deleted_attachments
    }

    pub fn new_members(&self) -> &[Member] {
        &self.new_members
    }

    pub fn deleted_members(&self) -> &[Member] {
        &self.deleted_members
    }

    pub fn is_empty(&self) -> bool {
        self.new_attachments.is_empty()
            && self.deleted_attachments.is_empty()
            && self.new_members.is_empty()
            && self.deleted_members.is_empty()
    }

    fn record_attach(&mut self, attachment: &Attachment) {
        if !take(&mut self.deleted_attachments, attachment) {
            self.new_attachments.push(attachment.clone());
        }
    }

    fn record_detach(&mut self, attachment: &Attachment) {
        if !take(&mut self.new_attachments, attachment) {
            self.deleted_attachments.push(attachment.clone());
        }
    }

    fn record_add_member(&mut self, member: &Member) {
        if !take(&mut self.deleted_members, member) {
            self.new_members.push(member.clone());
        }
    }

    fn record_remove_member(&mut self, member: &Member) {
        if !take(&mut self.new_members, member) {
            self.deleted_members.push(member.clone());
        }
    }
}

/// Remove `entry` from `entries`, reporting whether it was there
fn take<T: PartialEq>(entries: &mut Vec<T>, entry: &T) -> bool {
    match entries.iter().position(|candidate| candidate == entry) {
        Some(position) => {
            entries.remove(position);
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone)]
pub enum PersistencyState {
    /// Known to exist in the repository, not loaded yet
    PersistentReference,
    /// Loaded from the repository; changes are diffed
    Persistent {
        links: Links,
        diff: LinkDiff,
        persisted_parent: Option<ResourceId>,
    },
    /// Created in this session
    Transient { links: Links },
    Deleted,
}

impl PersistencyState {
    pub(crate) fn persistent(links: Links, persisted_parent: Option<ResourceId>) -> Self {
        PersistencyState::Persistent {
            links,
            diff: LinkDiff::default(),
            persisted_parent,
        }
    }

    pub(crate) fn transient() -> Self {
        PersistencyState::Transient {
            links: Links::default(),
        }
    }

    pub fn status(&self) -> SnapshotStatus {
        match self {
            PersistencyState::PersistentReference => SnapshotStatus::PersistentReference,
            PersistencyState::Persistent { .. } => SnapshotStatus::Persistent,
            PersistencyState::Transient { .. } => SnapshotStatus::Transient,
            PersistencyState::Deleted => SnapshotStatus::Deleted,
        }
    }

    pub fn diff(&self) -> Option<&LinkDiff> {
        match self {
            PersistencyState::Persistent { diff, .. } => Some(diff),
            _ => None,
        }
    }

    pub(crate) fn persisted_parent(&self) -> Option<&ResourceId> {
        match self {
            PersistencyState::Persistent {
                persisted_parent, ..
            } => persisted_parent.as_ref(),
            _ => None,
        }
    }

    /// Links of a resolved snapshot; `None` when deleted or not loaded
    pub fn links(&self) -> Option<&Links> {
        match self {
            PersistencyState::Persistent { links, .. } | PersistencyState::Transient { links } => {
                Some(links)
            }
            PersistencyState::PersistentReference | PersistencyState::Deleted => None,
        }
    }

    fn links_mut(&mut self, owner: &ResourceId) -> Result<&mut Links> {
        match self {
            PersistencyState::Persistent { links, .. } | PersistencyState::Transient { links } => {
                Ok(links)
            }
            PersistencyState::Deleted => Err(SessionError::AlreadyDeleted {
                resource: owner.clone(),
            }),
            PersistencyState::PersistentReference => Err(unresolved(owner)),
        }
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        self.links()
            .map(|links| links.attachments.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn members(&self) -> Vec<Member> {
        self.links()
            .map(|links| links.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn attachment_by_id(&self, attachment_id: &AttachmentId) -> Option<&Attachment> {
        self.links()?.attachments.by_id(attachment_id)
    }

    pub fn attachment_by_resource(&self, resource: &ResourceId) -> Option<&Attachment> {
        self.links()?.attachments.by_resource(resource)
    }

    pub fn has_member(&self, resource: &ResourceId) -> bool {
        self.links()
            .is_some_and(|links| links.members.contains(resource))
    }

    pub fn primary_new_member(&self) -> Option<&Member> {
        self.links()?.members.primary_new_member()
    }

    pub(crate) fn check_can_attach(
        &self,
        owner: &ResourceId,
        attachment_id: &AttachmentId,
        name: &str,
    ) -> Result<()> {
        match self {
            PersistencyState::Deleted => Err(SessionError::AlreadyDeleted {
                resource: owner.clone(),
            }),
            PersistencyState::PersistentReference => Err(unresolved(owner)),
            PersistencyState::Persistent { links, .. } | PersistencyState::Transient { links } => {
                links.attachments.check_can_attach(owner, attachment_id, name)
            }
        }
    }

    pub(crate) fn attach(&mut self, owner: &ResourceId, attachment: Attachment) -> Result<()> {
        let recorded = attachment.clone();
        self.links_mut(owner)?.attachments.attach(owner, attachment)?;
        if let PersistencyState::Persistent { diff, .. } = self {
            diff.record_attach(&recorded);
        }
        Ok(())
    }

    /// Unlink an attachment; `None` when absent or when the snapshot is deleted
    pub(crate) fn detach(&mut self, attachment_id: &AttachmentId) -> Option<Attachment> {
        match self {
            PersistencyState::Persistent { links, diff, .. } => {
                let attachment = links.attachments.detach(attachment_id)?;
                diff.record_detach(&attachment);
                Some(attachment)
            }
            PersistencyState::Transient { links } => links.attachments.detach(attachment_id),
            PersistencyState::PersistentReference | PersistencyState::Deleted => None,
        }
    }

    pub(crate) fn add_member(&mut self, owner: &ResourceId, member: Member) -> Result<()> {
        let recorded = member.clone();
        self.links_mut(owner)?.members.add(owner, member, true)?;
        if let PersistencyState::Persistent { diff, .. } = self {
            diff.record_add_member(&recorded);
        }
        Ok(())
    }

    /// Unlink a member; `None` when absent or when the snapshot is deleted
    pub(crate) fn remove_member(&mut self, resource: &ResourceId) -> Option<Member> {
        match self {
            PersistencyState::Persistent { links, diff, .. } => {
                let member = links.members.remove(resource)?;
                diff.record_remove_member(&member);
                Some(member)
            }
            PersistencyState::Transient { links } => links.members.remove(resource),
            PersistencyState::PersistentReference | PersistencyState::Deleted => None,
        }
    }

    /// Push this snapshot's changes to the repository
    ///
    /// Removals are replayed before additions within each link family, so a
    /// slot emptied and refilled in one session is free when the new link is
    /// written.
    pub(crate) fn save_changes(
        &self,
        owner: &ResourceId,
        repository: &mut dyn Repository,
    ) -> Result<()> {
        match self {
            PersistencyState::PersistentReference | PersistencyState::Deleted => Ok(()),
            PersistencyState::Persistent { diff, .. } => save_diff(owner, diff, repository),
            PersistencyState::Transient { links } => save_links(owner, links, repository),
        }
    }
}

fn save_diff(owner: &ResourceId, diff: &LinkDiff, repository: &mut dyn Repository) -> Result<()> {
    for attachment in &diff.deleted_attachments {
        let handle = repository
            .find_attachment(owner, attachment.id())
            .map_err(SessionError::Repository)?
            .ok_or_else(|| SessionError::UnresolvableReference {
                resource: attachment.resource_id().clone(),
            })?;
        repository
            .detach(owner, handle)
            .map_err(SessionError::Repository)?;
    }
    for attachment in &diff.new_attachments {
        repository
            .attach(owner, attachment.id(), attachment.resource_id())
            .map_err(SessionError::Repository)?;
    }
    for member in &diff.deleted_members {
        let handle = repository
            .find_member(owner, member.resource_id())
            .map_err(SessionError::Repository)?
            .ok_or_else(|| SessionError::UnresolvableReference {
                resource: member.resource_id().clone(),
            })?;
        repository
            .remove_member(owner, handle)
            .map_err(SessionError::Repository)?;
    }
    for member in &diff.new_members {
        repository
            .add_member(owner, member.resource_id())
            .map_err(SessionError::Repository)?;
    }
    Ok(())
}

fn save_links(owner: &ResourceId, links: &Links, repository: &mut dyn Repository) -> Result<()> {
    for attachment in links.attachments.iter() {
        repository
            .attach(owner, attachment.id(), attachment.resource_id())
            .map_err(SessionError::Repository)?;
    }
    for member in links.members.iter() {
        repository
            .add_member(owner, member.resource_id())
            .map_err(SessionError::Repository)?;
    }
    Ok(())
}

fn unresolved(owner: &ResourceId) -> SessionError {
    SessionError::Internal {
        message: format!("snapshot of {} used before resolution", owner),
    }
}
