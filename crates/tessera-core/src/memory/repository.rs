use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::errors::{ExError, ExErrorKind};
use crate::external::{LinkHandle, Repository, ResourceRecord};
use crate::model::{AttachmentId, ResourceId};

/// One call the engine made against the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum RepositoryCall {
    LoadResource {
        id: ResourceId,
    },
    Attach {
        owner: ResourceId,
        attachment_id: AttachmentId,
        child: ResourceId,
    },
    Detach {
        owner: ResourceId,
        handle: LinkHandle,
    },
    AddMember {
        owner: ResourceId,
        member: ResourceId,
    },
    RemoveMember {
        owner: ResourceId,
        handle: LinkHandle,
    },
    FindAttachment {
        owner: ResourceId,
        attachment_id: AttachmentId,
    },
    FindMember {
        owner: ResourceId,
        member: ResourceId,
    },
}

impl RepositoryCall {
    /// Whether the call changes stored state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            RepositoryCall::Attach { .. }
                | RepositoryCall::Detach { .. }
                | RepositoryCall::AddMember { .. }
                | RepositoryCall::RemoveMember { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Link {
    Attachment {
        owner: ResourceId,
        attachment_id: AttachmentId,
        child: ResourceId,
    },
    Member {
        owner: ResourceId,
        member: ResourceId,
    },
}

impl Link {
    fn owner(&self) -> &ResourceId {
        match self {
            Link::Attachment { owner, .. } | Link::Member { owner, .. } => owner,
        }
    }

    fn target(&self) -> &ResourceId {
        match self {
            Link::Attachment { child, .. } => child,
            Link::Member { member, .. } => member,
        }
    }
}

/// HashMap-backed repository that records every call made against it
///
/// Removing a link removes the linked resource with its whole subtree.
/// Not thread-safe; a session borrows it mutably for its lifetime.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    resources: BTreeMap<ResourceId, ResourceRecord>,
    links: HashMap<LinkHandle, Link>,
    next_handle: u64,
    calls: Vec<RepositoryCall>,
    loads: usize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a parentless resource without recording a call
    pub fn seed_root(&mut self, id: ResourceId) {
        self.resources
            .entry(id.clone())
            .or_insert_with(|| ResourceRecord::new(id));
    }

    /// Store `child` in the slot `attachment_id` of `owner` without recording a call
    ///
    /// # Errors
    ///
    /// Fails like [`Repository::attach`].
    pub fn seed_attachment(
        &mut self,
        owner: &ResourceId,
        attachment_id: impl Into<AttachmentId>,
        child: ResourceId,
    ) -> Result<LinkHandle, ExError> {
        self.link_attachment(owner, &attachment_id.into(), &child)
    }

    /// Store `member` in container `owner` without recording a call
    ///
    /// # Errors
    ///
    /// Fails like [`Repository::add_member`].
    pub fn seed_member(&mut self, owner: &ResourceId, member: ResourceId) -> Result<LinkHandle, ExError> {
        self.link_member(owner, &member)
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&ResourceRecord> {
        self.resources.get(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.contains_key(id)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn calls(&self) -> &[RepositoryCall] {
        &self.calls
    }

    pub fn mutation_calls(&self) -> Vec<RepositoryCall> {
        self.calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    /// Total number of `load_resource` calls
    pub fn load_count(&self) -> usize {
        self.loads
    }

    pub fn load_count_of(&self, id: &ResourceId) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, RepositoryCall::LoadResource { id: loaded } if loaded == id))
            .count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
        self.loads = 0;
    }

    fn allocate_handle(&mut self, link: Link) -> LinkHandle {
        self.next_handle += 1;
        let handle = LinkHandle(self.next_handle);
        self.links.insert(handle, link);
        handle
    }

    fn owner_mut(&mut self, owner: &ResourceId) -> Result<&mut ResourceRecord, ExError> {
        self.resources.get_mut(owner).ok_or_else(|| {
            ExError::new(ExErrorKind::NotFound)
                .with_entity_id(owner.to_string())
                .with_message("owner not found")
        })
    }

    fn adopt(&mut self, owner: &ResourceId, child: &ResourceId) -> Result<(), ExError> {
        if self.resources.contains_key(child) {
            return Err(ExError::new(ExErrorKind::NameInUse)
                .with_entity_id(child.to_string())
                .with_message("resource already stored"));
        }
        let mut record = ResourceRecord::new(child.clone());
        record.parent = Some(owner.clone());
        self.resources.insert(child.clone(), record);
        Ok(())
    }

    fn link_attachment(
        &mut self,
        owner: &ResourceId,
        attachment_id: &AttachmentId,
        child: &ResourceId,
    ) -> Result<LinkHandle, ExError> {
        let record = self.owner_mut(owner)?;
        if record.attachments.iter().any(|(slot, _)| slot == attachment_id) {
            return Err(ExError::new(ExErrorKind::DuplicateAttachment)
                .with_entity_id(owner.to_string())
                .with_attachment_id(attachment_id.as_str()));
        }
        self.adopt(owner, child)?;
        self.owner_mut(owner)?
            .attachments
            .push((attachment_id.clone(), child.clone()));
        Ok(self.allocate_handle(Link::Attachment {
            owner: owner.clone(),
            attachment_id: attachment_id.clone(),
            child: child.clone(),
        }))
    }

    fn link_member(&mut self, owner: &ResourceId, member: &ResourceId) -> Result<LinkHandle, ExError> {
        if self.owner_mut(owner)?.members.contains(member) {
            return Err(ExError::new(ExErrorKind::NameInUse)
                .with_entity_id(owner.to_string())
                .with_message(format!("{} is already a member", member)));
        }
        self.adopt(owner, member)?;
        self.owner_mut(owner)?.members.push(member.clone());
        Ok(self.allocate_handle(Link::Member {
            owner: owner.clone(),
            member: member.clone(),
        }))
    }

    fn unlink(&mut self, owner: &ResourceId, handle: LinkHandle) -> Result<(), ExError> {
        let link = match self.links.get(&handle) {
            Some(link) if link.owner() == owner => link.clone(),
            _ => {
                return Err(ExError::new(ExErrorKind::NotFound)
                    .with_entity_id(owner.to_string())
                    .with_message(format!("no link {} on this owner", handle.0)))
            }
        };
        self.links.remove(&handle);

        let record = self.owner_mut(owner)?;
        match &link {
            Link::Attachment { attachment_id, .. } => {
                record.attachments.retain(|(slot, _)| slot != attachment_id)
            }
            Link::Member { member, .. } => record.members.retain(|held| held != member),
        }
        self.remove_subtree(link.target());
        Ok(())
    }

    fn remove_subtree(&mut self, root: &ResourceId) {
        let Some(record) = self.resources.remove(root) else {
            return;
        };
        self.links.retain(|_, link| link.owner() != root);
        for (_, child) in &record.attachments {
            self.remove_subtree(child);
        }
        for member in &record.members {
            self.remove_subtree(member);
        }
    }

    fn find_link(&self, predicate: impl Fn(&Link) -> bool) -> Option<LinkHandle> {
        self.links
            .iter()
            .find(|(_, link)| predicate(link))
            .map(|(handle, _)| *handle)
    }
}

impl Repository for InMemoryRepository {
    fn load_resource(&mut self, id: &ResourceId) -> Result<Option<ResourceRecord>, ExError> {
        self.loads += 1;
        self.calls.push(RepositoryCall::LoadResource { id: id.clone() });
        Ok(self.resources.get(id).cloned())
    }

    fn attach(
        &mut self,
        owner: &ResourceId,
        attachment_id: &AttachmentId,
        child: &ResourceId,
    ) -> Result<LinkHandle, ExError> {
        self.calls.push(RepositoryCall::Attach {
            owner: owner.clone(),
            attachment_id: attachment_id.clone(),
            child: child.clone(),
        });
        self.link_attachment(owner, attachment_id, child)
    }

    fn detach(&mut self, owner: &ResourceId, handle: LinkHandle) -> Result<(), ExError> {
        self.calls.push(RepositoryCall::Detach {
            owner: owner.clone(),
            handle,
        });
        self.unlink(owner, handle)
    }

    fn add_member(&mut self, owner: &ResourceId, member: &ResourceId) -> Result<LinkHandle, ExError> {
        self.calls.push(RepositoryCall::AddMember {
            owner: owner.clone(),
            member: member.clone(),
        });
        self.link_member(owner, member)
    }

    fn remove_member(&mut self, owner: &ResourceId, handle: LinkHandle) -> Result<(), ExError> {
        self.calls.push(RepositoryCall::RemoveMember {
            owner: owner.clone(),
            handle,
        });
        self.unlink(owner, handle)
    }

    fn find_attachment(
        &mut self,
        owner: &ResourceId,
        attachment_id: &AttachmentId,
    ) -> Result<Option<LinkHandle>, ExError> {
        self.calls.push(RepositoryCall::FindAttachment {
            owner: owner.clone(),
            attachment_id: attachment_id.clone(),
        });
        Ok(self.find_link(|link| {
            matches!(link, Link::Attachment { owner: o, attachment_id: a, .. } if o == owner && a == attachment_id)
        }))
    }

    fn find_member(
        &mut self,
        owner: &ResourceId,
        member: &ResourceId,
    ) -> Result<Option<LinkHandle>, ExError> {
        self.calls.push(RepositoryCall::FindMember {
            owner: owner.clone(),
            member: member.clone(),
        });
        Ok(self.find_link(|link| {
            matches!(link, Link::Member { owner: o, member: m } if o == owner && m == member)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder() -> ResourceId {
        ResourceId::new("f", "folder")
    }

    #[test]
    fn test_seed_does_not_record_calls() {
        let mut repo = InMemoryRepository::new();
        repo.seed_root(folder());
        repo.seed_member(&folder(), ResourceId::new("m", "doc"))
            .unwrap();

        assert!(repo.calls().is_empty());
        assert_eq!(
            repo.resource(&ResourceId::new("m", "doc")).unwrap().parent,
            Some(folder())
        );
    }

    #[test]
    fn test_detach_removes_subtree() {
        let mut repo = InMemoryRepository::new();
        repo.seed_root(folder());
        let child = ResourceId::new("c", "folder");
        let handle = repo.seed_attachment(&folder(), "att", child.clone()).unwrap();
        repo.seed_member(&child, ResourceId::new("m", "doc")).unwrap();

        repo.detach(&folder(), handle).unwrap();

        assert_eq!(repo.resource_count(), 1);
        assert!(repo.resource(&folder()).unwrap().attachments.is_empty());
        assert_eq!(repo.mutation_calls().len(), 1);
    }

    #[test]
    fn test_attach_to_taken_slot_fails() {
        let mut repo = InMemoryRepository::new();
        repo.seed_root(folder());
        repo.seed_attachment(&folder(), "att", ResourceId::new("a", "doc"))
            .unwrap();

        let err = repo
            .attach(&folder(), &AttachmentId::new("att"), &ResourceId::new("b", "doc"))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::DuplicateAttachment);
    }

    #[test]
    fn test_find_member_and_load_counting() {
        let mut repo = InMemoryRepository::new();
        repo.seed_root(folder());
        let member = ResourceId::new("m", "doc");
        let handle = repo.seed_member(&folder(), member.clone()).unwrap();

        assert_eq!(repo.find_member(&folder(), &member).unwrap(), Some(handle));
        repo.load_resource(&folder()).unwrap();
        repo.load_resource(&member).unwrap();
        assert_eq!(repo.load_count(), 2);
        assert_eq!(repo.load_count_of(&folder()), 1);
    }
}
