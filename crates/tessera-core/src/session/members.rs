use std::collections::HashSet;

use super::snapshot::ResourceHandle;
use crate::errors::{Result, SessionError};
use crate::model::ResourceId;

/// One member of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    resource: ResourceId,
    handle: ResourceHandle,
}

impl Member {
    pub(crate) fn new(resource: ResourceId, handle: ResourceHandle) -> Self {
        Self { resource, handle }
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource
    }

    pub fn resource(&self) -> ResourceHandle {
        self.handle
    }
}

/// Members of one container, in insertion order
///
/// Also remembers, in order, which members were added during this session so
/// the first of them can be reported as the container's primary new member.
#[derive(Debug, Clone, Default)]
pub struct MemberCollection {
    members: Vec<Member>,
    index: HashSet<ResourceId>,
    added: Vec<ResourceId>,
}

impl MemberCollection {
    pub(crate) fn add(&mut self, owner: &ResourceId, member: Member, newly_added: bool) -> Result<()> {
        if self.index.contains(member.resource_id()) {
            return Err(SessionError::NameInUse {
                resource: owner.clone(),
                name: member.resource_id().name().to_string(),
            });
        }
        self.index.insert(member.resource_id().clone());
        if newly_added {
            self.added.push(member.resource_id().clone());
        }
        self.members.push(member);
        Ok(())
    }

    pub(crate) fn remove(&mut self, resource: &ResourceId) -> Option<Member> {
        if !self.index.remove(resource) {
            return None;
        }
        self.added.retain(|id| id != resource);
        let position = self
            .members
            .iter()
            .position(|member| member.resource_id() == resource)?;
        Some(self.members.remove(position))
    }

    pub fn contains(&self, resource: &ResourceId) -> bool {
        self.index.contains(resource)
    }

    pub fn get(&self, resource: &ResourceId) -> Option<&Member> {
        self.members
            .iter()
            .find(|member| member.resource_id() == resource)
    }

    /// Earliest member added in this session that is still a member
    pub fn primary_new_member(&self) -> Option<&Member> {
        self.added.first().and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
