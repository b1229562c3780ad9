use std::collections::{BTreeMap, HashMap};

use super::snapshot::ResourceHandle;
use crate::errors::{Result, SessionError};
use crate::model::{AttachmentId, ResourceId};

/// A named, single-valued link from a resource to a child resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    id: AttachmentId,
    resource: ResourceId,
    handle: ResourceHandle,
}

impl Attachment {
    pub(crate) fn new(id: AttachmentId, resource: ResourceId, handle: ResourceHandle) -> Self {
        Self {
            id,
            resource,
            handle,
        }
    }

    pub fn id(&self) -> &AttachmentId {
        &self.id
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource
    }

    pub fn resource(&self) -> ResourceHandle {
        self.handle
    }
}

/// Attachments of one resource
///
/// Bijective: each attachment id holds one child, and each child name appears
/// under at most one attachment id.
#[derive(Debug, Clone, Default)]
pub struct AttachmentCollection {
    by_id: BTreeMap<AttachmentId, Attachment>,
    by_name: HashMap<String, AttachmentId>,
}

impl AttachmentCollection {
    /// # Errors
    ///
    /// `DuplicateAttachmentId` if the slot is taken, `NameInUse` if another
    /// attachment already points at a resource called `name`.
    pub fn check_can_attach(
        &self,
        owner: &ResourceId,
        attachment_id: &AttachmentId,
        name: &str,
    ) -> Result<()> {
        if self.by_id.contains_key(attachment_id) {
            return Err(SessionError::DuplicateAttachmentId {
                resource: owner.clone(),
                attachment_id: attachment_id.clone(),
            });
        }
        if self.by_name.contains_key(name) {
            return Err(SessionError::NameInUse {
                resource: owner.clone(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn attach(&mut self, owner: &ResourceId, attachment: Attachment) -> Result<()> {
        self.check_can_attach(owner, attachment.id(), attachment.resource_id().name())?;
        self.by_name.insert(
            attachment.resource_id().name().to_string(),
            attachment.id().clone(),
        );
        self.by_id.insert(attachment.id().clone(), attachment);
        Ok(())
    }

    pub(crate) fn detach(&mut self, attachment_id: &AttachmentId) -> Option<Attachment> {
        let attachment = self.by_id.remove(attachment_id)?;
        self.by_name.remove(attachment.resource_id().name());
        Some(attachment)
    }

    pub fn by_id(&self, attachment_id: &AttachmentId) -> Option<&Attachment> {
        self.by_id.get(attachment_id)
    }

    pub fn by_resource(&self, resource: &ResourceId) -> Option<&Attachment> {
        self.by_name
            .get(resource.name())
            .and_then(|id| self.by_id.get(id))
            .filter(|attachment| attachment.resource_id() == resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::snapshot::SnapshotKey;
    use tessera_core_types::SessionId;

    fn owner() -> ResourceId {
        ResourceId::new("owner", "tpl")
    }

    fn attachment(id: &str, name: &str, slot: usize) -> Attachment {
        Attachment::new(
            AttachmentId::new(id),
            ResourceId::new(name, "child"),
            ResourceHandle::new(SessionId::new(), SnapshotKey::new(slot)),
        )
    }

    #[test]
    fn test_attach_and_lookup_both_ways() {
        let mut attachments = AttachmentCollection::default();
        attachments
            .attach(&owner(), attachment("address", "a1", 1))
            .unwrap();

        assert_eq!(attachments.len(), 1);
        assert!(attachments.by_id(&AttachmentId::new("address")).is_some());
        let found = attachments
            .by_resource(&ResourceId::new("a1", "child"))
            .unwrap();
        assert_eq!(found.id(), &AttachmentId::new("address"));
        assert!(attachments
            .by_resource(&ResourceId::new("a1", "other"))
            .is_none());
    }

    #[test]
    fn test_duplicate_attachment_id_rejected() {
        let mut attachments = AttachmentCollection::default();
        attachments
            .attach(&owner(), attachment("address", "a1", 1))
            .unwrap();

        let result = attachments.attach(&owner(), attachment("address", "a2", 2));
        assert!(matches!(
            result,
            Err(SessionError::DuplicateAttachmentId { .. })
        ));
    }

    #[test]
    fn test_name_reuse_rejected() {
        let mut attachments = AttachmentCollection::default();
        attachments
            .attach(&owner(), attachment("address", "a1", 1))
            .unwrap();

        let result = attachments.attach(&owner(), attachment("billing", "a1", 2));
        assert!(matches!(result, Err(SessionError::NameInUse { name, .. }) if name == "a1"));
    }

    #[test]
    fn test_detach_frees_id_and_name() {
        let mut attachments = AttachmentCollection::default();
        attachments
            .attach(&owner(), attachment("address", "a1", 1))
            .unwrap();

        let detached = attachments.detach(&AttachmentId::new("address")).unwrap();
        assert_eq!(detached.resource_id().name(), "a1");
        assert!(attachments.is_empty());
        attachments
            .attach(&owner(), attachment("address", "a1", 2))
            .unwrap();
    }
}
