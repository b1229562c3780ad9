//! Session-scoped snapshots and the handles callers use to address them

use tessera_core_types::SessionId;

use super::parent::ParentState;
use super::persistency::{LinkDiff, PersistencyState, SnapshotStatus};
use crate::errors::{Result, SessionError};
use crate::model::{HandlerType, ResourceId, Template, TemplateId};

/// Index of a snapshot slot in the session arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey(usize);

impl SnapshotKey {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Shape of a snapshot, fixed when the factory builds it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Resource,
    Container,
}

/// Address of a snapshot inside one write session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    session: SessionId,
    key: SnapshotKey,
}

impl ResourceHandle {
    pub(crate) fn new(session: SessionId, key: SnapshotKey) -> Self {
        Self { session, key }
    }

    pub fn session_id(&self) -> SessionId {
        self.session
    }

    pub(crate) fn key(&self) -> SnapshotKey {
        self.key
    }
}

/// Address of a container snapshot; the only way to reach member operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHandle(ResourceHandle);

impl ContainerHandle {
    pub(crate) fn new(handle: ResourceHandle) -> Self {
        Self(handle)
    }

    pub fn as_resource(&self) -> ResourceHandle {
        self.0
    }
}

impl From<ContainerHandle> for ResourceHandle {
    fn from(handle: ContainerHandle) -> Self {
        handle.0
    }
}

/// Mutable view of one resource while a write session is open
#[derive(Debug)]
pub struct Snapshot {
    id: ResourceId,
    handler_type: HandlerType,
    kind: SnapshotKind,
    membership_aware: bool,
    session: Option<SessionId>,
    pub(crate) parent: ParentState,
    pub(crate) persistency: PersistencyState,
}

impl Snapshot {
    pub(crate) fn new(
        id: ResourceId,
        template: &Template,
        parent: ParentState,
        persistency: PersistencyState,
    ) -> Self {
        let kind = if template.is_container() {
            SnapshotKind::Container
        } else {
            SnapshotKind::Resource
        };
        Self {
            id,
            handler_type: template.handler_type().clone(),
            kind,
            membership_aware: template.is_membership_aware(),
            session: None,
            parent,
            persistency,
        }
    }

    /// Bind the snapshot to its owning session; a snapshot is bound exactly once
    pub(crate) fn bind_session(&mut self, session: SessionId) -> Result<()> {
        match self.session {
            None => {
                self.session = Some(session);
                Ok(())
            }
            Some(existing) => Err(SessionError::SessionMismatch {
                expected: existing,
                found: session,
            }),
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }

    pub fn template_id(&self) -> &TemplateId {
        self.id.template_id()
    }

    pub fn handler_type(&self) -> &HandlerType {
        &self.handler_type
    }

    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }

    pub fn is_container(&self) -> bool {
        self.kind == SnapshotKind::Container
    }

    pub fn is_membership_aware(&self) -> bool {
        self.membership_aware
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session
    }

    pub fn status(&self) -> SnapshotStatus {
        self.persistency.status()
    }

    pub fn is_deleted(&self) -> bool {
        self.status() == SnapshotStatus::Deleted
    }

    /// Pending link changes of a persistent snapshot
    pub fn diff(&self) -> Option<&LinkDiff> {
        self.persistency.diff()
    }

    pub fn parent_state(&self) -> &ParentState {
        &self.parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(template: &Template) -> Snapshot {
        Snapshot::new(
            ResourceId::new("r", template.id().clone()),
            template,
            ParentState::Orphan,
            PersistencyState::PersistentReference,
        )
    }

    #[test]
    fn test_kind_follows_template() {
        let container = Template::container("c", "ContainerHandler", "m");
        let resource = Template::resource("r", "ResourceHandler");

        assert_eq!(snapshot(&container).kind(), SnapshotKind::Container);
        assert_eq!(snapshot(&resource).kind(), SnapshotKind::Resource);
        assert_eq!(
            snapshot(&resource).handler_type(),
            &HandlerType::new("ResourceHandler")
        );
    }

    #[test]
    fn test_session_bound_exactly_once() {
        let template = Template::resource("r", "ResourceHandler");
        let mut snap = snapshot(&template);
        let first = SessionId::new();

        snap.bind_session(first).unwrap();
        assert_eq!(snap.session_id(), Some(first));

        let result = snap.bind_session(SessionId::new());
        assert!(matches!(
            result,
            Err(SessionError::SessionMismatch { expected, .. }) if expected == first
        ));
    }
}
