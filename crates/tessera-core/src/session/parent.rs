use super::snapshot::SnapshotKey;
use crate::model::ResourceId;

/// Where a snapshot hangs in the resource tree
///
/// `PersistentParentOf` is the lazy form: the parent of the named resource is
/// only known after the resource is loaded. Resolving it is one way and ends
/// in `ChildOf` or `Orphan`.
///
/// `Detached` marks a snapshot unlinked by `soft_detach` or
/// `soft_remove_member`. It reads as a root, but nothing under it is written
/// back on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentState {
    Orphan,
    Detached,
    ChildOf(SnapshotKey),
    PersistentParentOf(ResourceId),
}

impl ParentState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ParentState::PersistentParentOf(_))
    }

    /// The resolved parent, `None` while still unresolved
    pub fn resolved(&self) -> Option<Option<SnapshotKey>> {
        match self {
            ParentState::Orphan | ParentState::Detached => Some(None),
            ParentState::ChildOf(key) => Some(Some(*key)),
            ParentState::PersistentParentOf(_) => None,
        }
    }

    pub(crate) fn from_parent(parent: Option<SnapshotKey>) -> Self {
        parent.map_or(ParentState::Orphan, ParentState::ChildOf)
    }
}
