use std::collections::HashMap;

use tessera_core_types::SessionId;

use super::parent::ParentState;
use super::snapshot::{Snapshot, SnapshotKey};
use crate::errors::{Result, SessionError};
use crate::model::ResourceId;

/// Owner of every snapshot of one session
///
/// Slots are never removed, so keys stay valid for the whole session. The
/// cache maps each resource id to its current slot; re-creating a deleted
/// resource re-points the cache to a fresh slot.
#[derive(Debug, Default)]
pub(crate) struct SnapshotArena {
    slots: Vec<Snapshot>,
    cache: HashMap<ResourceId, SnapshotKey>,
}

impl SnapshotArena {
    pub(crate) fn insert(&mut self, mut snapshot: Snapshot, session: SessionId) -> Result<SnapshotKey> {
        snapshot.bind_session(session)?;
        let key = SnapshotKey::new(self.slots.len());
        self.cache.insert(snapshot.id().clone(), key);
        self.slots.push(snapshot);
        Ok(key)
    }

    pub(crate) fn lookup(&self, id: &ResourceId) -> Option<SnapshotKey> {
        self.cache.get(id).copied()
    }

    pub(crate) fn get(&self, key: SnapshotKey) -> Result<&Snapshot> {
        self.slots.get(key.index()).ok_or_else(|| stale(key))
    }

    pub(crate) fn get_mut(&mut self, key: SnapshotKey) -> Result<&mut Snapshot> {
        self.slots.get_mut(key.index()).ok_or_else(|| stale(key))
    }

    /// Snapshots in creation order; a child is always created after its parent
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.slots.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether `key` or one of its ancestors was soft-unlinked in this session
    ///
    /// The walk follows resolved parents and, for lazy parents, the cached
    /// snapshot of the persisted parent. An uncached lazy parent ends the walk.
    pub(crate) fn is_detached(&self, key: SnapshotKey) -> bool {
        let mut current = key;
        for _ in 0..=self.slots.len() {
            let Some(snapshot) = self.slots.get(current.index()) else {
                return false;
            };
            current = match &snapshot.parent {
                ParentState::Detached => return true,
                ParentState::Orphan => return false,
                ParentState::ChildOf(parent) => *parent,
                ParentState::PersistentParentOf(id) => match self.lookup(id) {
                    Some(parent) => parent,
                    None => return false,
                },
            };
        }
        false
    }
}

fn stale(key: SnapshotKey) -> SessionError {
    SessionError::Internal {
        message: format!("no snapshot in slot {}", key.index()),
    }
}
