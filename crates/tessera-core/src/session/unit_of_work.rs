//! Per-session ledger of new, dirty and deleted snapshots
//!
//! The three lists are pairwise disjoint at every point in time:
//! - a snapshot deleted while still new disappears without a trace
//! - a dirty snapshot that gets deleted moves to the deleted list
//! - nothing deleted can become dirty again

use tessera_core_types::schema::{EVENT_CREATED, EVENT_DELETED, EVENT_UPDATED};

use super::snapshot::SnapshotKey;
use crate::errors::{Result, SessionError};
use crate::log_ledger_event;
use crate::model::ResourceId;

/// Which list of the ledger holds a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntry {
    New,
    Dirty,
    Deleted,
}

/// Walks the ledger in replay order
pub(crate) trait UnitOfWorkVisitor {
    fn visit_new(&mut self, key: SnapshotKey);
    fn visit_dirty(&mut self, key: SnapshotKey);
    fn visit_deleted(&mut self, key: SnapshotKey);
}

#[derive(Debug, Default)]
pub(crate) struct UnitOfWork {
    new: Vec<SnapshotKey>,
    dirty: Vec<SnapshotKey>,
    deleted: Vec<SnapshotKey>,
}

impl UnitOfWork {
    /// # Errors
    ///
    /// Returns `AlreadyRegistered` when the snapshot is already in the ledger.
    pub(crate) fn register_new(&mut self, key: SnapshotKey, id: &ResourceId) -> Result<()> {
        if self.ledger_entry(key).is_some() {
            return Err(SessionError::AlreadyRegistered {
                resource: id.clone(),
            });
        }
        self.new.push(key);
        log_ledger_event!(EVENT_CREATED, id);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AlreadyDeleted` when the snapshot was deleted in this session.
    pub(crate) fn register_dirty(&mut self, key: SnapshotKey, id: &ResourceId) -> Result<()> {
        match self.ledger_entry(key) {
            Some(LedgerEntry::Deleted) => Err(SessionError::AlreadyDeleted {
                resource: id.clone(),
            }),
            Some(LedgerEntry::New) | Some(LedgerEntry::Dirty) => Ok(()),
            None => {
                self.dirty.push(key);
                log_ledger_event!(EVENT_UPDATED, id);
                Ok(())
            }
        }
    }

    pub(crate) fn register_deleted(&mut self, key: SnapshotKey, id: &ResourceId) {
        if remove_key(&mut self.new, key) {
            return;
        }
        remove_key(&mut self.dirty, key);
        if !self.deleted.contains(&key) {
            self.deleted.push(key);
            log_ledger_event!(EVENT_DELETED, id);
        }
    }

    pub(crate) fn ledger_entry(&self, key: SnapshotKey) -> Option<LedgerEntry> {
        if self.new.contains(&key) {
            Some(LedgerEntry::New)
        } else if self.dirty.contains(&key) {
            Some(LedgerEntry::Dirty)
        } else if self.deleted.contains(&key) {
            Some(LedgerEntry::Deleted)
        } else {
            None
        }
    }

    /// Visit new, then dirty, then deleted snapshots, each list in FIFO order
    pub(crate) fn accept(&self, visitor: &mut dyn UnitOfWorkVisitor) {
        for key in &self.new {
            visitor.visit_new(*key);
        }
        for key in &self.dirty {
            visitor.visit_dirty(*key);
        }
        for key in &self.deleted {
            visitor.visit_deleted(*key);
        }
    }

    pub(crate) fn new_keys(&self) -> &[SnapshotKey] {
        &self.new
    }

    pub(crate) fn dirty_keys(&self) -> &[SnapshotKey] {
        &self.dirty
    }

    pub(crate) fn deleted_keys(&self) -> &[SnapshotKey] {
        &self.deleted
    }
}

fn remove_key(keys: &mut Vec<SnapshotKey>, key: SnapshotKey) -> bool {
    match keys.iter().position(|candidate| *candidate == key) {
        Some(position) => {
            keys.remove(position);
            true
        }
        None => false,
    }
}
