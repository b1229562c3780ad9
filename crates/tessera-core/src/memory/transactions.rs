use crate::errors::{ExError, ExErrorKind};
use crate::external::{Transaction, TransactionManager};

/// Transaction that only counts what happened to it
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransaction {
    commits: usize,
    rollbacks: usize,
    fail_commit: bool,
    fail_rollback: bool,
}

impl Transaction for InMemoryTransaction {
    fn commit(&mut self) -> Result<(), ExError> {
        if self.fail_commit {
            return Err(ExError::new(ExErrorKind::Transaction)
                .with_op("commit")
                .with_message("commit refused"));
        }
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ExError> {
        if self.fail_rollback {
            return Err(ExError::new(ExErrorKind::Transaction)
                .with_op("rollback")
                .with_message("rollback refused"));
        }
        self.rollbacks += 1;
        Ok(())
    }
}

/// Transaction manager with a single, reusable transaction
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransactionManager {
    transaction: InMemoryTransaction,
}

impl InMemoryTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later commit fail
    pub fn fail_commits(&mut self) {
        self.transaction.fail_commit = true;
    }

    /// Make every later rollback fail
    pub fn fail_rollbacks(&mut self) {
        self.transaction.fail_rollback = true;
    }

    pub fn commit_count(&self) -> usize {
        self.transaction.commits
    }

    pub fn rollback_count(&self) -> usize {
        self.transaction.rollbacks
    }
}

impl TransactionManager for InMemoryTransactionManager {
    fn current_transaction(&mut self) -> &mut dyn Transaction {
        &mut self.transaction
    }
}
