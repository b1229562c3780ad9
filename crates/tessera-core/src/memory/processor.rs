use crate::errors::{ExError, ExErrorKind};
use crate::external::{ChangeSet, ResourceProcessor};

/// Processor that keeps every change set it is handed
#[derive(Debug, Clone, Default)]
pub struct RecordingResourceProcessor {
    processed: Vec<ChangeSet>,
    fail: bool,
}

impl RecordingResourceProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A processor whose every call fails
    pub fn failing() -> Self {
        Self {
            processed: Vec::new(),
            fail: true,
        }
    }

    pub fn processed(&self) -> &[ChangeSet] {
        &self.processed
    }
}

impl ResourceProcessor for RecordingResourceProcessor {
    fn process(&mut self, changes: &ChangeSet) -> Result<(), ExError> {
        if self.fail {
            return Err(ExError::new(ExErrorKind::ExternalService)
                .with_op("process")
                .with_message("endpoint publication failed"));
        }
        self.processed.push(changes.clone());
        Ok(())
    }
}
