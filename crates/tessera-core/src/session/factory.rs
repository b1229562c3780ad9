use super::parent::ParentState;
use super::persistency::PersistencyState;
use super::snapshot::{Snapshot, SnapshotKey};
use crate::errors::{Result, SessionError};
use crate::external::TemplateCatalog;
use crate::model::{HandlerType, ResourceId, Template, TemplateId};

/// Builds snapshots, choosing their shape from template metadata
///
/// The shape (plain resource or container) is decided here and nowhere else.
#[derive(Clone, Copy)]
pub(crate) struct SnapshotFactory<'t> {
    templates: &'t dyn TemplateCatalog,
}

impl<'t> SnapshotFactory<'t> {
    pub(crate) fn new(templates: &'t dyn TemplateCatalog) -> Self {
        Self { templates }
    }

    pub(crate) fn template(&self, template_id: &TemplateId) -> Result<&'t Template> {
        self.templates
            .template_of_id(template_id)
            .ok_or_else(|| SessionError::UnknownTemplate {
                template_id: template_id.clone(),
            })
    }

    pub(crate) fn template_of_handler(&self, handler_type: &HandlerType) -> Result<&'t Template> {
        self.templates
            .template_of_handler_type(handler_type)
            .ok_or_else(|| SessionError::UnknownHandler {
                handler_type: handler_type.clone(),
            })
    }

    /// Snapshot of a resource that exists in the repository but is not loaded
    pub(crate) fn new_persistent_reference(&self, id: ResourceId) -> Result<Snapshot> {
        let template = self.template(id.template_id())?;
        let parent = ParentState::PersistentParentOf(id.clone());
        Ok(Snapshot::new(
            id,
            template,
            parent,
            PersistencyState::PersistentReference,
        ))
    }

    /// Snapshot of a resource created in this session
    pub(crate) fn new_transient(
        &self,
        id: ResourceId,
        parent: Option<SnapshotKey>,
    ) -> Result<Snapshot> {
        let template = self.template(id.template_id())?;
        Ok(Snapshot::new(
            id,
            template,
            ParentState::from_parent(parent),
            PersistencyState::transient(),
        ))
    }
}

impl std::fmt::Debug for SnapshotFactory<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotFactory").finish_non_exhaustive()
    }
}
