use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::resource::{AttachmentId, HandlerType, TemplateId};

/// Shape of the resources described by a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateKind {
    /// Plain resource without members
    Resource,
    /// Resource owning an ordered set of members
    Container {
        /// Template of the members created through this container
        member_template: TemplateId,
        /// Membership-aware containers surface member information through
        /// their own parent, so membership changes also touch the parent
        #[serde(default)]
        membership_aware: bool,
    },
}

/// External metadata describing a kind of resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    id: TemplateId,
    handler_type: HandlerType,
    #[serde(flatten)]
    kind: TemplateKind,
    #[serde(default)]
    attachments: BTreeMap<AttachmentId, TemplateId>,
}

impl Template {
    /// Template for plain resources
    pub fn resource(id: impl Into<TemplateId>, handler_type: impl Into<HandlerType>) -> Self {
        Self {
            id: id.into(),
            handler_type: handler_type.into(),
            kind: TemplateKind::Resource,
            attachments: BTreeMap::new(),
        }
    }

    /// Template for containers whose members use `member_template`
    pub fn container(
        id: impl Into<TemplateId>,
        handler_type: impl Into<HandlerType>,
        member_template: impl Into<TemplateId>,
    ) -> Self {
        Self {
            id: id.into(),
            handler_type: handler_type.into(),
            kind: TemplateKind::Container {
                member_template: member_template.into(),
                membership_aware: false,
            },
            attachments: BTreeMap::new(),
        }
    }

    /// Declare an attachment slot pointing at resources of `template`
    pub fn with_attachment(
        mut self,
        attachment_id: impl Into<AttachmentId>,
        template: impl Into<TemplateId>,
    ) -> Self {
        self.attachments.insert(attachment_id.into(), template.into());
        self
    }

    /// Mark a container template as membership aware (no-op for resources)
    pub fn membership_aware(mut self) -> Self {
        if let TemplateKind::Container {
            membership_aware, ..
        } = &mut self.kind
        {
            *membership_aware = true;
        }
        self
    }

    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    pub fn handler_type(&self) -> &HandlerType {
        &self.handler_type
    }

    pub fn kind(&self) -> &TemplateKind {
        &self.kind
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, TemplateKind::Container { .. })
    }

    pub fn is_membership_aware(&self) -> bool {
        matches!(
            self.kind,
            TemplateKind::Container {
                membership_aware: true,
                ..
            }
        )
    }

    /// Template of the resources held in the `attachment_id` slot, if declared
    pub fn attached_template(&self, attachment_id: &AttachmentId) -> Option<&TemplateId> {
        self.attachments.get(attachment_id)
    }

    /// Template of the members of a container template
    pub fn member_template(&self) -> Option<&TemplateId> {
        match &self.kind {
            TemplateKind::Container {
                member_template, ..
            } => Some(member_template),
            TemplateKind::Resource => None,
        }
    }

    pub fn attachment_ids(&self) -> impl Iterator<Item = &AttachmentId> {
        self.attachments.keys()
    }
}
