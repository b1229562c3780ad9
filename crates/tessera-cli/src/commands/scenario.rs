//! Scenario file format
//!
//! ```json
//! {
//!   "templates": [
//!     { "id": "site", "handler_type": "SiteHandler", "kind": "resource",
//!       "attachments": { "blog": "blog" } },
//!     { "id": "blog", "handler_type": "BlogHandler", "kind": "container",
//!       "member_template": "post" },
//!     { "id": "post", "handler_type": "PostHandler", "kind": "resource" }
//!   ],
//!   "resources": [
//!     { "id": { "name": "s1", "template_id": "site" } },
//!     { "id": { "name": "news", "template_id": "blog" },
//!       "parent": { "name": "s1", "template_id": "site" }, "attachment": "blog" }
//!   ],
//!   "steps": [
//!     { "op": "find", "name": "news", "handler": "BlogHandler", "as": "blog" },
//!     { "op": "add_member", "container": "blog", "name": "m1" }
//!   ]
//! }
//! ```
//!
//! Resources are seeded in order, so parents must come first. A resource with
//! a parent but no attachment is seeded as a member of its parent. Steps refer
//! to snapshots through the labels given by `as`.

use serde::Deserialize;
use tessera_core::memory::{InMemoryRepository, InMemoryTemplateCatalog};
use tessera_core::{AttachmentId, ExError, HandlerType, ResourceId, Template};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub templates: Vec<Template>,
    #[serde(default)]
    pub resources: Vec<SeedResource>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedResource {
    pub id: ResourceId,
    #[serde(default)]
    pub parent: Option<ResourceId>,
    #[serde(default)]
    pub attachment: Option<AttachmentId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    Find {
        name: String,
        handler: HandlerType,
        #[serde(rename = "as")]
        label: String,
    },
    CreateAttachment {
        owner: String,
        attachment: AttachmentId,
        name: String,
        handler: HandlerType,
        #[serde(default, rename = "as")]
        label: Option<String>,
    },
    RemoveAttachment {
        owner: String,
        attachment: AttachmentId,
    },
    SoftDetach {
        owner: String,
        attachment: AttachmentId,
        #[serde(default, rename = "as")]
        label: Option<String>,
    },
    AddMember {
        container: String,
        name: String,
        #[serde(default, rename = "as")]
        label: Option<String>,
    },
    RemoveMember {
        container: String,
        member: String,
    },
    Modify {
        target: String,
    },
    Delete {
        target: String,
    },
}

impl Scenario {
    pub fn catalog(&self) -> InMemoryTemplateCatalog {
        InMemoryTemplateCatalog::from_templates(self.templates.iter().cloned())
    }

    /// Repository holding the seeded resources
    ///
    /// # Errors
    ///
    /// Returns an error when a parent is missing or a slot is seeded twice.
    pub fn repository(&self) -> Result<InMemoryRepository, ExError> {
        let mut repository = InMemoryRepository::new();
        for seed in &self.resources {
            match (&seed.parent, &seed.attachment) {
                (None, _) => repository.seed_root(seed.id.clone()),
                (Some(parent), Some(attachment)) => {
                    repository.seed_attachment(parent, attachment.clone(), seed.id.clone())?;
                }
                (Some(parent), None) => {
                    repository.seed_member(parent, seed.id.clone())?;
                }
            }
        }
        Ok(repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "templates": [
            { "id": "site", "handler_type": "SiteHandler", "kind": "resource",
              "attachments": { "blog": "blog" } },
            { "id": "blog", "handler_type": "BlogHandler", "kind": "container",
              "member_template": "post" },
            { "id": "post", "handler_type": "PostHandler", "kind": "resource" }
        ],
        "resources": [
            { "id": { "name": "s1", "template_id": "site" } },
            { "id": { "name": "news", "template_id": "blog" },
              "parent": { "name": "s1", "template_id": "site" }, "attachment": "blog" },
            { "id": { "name": "p1", "template_id": "post" },
              "parent": { "name": "news", "template_id": "blog" } }
        ],
        "steps": [
            { "op": "find", "name": "news", "handler": "BlogHandler", "as": "blog" },
            { "op": "remove_member", "container": "blog", "member": "p1" }
        ]
    }"#;

    #[test]
    fn test_parse_and_seed() {
        let scenario: Scenario = serde_json::from_str(SCENARIO).unwrap();
        assert_eq!(scenario.templates.len(), 3);
        assert_eq!(scenario.steps.len(), 2);
        assert!(matches!(&scenario.steps[1], Step::RemoveMember { member, .. } if member == "p1"));

        let repository = scenario.repository().unwrap();
        let news = repository
            .resource(&ResourceId::new("news", "blog"))
            .unwrap();
        assert_eq!(news.members, vec![ResourceId::new("p1", "post")]);
        assert!(repository.calls().is_empty());
    }

    #[test]
    fn test_member_of_unknown_parent_fails() {
        let scenario = Scenario {
            templates: Vec::new(),
            resources: vec![SeedResource {
                id: ResourceId::new("p1", "post"),
                parent: Some(ResourceId::new("missing", "blog")),
                attachment: None,
            }],
            steps: Vec::new(),
        };

        assert!(scenario.repository().is_err());
    }
}
