use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a template in the template catalog
    TemplateId
);

string_id!(
    /// Tag naming the handler responsible for a kind of resource
    HandlerType
);

string_id!(
    /// Name of an attachment slot declared by a template
    AttachmentId
);

/// Value identity of a resource: its name within a template
///
/// Used as the key of the session cache and of every link collection, so two
/// ids are equal exactly when both name and template match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    name: String,
    template_id: TemplateId,
}

impl ResourceId {
    pub fn new(name: impl Into<String>, template_id: impl Into<TemplateId>) -> Self {
        Self {
            name: name.into(),
            template_id: template_id.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template_id(&self) -> &TemplateId {
        &self.template_id
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.template_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_resource_id_equality_is_by_value() {
        let a = ResourceId::new("r1", "tpl");
        let b = ResourceId::new("r1".to_string(), TemplateId::new("tpl"));
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_same_name_different_template_differs() {
        assert_ne!(ResourceId::new("r1", "a"), ResourceId::new("r1", "b"));
    }

    #[test]
    fn test_display() {
        assert_eq!(ResourceId::new("r1", "tpl").to_string(), "r1@tpl");
        assert_eq!(AttachmentId::new("att").to_string(), "att");
    }

    #[test]
    fn test_serde_shape() {
        let id = ResourceId::new("r1", "tpl");
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::json!({"name": "r1", "template_id": "tpl"}));
    }
}
