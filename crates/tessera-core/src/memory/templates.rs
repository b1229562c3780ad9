use std::collections::HashMap;

use crate::external::TemplateCatalog;
use crate::model::{HandlerType, Template, TemplateId};

/// Template catalog indexed by template id and by handler type
///
/// A handler type maps to the last template registered for it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateCatalog {
    templates: HashMap<TemplateId, Template>,
    by_handler: HashMap<HandlerType, TemplateId>,
}

impl InMemoryTemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let mut catalog = Self::new();
        for template in templates {
            catalog.register(template);
        }
        catalog
    }

    pub fn register(&mut self, template: Template) {
        self.by_handler
            .insert(template.handler_type().clone(), template.id().clone());
        self.templates.insert(template.id().clone(), template);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateCatalog for InMemoryTemplateCatalog {
    fn template_of_id(&self, template_id: &TemplateId) -> Option<&Template> {
        self.templates.get(template_id)
    }

    fn template_of_handler_type(&self, handler_type: &HandlerType) -> Option<&Template> {
        self.by_handler
            .get(handler_type)
            .and_then(|id| self.templates.get(id))
    }
}
