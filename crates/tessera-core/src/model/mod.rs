pub mod resource;
pub mod template;

pub use resource::{AttachmentId, HandlerType, ResourceId, TemplateId};
pub use template::{Template, TemplateKind};
