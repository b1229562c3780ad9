use tessera_core_types::SessionId;
use thiserror::Error;

use crate::model::{AttachmentId, HandlerType, ResourceId, TemplateId};

/// Result type alias using SessionError
pub type Result<T> = std::result::Result<T, SessionError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers (and the transport layer
/// sitting above the engine) can match on without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Session lifecycle
    SessionNotActive,
    SessionMismatch,

    // Snapshot state
    Deleted,
    AlreadyRegistered,

    // Template metadata
    UnknownTemplate,
    UnknownHandler,
    UnknownAttachment,
    IncompatibleType,

    // Link invariants
    DuplicateAttachment,
    NameInUse,

    // Data integrity
    NotFound,
    UnresolvableReference,

    // Integration
    Persistence,
    Transaction,
    ExternalService,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::SessionNotActive => "ERR_SESSION_NOT_ACTIVE",
            ExErrorKind::SessionMismatch => "ERR_SESSION_MISMATCH",
            ExErrorKind::Deleted => "ERR_DELETED",
            ExErrorKind::AlreadyRegistered => "ERR_ALREADY_REGISTERED",
            ExErrorKind::UnknownTemplate => "ERR_UNKNOWN_TEMPLATE",
            ExErrorKind::UnknownHandler => "ERR_UNKNOWN_HANDLER",
            ExErrorKind::UnknownAttachment => "ERR_UNKNOWN_ATTACHMENT",
            ExErrorKind::IncompatibleType => "ERR_INCOMPATIBLE_TYPE",
            ExErrorKind::DuplicateAttachment => "ERR_DUPLICATE_ATTACHMENT",
            ExErrorKind::NameInUse => "ERR_NAME_IN_USE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::UnresolvableReference => "ERR_UNRESOLVABLE_REFERENCE",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Transaction => "ERR_TRANSACTION",
            ExErrorKind::ExternalService => "ERR_EXTERNAL_SERVICE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Collaborators (repository, transaction manager, resource processor) report
/// failures with this type, and every `SessionError` converts into it for
/// logging and for callers that only care about the stable code.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    attachment_id: Option<String>,
    session_id: Option<SessionId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            attachment_id: None,
            session_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity (resource) ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add attachment ID context
    pub fn with_attachment_id(mut self, id: impl Into<String>) -> Self {
        self.attachment_id = Some(id.into());
        self
    }

    /// Add session ID context
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the attachment ID context, if any
    pub fn attachment_id(&self) -> Option<&str> {
        self.attachment_id.as_deref()
    }

    /// Get the session ID context, if any
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(attachment_id) = &self.attachment_id {
            write!(f, " (attachment_id: {})", attachment_id)?;
        }
        if let Some(session_id) = &self.session_id {
            write!(f, " (session_id: {})", session_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for write session operations
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    // ===== Session lifecycle =====
    /// Operation attempted after the session completed or aborted
    #[error("Session {session_id} is not active (status: {status})")]
    SessionNotActive {
        session_id: SessionId,
        status: &'static str,
    },

    /// Snapshot handle belongs to another session, or a snapshot was bound twice
    #[error("Snapshot belongs to session {found}, not {expected}")]
    SessionMismatch {
        expected: SessionId,
        found: SessionId,
    },

    // ===== Snapshot state =====
    /// Mutating a snapshot that was deleted in this session
    #[error("Resource was deleted: {resource}")]
    AlreadyDeleted { resource: ResourceId },

    /// Snapshot registered as new twice, or as new after being dirty/deleted
    #[error("Resource is already registered in the unit of work: {resource}")]
    AlreadyRegistered { resource: ResourceId },

    // ===== Template metadata =====
    /// No template is registered under this id
    #[error("Unknown template: {template_id}")]
    UnknownTemplate { template_id: TemplateId },

    /// No template is registered for this handler type
    #[error("Unknown handler type: {handler_type}")]
    UnknownHandler { handler_type: HandlerType },

    /// Requested snapshot shape does not match the resource's template
    #[error("Resource {resource} is not a {expected}")]
    IncompatibleSnapshotType {
        resource: ResourceId,
        expected: &'static str,
    },

    /// Handler type does not match the template declared for an attachment slot
    #[error("Handler {handler_type} is incompatible with attachment {attachment_id} (expects template {expected})")]
    IncompatibleHandler {
        attachment_id: AttachmentId,
        handler_type: HandlerType,
        expected: TemplateId,
    },

    /// Template of the resource declares no such attachment slot
    #[error("Resource {resource} declares no attachment {attachment_id}")]
    UnknownAttachment {
        resource: ResourceId,
        attachment_id: AttachmentId,
    },

    // ===== Link invariants =====
    /// Attachment slot already holds a resource
    #[error("Attachment {attachment_id} is already in use in resource {resource}")]
    DuplicateAttachmentId {
        resource: ResourceId,
        attachment_id: AttachmentId,
    },

    /// Target name already used by another link of the same resource
    #[error("Name {name} is already in use in resource {resource}")]
    NameInUse { resource: ResourceId, name: String },

    // ===== Data integrity =====
    /// Repository cannot locate a resource the session expected to exist
    #[error("Unresolvable reference to resource {resource}")]
    UnresolvableReference { resource: ResourceId },

    // ===== Collaborator failures =====
    /// Commit or rollback failed in the transaction manager
    #[error("Transaction failure: {0}")]
    TransactionFailure(#[source] ExError),

    /// Repository call failed
    #[error("Repository failure: {0}")]
    Repository(#[source] ExError),

    /// Resource processor rejected the change set
    #[error("Resource processing failure: {0}")]
    ResourceProcessing(#[source] ExError),

    // ===== Internal =====
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Conversion from SessionError to ExError
impl From<SessionError> for ExError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::SessionNotActive { session_id, status } => {
                ExError::new(ExErrorKind::SessionNotActive)
                    .with_session_id(session_id)
                    .with_message(format!("Session is {}", status))
            }

            SessionError::SessionMismatch { expected, found } => {
                ExError::new(ExErrorKind::SessionMismatch)
                    .with_session_id(expected)
                    .with_message(format!("Snapshot belongs to session {}", found))
            }

            SessionError::AlreadyDeleted { resource } => ExError::new(ExErrorKind::Deleted)
                .with_entity_id(resource.to_string())
                .with_message("Resource was deleted"),

            SessionError::AlreadyRegistered { resource } => {
                ExError::new(ExErrorKind::AlreadyRegistered)
                    .with_entity_id(resource.to_string())
                    .with_message("Resource is already registered")
            }

            SessionError::UnknownTemplate { template_id } => {
                ExError::new(ExErrorKind::UnknownTemplate)
                    .with_message(format!("Unknown template {}", template_id))
            }

            SessionError::UnknownHandler { handler_type } => {
                ExError::new(ExErrorKind::UnknownHandler)
                    .with_message(format!("Unknown handler type {}", handler_type))
            }

            SessionError::IncompatibleSnapshotType { resource, expected } => {
                ExError::new(ExErrorKind::IncompatibleType)
                    .with_entity_id(resource.to_string())
                    .with_message(format!("Resource is not a {}", expected))
            }

            SessionError::IncompatibleHandler {
                attachment_id,
                handler_type,
                expected,
            } => ExError::new(ExErrorKind::IncompatibleType)
                .with_attachment_id(attachment_id.to_string())
                .with_message(format!(
                    "Handler {} does not produce template {}",
                    handler_type, expected
                )),

            SessionError::UnknownAttachment {
                resource,
                attachment_id,
            } => ExError::new(ExErrorKind::UnknownAttachment)
                .with_entity_id(resource.to_string())
                .with_attachment_id(attachment_id.to_string())
                .with_message("Attachment is not declared by the template"),

            SessionError::DuplicateAttachmentId {
                resource,
                attachment_id,
            } => ExError::new(ExErrorKind::DuplicateAttachment)
                .with_entity_id(resource.to_string())
                .with_attachment_id(attachment_id.to_string())
                .with_message("Attachment is already in use"),

            SessionError::NameInUse { resource, name } => ExError::new(ExErrorKind::NameInUse)
                .with_entity_id(resource.to_string())
                .with_message(format!("Name {} is already in use", name)),

            SessionError::UnresolvableReference { resource } => {
                ExError::new(ExErrorKind::UnresolvableReference)
                    .with_entity_id(resource.to_string())
                    .with_message("Repository cannot locate resource")
            }

            SessionError::TransactionFailure(source) => ExError::new(ExErrorKind::Transaction)
                .with_message("Transaction failure")
                .with_source(source),

            SessionError::Repository(source) => ExError::new(ExErrorKind::Persistence)
                .with_message("Repository failure")
                .with_source(source),

            SessionError::ResourceProcessing(source) => {
                ExError::new(ExErrorKind::ExternalService)
                    .with_message("Resource processing failure")
                    .with_source(source)
            }

            SessionError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}
