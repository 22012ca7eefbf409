use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.base_url", "send.text")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected value, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "conversation", "session_binding")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Error taxonomy as seen by the conversation layer.
///
/// `Validation` is handled locally (nothing is sent, nothing is appended). Every other
/// kind ends a turn with a transcript entry and a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Session,
    Transport,
    Timeout,
    Remote,
    Cancelled,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Session => "session",
            ErrorKind::Transport => "transport",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Remote => "remote",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the session layer
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Session error: {message}: {source}")]
    Session {
        message: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Timeout: {operation} exceeded {}ms", .after.as_millis())]
    Timeout { operation: String, after: Duration },

    #[error("Remote error{}: {message}", format_status(.status))]
    Remote { status: Option<u16>, message: String },

    #[error("Cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(s) => format!(" (HTTP {})", s),
        None => String::new(),
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Remote {
            status,
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            after,
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Error::Cancelled {
            operation: operation.into(),
        }
    }

    /// Wrap a failed session start. Validation errors pass through untouched.
    pub fn session(message: impl Into<String>, source: Error) -> Self {
        match source {
            e @ Error::Validation { .. } | e @ Error::Session { .. } => e,
            other => Error::Session {
                message: message.into(),
                source: Box::new(other),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Session { .. } => ErrorKind::Session,
            Error::Transport(_) | Error::Io(_) | Error::Serialization(_) => ErrorKind::Transport,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Remote { .. } => ErrorKind::Remote,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// One human-readable line for the transcript. No debug output, no source chains.
    pub fn user_summary(&self) -> String {
        match self {
            Error::Validation { message, .. } => message.clone(),
            Error::Session { .. } => {
                "Could not start a session with the assistant. Please try again.".to_string()
            }
            Error::Transport(_) | Error::Io(_) | Error::Serialization(_) => {
                "Sorry, I could not reach the assistant. Please try again.".to_string()
            }
            Error::Timeout { .. } => {
                "Sorry, the assistant took too long to respond. Please try again.".to_string()
            }
            Error::Remote { message, .. } => format!("Sorry, something went wrong: {}", message),
            Error::Cancelled { .. } => "The request was cancelled.".to_string(),
            Error::Configuration { .. } => {
                "The assistant is not configured correctly.".to_string()
            }
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Validation { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }
}
