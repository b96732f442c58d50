use thiserror::Error;

/// Errors surfaced by a streamed chat completion
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Protocol error: {message}")]
    Protocol {
        status: Option<u16>,
        message: String,
    },

    #[error("Stream interrupted after {chunks_received} chunk(s): {message}")]
    StreamInterrupted {
        chunks_received: usize,
        message: String,
    },
}

impl StreamError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            status: None,
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn interrupted(chunks_received: usize, message: impl Into<String>) -> Self {
        Self::StreamInterrupted {
            chunks_received,
            message: message.into(),
        }
    }

    /// HTTP status of a rejected request, if the endpoint sent one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::StreamInterrupted { .. })
    }
}
