//! Failures of external collaborators (model server, spreadsheet, lead log).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Bytes of an error response body kept in [`CollaboratorError::Status`].
const STATUS_BODY_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Model,
    Spreadsheet,
    LeadLog,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collaborator::Model => f.write_str("model server"),
            Collaborator::Spreadsheet => f.write_str("spreadsheet"),
            Collaborator::LeadLog => f.write_str("lead log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("{collaborator} timed out after {timeout:?}")]
    Timeout {
        collaborator: Collaborator,
        timeout: Duration,
    },
    #[error("{collaborator} request failed: {message}")]
    Transport {
        collaborator: Collaborator,
        message: String,
    },
    #[error("{collaborator} returned HTTP {status}: {body}")]
    Status {
        collaborator: Collaborator,
        status: u16,
        body: String,
    },
    #[error("{collaborator} sent an unexpected response: {message}")]
    Protocol {
        collaborator: Collaborator,
        message: String,
    },
    #[error("{collaborator} i/o failed: {message}")]
    Io {
        collaborator: Collaborator,
        message: String,
    },
}

impl CollaboratorError {
    pub fn collaborator(&self) -> Collaborator {
        match self {
            CollaboratorError::Timeout { collaborator, .. }
            | CollaboratorError::Transport { collaborator, .. }
            | CollaboratorError::Status { collaborator, .. }
            | CollaboratorError::Protocol { collaborator, .. }
            | CollaboratorError::Io { collaborator, .. } => *collaborator,
        }
    }

    /// Classify a reqwest failure; timeouts keep the configured limit for the message.
    pub fn from_reqwest(collaborator: Collaborator, err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return CollaboratorError::Timeout {
                collaborator,
                timeout,
            };
        }
        if err.is_decode() {
            return CollaboratorError::Protocol {
                collaborator,
                message: err.to_string(),
            };
        }
        CollaboratorError::Transport {
            collaborator,
            message: err.to_string(),
        }
    }

    pub fn status(collaborator: Collaborator, status: u16, body: &str) -> Self {
        let mut body = body.trim().to_string();
        if body.len() > STATUS_BODY_LIMIT {
            let mut cut = STATUS_BODY_LIMIT;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("...");
        }
        CollaboratorError::Status {
            collaborator,
            status,
            body,
        }
    }

    pub fn protocol(collaborator: Collaborator, message: impl Into<String>) -> Self {
        CollaboratorError::Protocol {
            collaborator,
            message: message.into(),
        }
    }
}
