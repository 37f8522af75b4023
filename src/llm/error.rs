use thiserror::Error;

/// Errors surfaced by companion operations. All of them are terminal for the
/// session that raised them; nothing is retried automatically.
#[derive(Error, Debug)]
pub enum CompanionError {
    /// Bad input shape or range
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network or stream failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// A collaborator endpoint answered with an error payload
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Operation attempted in a session phase that does not allow it
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

impl CompanionError {
    /// Text suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            CompanionError::Validation(message) | CompanionError::Upstream(message) => {
                message.clone()
            }
            CompanionError::Transport(_) => {
                "Failed to reach the assistant. Please try again.".to_string()
            }
            CompanionError::InvalidState(message) => format!("Internal error: {message}"),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CompanionError::Validation(_))
    }
}

impl From<reqwest::Error> for CompanionError {
    fn from(error: reqwest::Error) -> Self {
        CompanionError::Transport(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompanionError>;
