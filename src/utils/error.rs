use thiserror::Error;

/// Crate-wide error type.
///
/// Kept `Clone` so that a single coalesced token refresh can hand the same
/// failure to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error in '{field}': {message}")]
    Config { field: String, message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Local store error: {message}")]
    Store { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Upstream,
    Transport,
    Input,
    Configuration,
    Internal,
}

impl LookupError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Errors worth another attempt: transport failures, server-side
    /// statuses and rate limiting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Api { .. } => ErrorCategory::Upstream,
            Self::Network { .. } => ErrorCategory::Transport,
            Self::Validation { .. } => ErrorCategory::Input,
            Self::Config { .. } | Self::InvalidConfigValue { .. } => ErrorCategory::Configuration,
            Self::Serialization { .. } | Self::Io { .. } | Self::Store { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Authentication { .. } => {
                "Could not authenticate with the food database. Check client credentials."
                    .to_string()
            }
            Self::Api { status, .. } => {
                format!("The food database answered with HTTP {}.", status)
            }
            Self::Network { .. } => {
                "The food database could not be reached. Check your connection.".to_string()
            }
            Self::Validation { message } => format!("Invalid input: {}", message),
            Self::Config { field, message } => {
                format!("Configuration problem with '{}': {}", field, message)
            }
            Self::InvalidConfigValue { field, reason, .. } => {
                format!("Configuration value '{}' is invalid: {}", field, reason)
            }
            _ => format!("Unexpected error: {}", self),
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Serialization {
                message: err.to_string(),
            }
        } else if let (true, Some(status)) = (err.is_status(), err.status()) {
            Self::Api {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for LookupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LookupError>;
