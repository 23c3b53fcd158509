use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Transport returned no response")]
    EmptyResponse,

    #[error("Request was aborted")]
    Aborted,

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Cancelled,
    Http,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ClientError {
    /// Transient failures worth another attempt. Aborts and anything the
    /// request itself got wrong are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(e) => !(e.is_builder() || e.is_decode() || e.is_redirect()),
            ClientError::Network { .. } | ClientError::EmptyResponse => true,
            _ => false,
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, ClientError::Aborted)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Transport(_) | ClientError::Network { .. } | ClientError::EmptyResponse => {
                ErrorCategory::Network
            }
            ClientError::Aborted => ErrorCategory::Cancelled,
            ClientError::HttpStatus { .. } => ErrorCategory::Http,
            ClientError::SerializationError(_)
            | ClientError::CsvError(_)
            | ClientError::ValidationError { .. } => ErrorCategory::Data,
            ClientError::ConfigError { .. }
            | ClientError::ConfigValidationError { .. }
            | ClientError::InvalidConfigValueError { .. }
            | ClientError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ClientError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ClientError::Aborted => ErrorSeverity::Low,
            ClientError::Transport(_)
            | ClientError::Network { .. }
            | ClientError::EmptyResponse => ErrorSeverity::Medium,
            ClientError::HttpStatus { status, .. } if *status == 429 || *status >= 500 => {
                ErrorSeverity::Medium
            }
            ClientError::HttpStatus { .. }
            | ClientError::SerializationError(_)
            | ClientError::CsvError(_)
            | ClientError::ValidationError { .. }
            | ClientError::ConfigError { .. }
            | ClientError::ConfigValidationError { .. }
            | ClientError::InvalidConfigValueError { .. }
            | ClientError::MissingConfigError { .. } => ErrorSeverity::High,
            ClientError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and that the API server is reachable",
            ErrorCategory::Cancelled => "The request was cancelled; run it again if needed",
            ErrorCategory::Http => match self {
                ClientError::HttpStatus { status: 401 | 403, .. } => {
                    "Check the session cookie or bearer token in the configuration"
                }
                ClientError::HttpStatus { status: 404, .. } => "Check the API path",
                _ => "The server is overloaded or failing; retry later or raise max_retries",
            },
            ErrorCategory::Data => "Check that the endpoint returns JSON records and the query is valid",
            ErrorCategory::Configuration => "Fix the configuration file or command line arguments",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ClientError::Transport(_) | ClientError::Network { .. } => {
                format!("Could not reach the server ({})", self)
            }
            ClientError::EmptyResponse => "The server did not send a response".to_string(),
            ClientError::Aborted => "Request cancelled".to_string(),
            ClientError::HttpStatus { status, .. } => {
                format!("The server answered with HTTP status {}", status)
            }
            _ => self.to_string(),
        }
    }
}
