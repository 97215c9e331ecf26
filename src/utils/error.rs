use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("XML parsing failed: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("Unreadable roster file: {message}")]
    InvalidFormat { message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    ApiStatus { status: u16, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Import session '{session_id}' has expired or does not exist")]
    SessionExpired { session_id: String },

    #[error("Import session '{session_id}' has already been executed")]
    SessionAlreadyExecuted { session_id: String },

    #[error("Unresolved conflicts: {}", .names.join(", "))]
    UnresolvedConflicts { names: Vec<String> },

    #[error("Invalid resolution for '{volunteer_name}': {reason}")]
    InvalidResolution {
        volunteer_name: String,
        reason: String,
    },

    #[error("Import failed: {message}")]
    CreationFailed { message: String, rolled_back: bool },

    #[error("Cannot {action} while in step '{step}'")]
    InvalidTransition { step: String, action: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Session,
    Resolution,
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

impl ImportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ImportError::ApiError(_) | ImportError::ApiStatus { .. } => ErrorCategory::Network,
            ImportError::ZipError(_)
            | ImportError::XmlError(_)
            | ImportError::InvalidFormat { .. }
            | ImportError::CsvError(_)
            | ImportError::SerializationError(_) => ErrorCategory::Data,
            ImportError::SessionExpired { .. } | ImportError::SessionAlreadyExecuted { .. } => {
                ErrorCategory::Session
            }
            ImportError::UnresolvedConflicts { .. }
            | ImportError::InvalidResolution { .. }
            | ImportError::InvalidTransition { .. } => ErrorCategory::Resolution,
            ImportError::ConfigError { .. }
            | ImportError::ConfigValidationError { .. }
            | ImportError::InvalidConfigValueError { .. }
            | ImportError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ImportError::IoError(_) | ImportError::CreationFailed { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ImportError::InvalidTransition { .. } => ErrorSeverity::Low,
            ImportError::ApiError(_)
            | ImportError::ApiStatus { .. }
            | ImportError::UnresolvedConflicts { .. }
            | ImportError::InvalidResolution { .. }
            | ImportError::SessionExpired { .. }
            | ImportError::SessionAlreadyExecuted { .. } => ErrorSeverity::Medium,
            ImportError::CreationFailed {
                rolled_back: false, ..
            } => ErrorSeverity::Critical,
            ImportError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check that the scheduling API is reachable and the auth token is valid",
            ErrorCategory::Data => "Check that the roster file is a valid .xlsx, .csv or .tsv export",
            ErrorCategory::Session => "Upload the roster again to start a new import session",
            ErrorCategory::Resolution => "Resolve every listed conflict before executing the import",
            ErrorCategory::Configuration => "Review the configuration file and command line arguments",
            ErrorCategory::System => match self {
                ImportError::CreationFailed {
                    rolled_back: false, ..
                } => "Some records could not be rolled back; review departments and volunteers manually",
                _ => "Retry the import from a fresh preview",
            },
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ImportError::SessionExpired { .. } => {
                "The import session expired. Please upload the roster again.".to_string()
            }
            ImportError::SessionAlreadyExecuted { .. } => {
                "This import has already been executed.".to_string()
            }
            ImportError::UnresolvedConflicts { names } => {
                format!("Please resolve all conflicts first ({} remaining)", names.len())
            }
            ImportError::ApiError(_) | ImportError::ApiStatus { .. } => {
                format!("Could not talk to the scheduling API: {}", self)
            }
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
