pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{InMemoryDirectory, LocalStorage, RestApiClient};
pub use crate::config::ImportConfig;
#[cfg(feature = "cli")]
pub use crate::config::{CliConfig, Command};

pub use crate::core::service::BatchImportService;
pub use crate::core::session::SessionStore;
pub use crate::core::workflow::{ImportWizard, StepKind, WizardStep};
pub use crate::domain::model::{
    ConflictResolution, ExecuteRequest, ExecuteResult, PreviewResult, ResolutionDecision,
    RosterFile,
};
pub use crate::utils::error::{ImportError, Result};
