use crate::domain::model::ConflictResolution;
use crate::utils::error::{ImportError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ResolutionFile {
    #[serde(default)]
    resolutions: Vec<ConflictResolution>,
}

/// Reads pre-made conflict decisions for unattended runs.
///
/// JSON files hold either a bare array or `{"resolutions": [...]}`; TOML
/// files use `[[resolutions]]` tables. Keys follow the API wire names
/// (`volunteerName`, `decision`, `volunteerId`).
pub fn parse_resolutions(file_name: &str, bytes: &[u8]) -> Result<Vec<ConflictResolution>> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("json") => {
            let value: serde_json::Value = serde_json::from_slice(bytes)?;
            if value.is_array() {
                Ok(serde_json::from_value(value)?)
            } else {
                let file: ResolutionFile = serde_json::from_value(value)?;
                Ok(file.resolutions)
            }
        }
        Some("toml") => {
            let content = std::str::from_utf8(bytes).map_err(|e| ImportError::ConfigError {
                message: format!("'{}' is not valid UTF-8: {}", file_name, e),
            })?;
            let file: ResolutionFile =
                toml::from_str(content).map_err(|e| ImportError::ConfigValidationError {
                    field: "resolutions".to_string(),
                    message: format!("TOML parsing error: {}", e),
                })?;
            Ok(file.resolutions)
        }
        _ => Err(ImportError::InvalidConfigValueError {
            field: "resolutions".to_string(),
            value: file_name.to_string(),
            reason: "Resolutions must be a .json or .toml file".to_string(),
        }),
    }
}
