use crate::domain::model::{
    ConflictResolution, ExecuteRequest, ExecuteResult, PreviewResult, RosterFile,
    VolunteerConflict,
};
use crate::domain::ports::ImportApi;
use crate::utils::error::{ImportError, Result};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardStep {
    Upload {
        error: Option<String>,
    },
    Conflicts {
        preview: PreviewResult,
    },
    /// Either the confirmation screen of a clean preview, or the error list
    /// of a rejected one.
    Preview {
        preview: PreviewResult,
        error: Option<String>,
    },
    Result {
        preview: PreviewResult,
        result: ExecuteResult,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Upload,
    Conflicts,
    Preview,
    Result,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Upload => "upload",
            StepKind::Conflicts => "conflicts",
            StepKind::Preview => "preview",
            StepKind::Result => "result",
        };
        f.write_str(name)
    }
}

impl WizardStep {
    pub fn kind(&self) -> StepKind {
        match self {
            WizardStep::Upload { .. } => StepKind::Upload,
            WizardStep::Conflicts { .. } => StepKind::Conflicts,
            WizardStep::Preview { .. } => StepKind::Preview,
            WizardStep::Result { .. } => StepKind::Result,
        }
    }

    pub fn preview(&self) -> Option<&PreviewResult> {
        match self {
            WizardStep::Upload { .. } => None,
            WizardStep::Conflicts { preview }
            | WizardStep::Preview { preview, .. }
            | WizardStep::Result { preview, .. } => Some(preview),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            WizardStep::Upload { error } | WizardStep::Preview { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

/// 匯入精靈：上傳 → 衝突處理 → 預覽 → 結果
///
/// Every rejected action leaves the wizard exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportWizard {
    step: WizardStep,
    resolutions: HashMap<String, ConflictResolution>,
}

impl Default for ImportWizard {
    fn default() -> Self {
        Self {
            step: WizardStep::Upload { error: None },
            resolutions: HashMap::new(),
        }
    }
}

impl ImportWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> &WizardStep {
        &self.step
    }

    pub fn resolutions(&self) -> &HashMap<String, ConflictResolution> {
        &self.resolutions
    }

    fn reject(&self, action: &str) -> ImportError {
        ImportError::InvalidTransition {
            step: self.step.kind().to_string(),
            action: action.to_string(),
        }
    }

    /// Sends the file for preview. Conflicts lead to the conflicts step;
    /// a clean or rejected preview goes straight to the preview step.
    pub async fn upload<A>(&mut self, api: &A, file: &RosterFile) -> Result<&WizardStep>
    where
        A: ImportApi + ?Sized,
    {
        if self.step.kind() != StepKind::Upload {
            return Err(self.reject("upload"));
        }

        let preview = match api.preview(file).await {
            Ok(preview) => preview,
            Err(e) => {
                tracing::warn!("❌ Preview of '{}' failed: {}", file.file_name, e);
                self.step = WizardStep::Upload {
                    error: Some(e.user_friendly_message()),
                };
                return Err(e);
            }
        };

        self.resolutions.clear();
        self.step = if !preview.has_validation_errors() && preview.has_conflicts() {
            WizardStep::Conflicts { preview }
        } else {
            WizardStep::Preview {
                preview,
                error: None,
            }
        };
        tracing::debug!("Wizard moved to {}", self.step.kind());
        Ok(&self.step)
    }

    /// Records the decision for one conflicting name, replacing any earlier
    /// one. Only names that are conflicts of the current preview are accepted.
    pub fn set_resolution(&mut self, resolution: ConflictResolution) -> Result<()> {
        let preview = match &self.step {
            WizardStep::Conflicts { preview } => preview,
            WizardStep::Preview { preview, .. } if preview.has_conflicts() => preview,
            _ => return Err(self.reject("resolve a conflict")),
        };

        let name = resolution.volunteer_name.trim().to_string();
        if preview.conflict(&name).is_none() {
            return Err(ImportError::InvalidResolution {
                volunteer_name: name,
                reason: "not a conflict in the current preview".to_string(),
            });
        }

        self.resolutions.insert(name, resolution);
        Ok(())
    }

    pub fn unresolved_conflicts(&self) -> Vec<&VolunteerConflict> {
        self.step
            .preview()
            .map(|preview| {
                preview
                    .conflicts
                    .iter()
                    .filter(|c| !self.resolutions.contains_key(&c.volunteer_name))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn are_all_conflicts_resolved(&self) -> bool {
        self.unresolved_conflicts().is_empty()
    }

    pub fn go_to_preview(&mut self) -> Result<()> {
        if self.step.kind() != StepKind::Conflicts {
            return Err(self.reject("continue to preview"));
        }

        let unresolved: Vec<String> = self
            .unresolved_conflicts()
            .into_iter()
            .map(|c| c.volunteer_name.clone())
            .collect();
        if !unresolved.is_empty() {
            return Err(ImportError::UnresolvedConflicts { names: unresolved });
        }

        if let WizardStep::Conflicts { preview } =
            std::mem::replace(&mut self.step, WizardStep::Upload { error: None })
        {
            self.step = WizardStep::Preview {
                preview,
                error: None,
            };
        }
        Ok(())
    }

    /// Runs the import for the current session. On failure the wizard stays
    /// in the preview step with the error shown, so the user can retry or go
    /// back.
    pub async fn execute<A>(&mut self, api: &A) -> Result<ExecuteResult>
    where
        A: ImportApi + ?Sized,
    {
        let request = match &self.step {
            WizardStep::Preview { preview, .. } if !preview.has_validation_errors() => {
                let session_id = preview
                    .session_id
                    .clone()
                    .ok_or_else(|| self.reject("execute without a session"))?;
                ExecuteRequest {
                    session_id,
                    resolutions: self.ordered_resolutions(preview),
                }
            }
            _ => return Err(self.reject("execute")),
        };

        let outcome = match api.execute(&request).await {
            Ok(result) if result.success => Ok(result),
            Ok(result) => Err(ImportError::CreationFailed {
                message: result
                    .error_message
                    .unwrap_or_else(|| "Import failed".to_string()),
                rolled_back: true,
            }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                match std::mem::replace(&mut self.step, WizardStep::Upload { error: None }) {
                    WizardStep::Preview { preview, .. } => {
                        self.step = WizardStep::Result {
                            preview,
                            result: result.clone(),
                        };
                    }
                    other => self.step = other,
                }
                Ok(result)
            }
            Err(e) => {
                tracing::warn!("⚠️ Import failed: {}", e);
                if let WizardStep::Preview { error, .. } = &mut self.step {
                    *error = Some(e.user_friendly_message());
                }
                Err(e)
            }
        }
    }

    fn ordered_resolutions(&self, preview: &PreviewResult) -> Vec<ConflictResolution> {
        preview
            .conflicts
            .iter()
            .filter_map(|c| self.resolutions.get(&c.volunteer_name).cloned())
            .collect()
    }

    /// `conflicts → upload`; `preview → conflicts` when the preview has
    /// conflicts, otherwise `preview → upload`.
    pub fn go_back(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.step, WizardStep::Upload { error: None }) {
            WizardStep::Conflicts { .. } => {
                self.resolutions.clear();
            }
            WizardStep::Preview { preview, .. }
                if !preview.has_validation_errors() && preview.has_conflicts() =>
            {
                self.step = WizardStep::Conflicts { preview };
            }
            WizardStep::Preview { .. } => {
                self.resolutions.clear();
            }
            other => {
                self.step = other;
                return Err(self.reject("go back"));
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
