use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 名單中的一欄：部門名稱、負責人與成員
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentColumn {
    pub department_name: String,
    pub head_name: String,
    pub members: Vec<String>,
    pub column_index: usize,
}

impl DepartmentColumn {
    /// Head first, then members, each paired with its 0-based row.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str, bool)> + '_ {
        std::iter::once((1, self.head_name.as_str(), true)).chain(
            self.members
                .iter()
                .enumerate()
                .map(|(idx, name)| (idx + 2, name.as_str(), false)),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorType {
    EmptyDepartmentName,
    EmptyHead,
    EmptyVolunteerName,
    DuplicateInColumn,
    InvalidFileFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub error_type: ValidationErrorType,
    pub message: String,
    pub column_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_name: Option<String>,
}

impl ValidationError {
    pub fn invalid_file_format(message: impl Into<String>) -> Self {
        Self {
            error_type: ValidationErrorType::InvalidFileFormat,
            message: message.into(),
            column_index: 0,
            row_index: None,
            department_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    DuplicateInImport,
    ExistingInDb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictOccurrence {
    pub department_name: String,
    pub column_index: usize,
    pub row_index: usize,
    pub is_head: bool,
}

/// 資料庫中已存在的志工（比對用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingVolunteer {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub current_dept_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerConflict {
    pub volunteer_name: String,
    pub conflict_type: ConflictType,
    pub occurrences: Vec<ConflictOccurrence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_volunteer: Option<ExistingVolunteer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionDecision {
    CreateOne,
    CreateMultiple,
    ReuseExisting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    pub volunteer_name: String,
    pub decision: ResolutionDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volunteer_id: Option<String>,
}

impl ConflictResolution {
    pub fn create_one(name: impl Into<String>) -> Self {
        Self {
            volunteer_name: name.into(),
            decision: ResolutionDecision::CreateOne,
            volunteer_id: None,
        }
    }

    pub fn create_multiple(name: impl Into<String>) -> Self {
        Self {
            volunteer_name: name.into(),
            decision: ResolutionDecision::CreateMultiple,
            volunteer_id: None,
        }
    }

    pub fn reuse_existing(name: impl Into<String>, volunteer_id: impl Into<String>) -> Self {
        Self {
            volunteer_name: name.into(),
            decision: ResolutionDecision::ReuseExisting,
            volunteer_id: Some(volunteer_id.into()),
        }
    }
}

/// Per-department preview row, as shown to the user before execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentPreview {
    pub department_name: String,
    pub head_name: String,
    pub members: Vec<String>,
    pub column_index: usize,
}

impl From<&DepartmentColumn> for DepartmentPreview {
    fn from(column: &DepartmentColumn) -> Self {
        Self {
            department_name: column.department_name.clone(),
            head_name: column.head_name.clone(),
            members: column.members.clone(),
            column_index: column.column_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub departments: Vec<DepartmentPreview>,
    pub conflicts: Vec<VolunteerConflict>,
    pub validation_errors: Vec<ValidationError>,
    pub total_departments: usize,
    pub total_volunteers: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl PreviewResult {
    pub fn rejected(validation_errors: Vec<ValidationError>) -> Self {
        Self {
            validation_errors,
            ..Self::default()
        }
    }

    pub fn has_validation_errors(&self) -> bool {
        !self.validation_errors.is_empty()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn conflict(&self, volunteer_name: &str) -> Option<&VolunteerConflict> {
        self.conflicts
            .iter()
            .find(|c| c.volunteer_name == volunteer_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub session_id: String,
    #[serde(default)]
    pub resolutions: Vec<ConflictResolution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub success: bool,
    pub departments_created: usize,
    pub volunteers_created: usize,
    pub volunteers_reused: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_department_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_volunteer_ids: Option<Vec<String>>,
}

impl ExecuteResult {
    pub fn failure(error: &crate::utils::error::ImportError) -> Self {
        Self {
            success: false,
            error_message: Some(error.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipType {
    Head,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    #[serde(rename = "volunteerID", alias = "volunteerId")]
    pub volunteer_id: String,
    pub membership_type: MembershipType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
    pub id: String,
    pub name: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub department_name: String,
    #[serde(default)]
    pub volunteer_members: Vec<Membership>,
    #[serde(default)]
    pub is_disabled: bool,
}

/// 上傳的名單檔案
#[derive(Debug, Clone)]
pub struct RosterFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl RosterFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_wire_format() {
        let conflict = VolunteerConflict {
            volunteer_name: "John".to_string(),
            conflict_type: ConflictType::DuplicateInImport,
            occurrences: vec![ConflictOccurrence {
                department_name: "Media".to_string(),
                column_index: 0,
                row_index: 1,
                is_head: true,
            }],
            existing_volunteer: None,
        };

        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json["volunteerName"], "John");
        assert_eq!(json["conflictType"], "DUPLICATE_IN_IMPORT");
        assert_eq!(json["occurrences"][0]["isHead"], true);
        assert!(json.get("existingVolunteer").is_none());
    }

    #[test]
    fn test_resolution_parses_from_client_payload() {
        let payload = r#"{"volunteerName":"Sarah","decision":"REUSE_EXISTING","volunteerId":"v-1"}"#;
        let resolution: ConflictResolution = serde_json::from_str(payload).unwrap();
        assert_eq!(resolution, ConflictResolution::reuse_existing("Sarah", "v-1"));
    }

    #[test]
    fn test_column_entries_yield_head_then_members() {
        let column = DepartmentColumn {
            department_name: "Media".to_string(),
            head_name: "John".to_string(),
            members: vec!["Alice".to_string(), "Bob".to_string()],
            column_index: 3,
        };

        let entries: Vec<_> = column.entries().collect();
        assert_eq!(
            entries,
            vec![(1, "John", true), (2, "Alice", false), (3, "Bob", false)]
        );
    }
}
