use crate::core::grid::{self, Grid};
use crate::domain::model::{DepartmentColumn, RosterFile, ValidationError, ValidationErrorType};
use std::collections::HashMap;

const DEPARTMENT_ROW: usize = 0;
const HEAD_ROW: usize = 1;
const FIRST_MEMBER_ROW: usize = 2;

/// 解析結果：有效的部門欄位，以及所有驗證錯誤
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRoster {
    pub columns: Vec<DepartmentColumn>,
    pub errors: Vec<ValidationError>,
}

impl ParsedRoster {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Decodes the upload and parses it. A file that cannot be read as a grid
/// yields a single `INVALID_FILE_FORMAT` error and no roster.
pub fn parse_file(file: &RosterFile) -> ParsedRoster {
    match grid::decode(file) {
        Ok(grid) => parse_grid(&grid),
        Err(e) => {
            tracing::warn!("❌ Could not decode '{}': {}", file.file_name, e);
            ParsedRoster {
                columns: Vec::new(),
                errors: vec![ValidationError::invalid_file_format(format!(
                    "Failed to read '{}': {}",
                    file.file_name, e
                ))],
            }
        }
    }
}

pub fn parse_grid(grid: &Grid) -> ParsedRoster {
    if grid.is_blank() {
        return ParsedRoster {
            columns: Vec::new(),
            errors: vec![ValidationError::invalid_file_format("The roster file is empty")],
        };
    }

    let mut roster = ParsedRoster::default();
    for column_index in 0..grid.column_count() {
        let errors_before = roster.errors.len();
        if let Some(column) = parse_column(grid, column_index, &mut roster.errors) {
            if roster.errors.len() == errors_before {
                roster.columns.push(column);
            }
        }
    }

    tracing::debug!(
        "Parsed {} department columns with {} validation errors",
        roster.columns.len(),
        roster.errors.len()
    );
    roster
}

/// Returns `None` for a column with no content at all.
fn parse_column(
    grid: &Grid,
    column_index: usize,
    errors: &mut Vec<ValidationError>,
) -> Option<DepartmentColumn> {
    let department_name = grid.cell(DEPARTMENT_ROW, column_index);
    let head_name = grid.cell(HEAD_ROW, column_index);

    // trailing blank rows are not part of the column
    let last_member_row = (FIRST_MEMBER_ROW..grid.row_count())
        .rev()
        .find(|&row| !grid.cell(row, column_index).is_empty());

    if department_name.is_empty() && head_name.is_empty() && last_member_row.is_none() {
        return None;
    }

    let column_number = column_index + 1;
    let department = (!department_name.is_empty()).then(|| department_name.to_string());

    if department_name.is_empty() {
        errors.push(ValidationError {
            error_type: ValidationErrorType::EmptyDepartmentName,
            message: format!("Department name is empty in column {}", column_number),
            column_index,
            row_index: Some(DEPARTMENT_ROW),
            department_name: None,
        });
    }

    if head_name.is_empty() {
        errors.push(ValidationError {
            error_type: ValidationErrorType::EmptyHead,
            message: match &department {
                Some(name) => format!("Department head is empty for '{}'", name),
                None => format!("Department head is empty in column {}", column_number),
            },
            column_index,
            row_index: Some(HEAD_ROW),
            department_name: department.clone(),
        });
    }

    let member_rows = match last_member_row {
        Some(last) => FIRST_MEMBER_ROW..last + 1,
        None => FIRST_MEMBER_ROW..FIRST_MEMBER_ROW,
    };

    let mut members = Vec::new();
    for row in member_rows.clone() {
        let name = grid.cell(row, column_index);
        if name.is_empty() {
            errors.push(ValidationError {
                error_type: ValidationErrorType::EmptyVolunteerName,
                message: format!(
                    "Empty volunteer name at row {} in column {}",
                    row + 1,
                    column_number
                ),
                column_index,
                row_index: Some(row),
                department_name: department.clone(),
            });
        } else {
            members.push(name.to_string());
        }
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    if !head_name.is_empty() {
        seen.insert(head_name, HEAD_ROW);
    }
    for row in member_rows {
        let name = grid.cell(row, column_index);
        if name.is_empty() {
            continue;
        }
        match seen.get(name) {
            Some(&HEAD_ROW) => errors.push(ValidationError {
                error_type: ValidationErrorType::DuplicateInColumn,
                message: format!("Department head '{}' is also listed as a member", name),
                column_index,
                row_index: Some(row),
                department_name: department.clone(),
            }),
            Some(_) => errors.push(ValidationError {
                error_type: ValidationErrorType::DuplicateInColumn,
                message: format!("Duplicate volunteer '{}' in column {}", name, column_number),
                column_index,
                row_index: Some(row),
                department_name: department.clone(),
            }),
            None => {
                seen.insert(name, row);
            }
        }
    }

    Some(DepartmentColumn {
        department_name: department_name.to_string(),
        head_name: head_name.to_string(),
        members,
        column_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(rows.iter().map(|row| row.iter().copied()))
    }

    fn error_types(roster: &ParsedRoster) -> Vec<ValidationErrorType> {
        roster.errors.iter().map(|e| e.error_type).collect()
    }

    #[test]
    fn test_parse_two_departments() {
        let roster = parse_grid(&grid(&[
            &["Media", "Worship"],
            &["John", "Sarah"],
            &["Alice", "John"],
            &["", "Mark"],
            &["", ""],
        ]));

        assert!(roster.is_valid());
        assert_eq!(roster.columns.len(), 2);
        assert_eq!(roster.columns[0].department_name, "Media");
        assert_eq!(roster.columns[0].head_name, "John");
        assert_eq!(roster.columns[0].members, vec!["Alice"]);
        assert_eq!(roster.columns[1].members, vec!["John", "Mark"]);
        assert_eq!(roster.columns[1].column_index, 1);
    }

    #[test]
    fn test_head_only_department_has_no_members() {
        let roster = parse_grid(&grid(&[&["Ushers"], &["Paul"]]));
        assert!(roster.is_valid());
        assert!(roster.columns[0].members.is_empty());
    }

    #[test]
    fn test_fully_blank_column_is_skipped() {
        let roster = parse_grid(&grid(&[&["Media", "", "Worship"], &["John", "", "Sarah"]]));
        assert!(roster.is_valid());
        let indices: Vec<_> = roster.columns.iter().map(|c| c.column_index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_collects_errors_across_all_columns() {
        let roster = parse_grid(&grid(&[
            &["", "Worship", "Media"],
            &["John", "", "Tom"],
            &["Alice", "Sarah", "Ann"],
            &["", "", "Ann"],
            &["Bob", "", ""],
        ]));

        assert_eq!(
            error_types(&roster),
            vec![
                ValidationErrorType::EmptyDepartmentName,
                ValidationErrorType::EmptyVolunteerName,
                ValidationErrorType::EmptyHead,
                ValidationErrorType::DuplicateInColumn,
            ]
        );
        assert!(roster.columns.is_empty());

        let empty_member = &roster.errors[1];
        assert_eq!(empty_member.column_index, 0);
        assert_eq!(empty_member.row_index, Some(3));

        let duplicate = &roster.errors[3];
        assert_eq!(duplicate.column_index, 2);
        assert_eq!(duplicate.row_index, Some(3));
        assert_eq!(duplicate.department_name.as_deref(), Some("Media"));
    }

    #[test]
    fn test_head_repeated_as_member_is_duplicate() {
        let roster = parse_grid(&grid(&[&["Media"], &["John"], &["John"]]));
        assert_eq!(error_types(&roster), vec![ValidationErrorType::DuplicateInColumn]);
        assert!(roster.errors[0].message.contains("also listed as a member"));
    }

    #[test]
    fn test_names_are_case_sensitive_within_column() {
        let roster = parse_grid(&grid(&[&["Media"], &["John"], &["john"]]));
        assert!(roster.is_valid());
        assert_eq!(roster.columns[0].members, vec!["john"]);
    }

    #[test]
    fn test_valid_columns_survive_next_to_invalid_ones() {
        let roster = parse_grid(&grid(&[&["Media", "Worship"], &["John", ""]]));
        assert_eq!(error_types(&roster), vec![ValidationErrorType::EmptyHead]);
        assert_eq!(roster.columns.len(), 1);
        assert_eq!(roster.columns[0].department_name, "Media");
    }

    #[test]
    fn test_blank_grid_is_invalid_format() {
        let roster = parse_grid(&grid(&[&["", ""], &[" ", ""]]));
        assert_eq!(error_types(&roster), vec![ValidationErrorType::InvalidFileFormat]);
    }

    #[test]
    fn test_undecodable_file_is_invalid_format() {
        let roster = parse_file(&RosterFile::new("roster.xlsx", b"PK-not-really".to_vec()));
        assert_eq!(error_types(&roster), vec![ValidationErrorType::InvalidFileFormat]);
        assert!(roster.columns.is_empty());

        let roster = parse_file(&RosterFile::new("roster.pdf", b"%PDF".to_vec()));
        assert_eq!(error_types(&roster), vec![ValidationErrorType::InvalidFileFormat]);
    }

    #[test]
    fn test_parse_csv_file() {
        let roster = parse_file(&RosterFile::new("roster.csv", "Media,Worship\nJohn,Sarah\nAlice,John\n"));
        assert!(roster.is_valid());
        assert_eq!(roster.columns.len(), 2);
    }
}
