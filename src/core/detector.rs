use crate::domain::model::{ConflictOccurrence, ConflictType, DepartmentColumn, VolunteerConflict};
use crate::domain::ports::VolunteerDirectory;
use crate::utils::error::Result;
use std::collections::{HashMap, HashSet};

/// Every occurrence of one volunteer name across the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameOccurrences {
    pub name: String,
    pub occurrences: Vec<ConflictOccurrence>,
}

impl NameOccurrences {
    pub fn distinct_columns(&self) -> usize {
        self.occurrences
            .iter()
            .map(|o| o.column_index)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// 依名稱分組所有出現位置，順序為首次出現的順序（欄，再列）
pub fn index_occurrences(roster: &[DepartmentColumn]) -> Vec<NameOccurrences> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut index: Vec<NameOccurrences> = Vec::new();

    for column in roster {
        for (row_index, name, is_head) in column.entries() {
            let occurrence = ConflictOccurrence {
                department_name: column.department_name.clone(),
                column_index: column.column_index,
                row_index,
                is_head,
            };
            match positions.get(name) {
                Some(&pos) => index[pos].occurrences.push(occurrence),
                None => {
                    positions.insert(name, index.len());
                    index.push(NameOccurrences {
                        name: name.to_string(),
                        occurrences: vec![occurrence],
                    });
                }
            }
        }
    }

    index
}

pub fn count_distinct_volunteers(roster: &[DepartmentColumn]) -> usize {
    roster
        .iter()
        .flat_map(|column| column.entries().map(|(_, name, _)| name))
        .collect::<HashSet<_>>()
        .len()
}

/// Finds every ambiguous name in a validated roster.
///
/// A name spread over two or more columns is `DUPLICATE_IN_IMPORT`, even when
/// it also matches an existing volunteer; that record is attached so the
/// user can still choose to reuse it. A single-column name is checked against
/// the directory and reported as `EXISTING_IN_DB` when found.
pub async fn detect_conflicts<D>(
    roster: &[DepartmentColumn],
    directory: &D,
) -> Result<Vec<VolunteerConflict>>
where
    D: VolunteerDirectory + ?Sized,
{
    let entries = index_occurrences(roster);
    let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
    let mut existing_by_name = directory.find_by_exact_names(&names).await?;

    let mut conflicts = Vec::new();
    for entry in entries {
        let existing = existing_by_name.remove(&entry.name);
        let cross_column = entry.distinct_columns() >= 2;

        let conflict_type = match (cross_column, &existing) {
            (true, _) => ConflictType::DuplicateInImport,
            (false, Some(_)) => ConflictType::ExistingInDb,
            (false, None) => continue,
        };

        tracing::debug!(
            "Conflict for '{}': {:?} ({} occurrences)",
            entry.name,
            conflict_type,
            entry.occurrences.len()
        );

        conflicts.push(VolunteerConflict {
            volunteer_name: entry.name,
            conflict_type,
            occurrences: entry.occurrences,
            existing_volunteer: existing,
        });
    }

    Ok(conflicts)
}
