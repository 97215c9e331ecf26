use crate::core::detector::index_occurrences;
use crate::core::session::ImportSession;
use crate::domain::model::{
    ConflictResolution, DepartmentColumn, ExecuteResult, Membership, MembershipType,
    ResolutionDecision, VolunteerConflict,
};
use crate::domain::ports::EntityStore;
use crate::utils::error::{ImportError, Result};
use std::collections::{HashMap, HashSet};

/// The concrete volunteer behind one or more roster positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Create { name: String },
    Reuse { id: String },
}

/// What an execution will do, computed before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPlan {
    pub identities: Vec<Identity>,
    /// (column index, row index) -> position in `identities`
    pub assignments: HashMap<(usize, usize), usize>,
}

impl ImportPlan {
    pub fn volunteers_to_create(&self) -> usize {
        self.identities
            .iter()
            .filter(|i| matches!(i, Identity::Create { .. }))
            .count()
    }

    pub fn volunteers_reused(&self) -> usize {
        self.identities.len() - self.volunteers_to_create()
    }
}

/// 檢查使用者的決定是否完整且與衝突紀錄一致
pub fn validate_resolutions<'a>(
    conflicts: &[VolunteerConflict],
    resolutions: &'a [ConflictResolution],
) -> Result<HashMap<&'a str, &'a ConflictResolution>> {
    let by_name: HashMap<&str, &VolunteerConflict> = conflicts
        .iter()
        .map(|c| (c.volunteer_name.as_str(), c))
        .collect();

    let mut accepted: HashMap<&str, &ConflictResolution> = HashMap::new();
    for resolution in resolutions {
        let name = resolution.volunteer_name.trim();
        let invalid = |reason: &str| ImportError::InvalidResolution {
            volunteer_name: name.to_string(),
            reason: reason.to_string(),
        };

        let conflict = by_name
            .get(name)
            .ok_or_else(|| invalid("no conflict was recorded for this name"))?;

        if accepted.insert(name, resolution).is_some() {
            return Err(invalid("resolved more than once"));
        }

        match (resolution.decision, resolution.volunteer_id.as_deref()) {
            (ResolutionDecision::ReuseExisting, None) => {
                return Err(invalid("REUSE_EXISTING requires a volunteerId"));
            }
            (ResolutionDecision::ReuseExisting, Some(id)) => match &conflict.existing_volunteer {
                Some(existing) if existing.id == id => {}
                Some(_) => return Err(invalid("volunteerId does not match the existing volunteer")),
                None => return Err(invalid("there is no existing volunteer to reuse")),
            },
            (_, Some(_)) => return Err(invalid("volunteerId is only allowed with REUSE_EXISTING")),
            (_, None) => {}
        }
    }

    let missing: Vec<String> = conflicts
        .iter()
        .filter(|c| !accepted.contains_key(c.volunteer_name.as_str()))
        .map(|c| c.volunteer_name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::UnresolvedConflicts { names: missing });
    }

    Ok(accepted)
}

/// `"<name> (<department>)"`, with the column number added when two columns
/// share a department name or the plain form is already taken. Further
/// clashes get a running counter. The chosen name is reserved in `taken`.
fn disambiguated_name(
    name: &str,
    column: &DepartmentColumn,
    shared_department: bool,
    taken: &mut HashSet<String>,
) -> String {
    let department = &column.department_name;
    let column_number = column.column_index + 1;

    let mut candidate = if shared_department {
        format!("{} ({} #{})", name, department, column_number)
    } else {
        format!("{} ({})", name, department)
    };
    if taken.contains(&candidate) {
        candidate = format!("{} ({} #{})", name, department, column_number);
    }
    let mut counter = 2;
    while taken.contains(&candidate) {
        candidate = format!("{} ({} #{}.{})", name, department, column_number, counter);
        counter += 1;
    }

    taken.insert(candidate.clone());
    candidate
}

pub fn plan_import(
    roster: &[DepartmentColumn],
    resolutions: &HashMap<&str, &ConflictResolution>,
) -> ImportPlan {
    let mut department_counts: HashMap<&str, usize> = HashMap::new();
    for column in roster {
        *department_counts.entry(column.department_name.as_str()).or_default() += 1;
    }
    let columns: HashMap<usize, &DepartmentColumn> =
        roster.iter().map(|c| (c.column_index, c)).collect();

    let entries = index_occurrences(roster);
    let decision_for = |name: &str| resolutions.get(name).map(|r| r.decision);

    // names that keep their roster spelling; generated names must avoid them
    let mut taken: HashSet<String> = entries
        .iter()
        .filter(|e| decision_for(&e.name) != Some(ResolutionDecision::CreateMultiple))
        .map(|e| e.name.clone())
        .collect();

    let mut plan = ImportPlan::default();
    for entry in &entries {
        match decision_for(&entry.name) {
            Some(ResolutionDecision::CreateMultiple) => {
                for occurrence in &entry.occurrences {
                    let Some(column) = columns.get(&occurrence.column_index) else {
                        continue;
                    };
                    let shared = department_counts
                        .get(column.department_name.as_str())
                        .copied()
                        .unwrap_or(0)
                        > 1;
                    plan.assignments.insert(
                        (occurrence.column_index, occurrence.row_index),
                        plan.identities.len(),
                    );
                    plan.identities.push(Identity::Create {
                        name: disambiguated_name(&entry.name, column, shared, &mut taken),
                    });
                }
            }
            other => {
                let identity = match (other, resolutions.get(entry.name.as_str())) {
                    (Some(ResolutionDecision::ReuseExisting), Some(resolution)) => {
                        match &resolution.volunteer_id {
                            Some(id) => Identity::Reuse { id: id.clone() },
                            None => Identity::Create {
                                name: entry.name.clone(),
                            },
                        }
                    }
                    _ => Identity::Create {
                        name: entry.name.clone(),
                    },
                };
                let slot = plan.identities.len();
                plan.identities.push(identity);
                for occurrence in &entry.occurrences {
                    plan.assignments
                        .insert((occurrence.column_index, occurrence.row_index), slot);
                }
            }
        }
    }

    plan
}

/// Creates departments and volunteers for a consumed session.
///
/// Writes are all-or-nothing: if any create fails, the departments and
/// volunteers created so far are deleted again (newest first) before the
/// error is returned.
pub struct ImportExecutor<'a, S: EntityStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: EntityStore + ?Sized> ImportExecutor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        session: &ImportSession,
        resolutions: &[ConflictResolution],
    ) -> Result<ExecuteResult> {
        let accepted = validate_resolutions(&session.conflicts, resolutions)?;
        let plan = plan_import(&session.roster, &accepted);

        tracing::info!(
            "📋 Import plan for session {}: {} departments, {} new volunteers, {} reused",
            session.session_id,
            session.roster.len(),
            plan.volunteers_to_create(),
            plan.volunteers_reused()
        );

        let mut created_volunteers: Vec<String> = Vec::new();
        let mut created_departments: Vec<String> = Vec::new();

        match self
            .apply(session, &plan, &mut created_volunteers, &mut created_departments)
            .await
        {
            Ok(()) => Ok(ExecuteResult {
                success: true,
                departments_created: created_departments.len(),
                volunteers_created: created_volunteers.len(),
                volunteers_reused: plan.volunteers_reused(),
                error_message: None,
                created_department_ids: Some(created_departments),
                created_volunteer_ids: Some(created_volunteers),
            }),
            Err(message) => {
                tracing::warn!("⚠️ {}; rolling back", message);
                let rolled_back = self
                    .compensate(&created_departments, &created_volunteers)
                    .await;
                let message = if rolled_back {
                    message
                } else {
                    format!("{} (rollback incomplete)", message)
                };
                Err(ImportError::CreationFailed {
                    message,
                    rolled_back,
                })
            }
        }
    }

    async fn apply(
        &self,
        session: &ImportSession,
        plan: &ImportPlan,
        created_volunteers: &mut Vec<String>,
        created_departments: &mut Vec<String>,
    ) -> std::result::Result<(), String> {
        let mut resolved_ids = Vec::with_capacity(plan.identities.len());
        for identity in &plan.identities {
            match identity {
                Identity::Reuse { id } => resolved_ids.push(id.clone()),
                Identity::Create { name } => {
                    let volunteer = self
                        .store
                        .create_volunteer(name)
                        .await
                        .map_err(|e| format!("failed to create volunteer '{}': {}", name, e))?;
                    tracing::debug!("Created volunteer '{}' ({})", volunteer.name, volunteer.id);
                    created_volunteers.push(volunteer.id.clone());
                    resolved_ids.push(volunteer.id);
                }
            }
        }

        for column in &session.roster {
            let mut members = Vec::with_capacity(column.members.len() + 1);
            for (row_index, name, is_head) in column.entries() {
                let slot = plan
                    .assignments
                    .get(&(column.column_index, row_index))
                    .copied()
                    .ok_or_else(|| format!("no volunteer resolved for '{}'", name))?;
                members.push(Membership {
                    volunteer_id: resolved_ids[slot].clone(),
                    membership_type: if is_head {
                        MembershipType::Head
                    } else {
                        MembershipType::Member
                    },
                });
            }

            let department = self
                .store
                .create_department(&column.department_name, &members)
                .await
                .map_err(|e| {
                    format!(
                        "failed to create department '{}': {}",
                        column.department_name, e
                    )
                })?;
            tracing::debug!(
                "Created department '{}' ({}) with {} members",
                department.department_name,
                department.id,
                members.len()
            );
            created_departments.push(department.id);
        }

        Ok(())
    }

    /// Returns true when everything created was removed again.
    async fn compensate(&self, departments: &[String], volunteers: &[String]) -> bool {
        let mut clean = true;

        for id in departments.iter().rev() {
            if let Err(e) = self.store.delete_department(id).await {
                tracing::error!("❌ Rollback could not delete department {}: {}", id, e);
                clean = false;
            }
        }
        for id in volunteers.iter().rev() {
            if let Err(e) = self.store.delete_volunteer(id).await {
                tracing::error!("❌ Rollback could not delete volunteer {}: {}", id, e);
                clean = false;
            }
        }

        clean
    }
}
