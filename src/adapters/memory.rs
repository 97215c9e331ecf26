use crate::domain::model::{Department, ExistingVolunteer, Membership, Volunteer};
use crate::domain::ports::{EntityStore, VolunteerDirectory};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    volunteers: Vec<Volunteer>,
    departments: Vec<Department>,
    failing_volunteers: HashSet<String>,
    failing_departments: HashSet<String>,
    failing_deletes: bool,
}

/// In-process directory and entity store. Backs `--dry-run` and the tests;
/// individual creates can be made to fail to exercise compensation.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: Mutex<State>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn seed_volunteer(&self, name: &str) -> Volunteer {
        let volunteer = Volunteer {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
            is_disabled: false,
        };
        self.state().volunteers.push(volunteer.clone());
        volunteer
    }

    pub fn seed_department(&self, name: &str, members: Vec<Membership>) -> Department {
        let department = Department {
            id: uuid::Uuid::new_v4().to_string(),
            department_name: name.to_string(),
            volunteer_members: members,
            is_disabled: false,
        };
        self.state().departments.push(department.clone());
        department
    }

    pub fn disable_volunteer(&self, id: &str) {
        if let Some(v) = self.state().volunteers.iter_mut().find(|v| v.id == id) {
            v.is_disabled = true;
        }
    }

    /// Creating a volunteer with exactly this name will fail.
    pub fn fail_volunteer_creation(&self, name: &str) {
        self.state().failing_volunteers.insert(name.to_string());
    }

    /// Creating a department with exactly this name will fail.
    pub fn fail_department_creation(&self, name: &str) {
        self.state().failing_departments.insert(name.to_string());
    }

    pub fn fail_deletes(&self) {
        self.state().failing_deletes = true;
    }

    pub fn volunteers(&self) -> Vec<Volunteer> {
        self.state().volunteers.clone()
    }

    pub fn departments(&self) -> Vec<Department> {
        self.state().departments.clone()
    }
}

#[async_trait]
impl VolunteerDirectory for InMemoryDirectory {
    async fn find_by_exact_name(&self, name: &str) -> Result<Option<ExistingVolunteer>> {
        let name = name.trim();
        let state = self.state();

        Ok(state
            .volunteers
            .iter()
            .find(|v| !v.is_disabled && v.name.trim() == name)
            .map(|v| ExistingVolunteer {
                id: v.id.clone(),
                name: v.name.clone(),
                created_at: v.created_at,
                current_dept_count: state
                    .departments
                    .iter()
                    .filter(|d| !d.is_disabled)
                    .filter(|d| d.volunteer_members.iter().any(|m| m.volunteer_id == v.id))
                    .count(),
            }))
    }
}

#[async_trait]
impl EntityStore for InMemoryDirectory {
    async fn create_volunteer(&self, name: &str) -> Result<Volunteer> {
        if self.state().failing_volunteers.contains(name) {
            return Err(ImportError::ApiStatus {
                status: 500,
                message: format!("volunteer '{}' rejected", name),
            });
        }
        Ok(self.seed_volunteer(name))
    }

    async fn create_department(&self, name: &str, members: &[Membership]) -> Result<Department> {
        if self.state().failing_departments.contains(name) {
            return Err(ImportError::ApiStatus {
                status: 500,
                message: format!("department '{}' rejected", name),
            });
        }
        Ok(self.seed_department(name, members.to_vec()))
    }

    async fn delete_volunteer(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        if state.failing_deletes {
            return Err(ImportError::ApiStatus {
                status: 503,
                message: format!("cannot delete volunteer {}", id),
            });
        }
        state.volunteers.retain(|v| v.id != id);
        Ok(())
    }

    async fn delete_department(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        if state.failing_deletes {
            return Err(ImportError::ApiStatus {
                status: 503,
                message: format!("cannot delete department {}", id),
            });
        }
        state.departments.retain(|d| d.id != id);
        Ok(())
    }
}
