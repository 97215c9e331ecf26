use crate::domain::model::{
    Department, ExecuteRequest, ExecuteResult, ExistingVolunteer, Membership, PreviewResult,
    RosterFile, Volunteer,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Lookup against existing, non-disabled volunteers.
#[async_trait]
pub trait VolunteerDirectory: Send + Sync {
    /// Names are compared after trimming; otherwise exact and case-sensitive.
    async fn find_by_exact_name(&self, name: &str) -> Result<Option<ExistingVolunteer>>;

    /// Looks up every name of one roster; only the names found are keyed.
    /// Remote directories override this to fetch their listings once.
    async fn find_by_exact_names(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, ExistingVolunteer>> {
        let mut found = HashMap::new();
        for name in names {
            if let Some(existing) = self.find_by_exact_name(name).await? {
                found.insert(name.clone(), existing);
            }
        }
        Ok(found)
    }
}

/// Per-entity create, plus the deletes used to compensate a failed import.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create_volunteer(&self, name: &str) -> Result<Volunteer>;
    async fn create_department(&self, name: &str, members: &[Membership]) -> Result<Department>;
    async fn delete_volunteer(&self, id: &str) -> Result<()>;
    async fn delete_department(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl<T: VolunteerDirectory + ?Sized> VolunteerDirectory for std::sync::Arc<T> {
    async fn find_by_exact_name(&self, name: &str) -> Result<Option<ExistingVolunteer>> {
        (**self).find_by_exact_name(name).await
    }

    async fn find_by_exact_names(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, ExistingVolunteer>> {
        (**self).find_by_exact_names(names).await
    }
}

#[async_trait]
impl<T: EntityStore + ?Sized> EntityStore for std::sync::Arc<T> {
    async fn create_volunteer(&self, name: &str) -> Result<Volunteer> {
        (**self).create_volunteer(name).await
    }

    async fn create_department(&self, name: &str, members: &[Membership]) -> Result<Department> {
        (**self).create_department(name, members).await
    }

    async fn delete_volunteer(&self, id: &str) -> Result<()> {
        (**self).delete_volunteer(id).await
    }

    async fn delete_department(&self, id: &str) -> Result<()> {
        (**self).delete_department(id).await
    }
}

/// The two-phase import surface: preview an upload, then execute it once.
#[async_trait]
pub trait ImportApi: Send + Sync {
    async fn preview(&self, file: &RosterFile) -> Result<PreviewResult>;
    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResult>;
}
