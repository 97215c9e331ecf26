use crate::config::ApiConfig;
use crate::domain::model::{Department, ExistingVolunteer, Membership, MembershipType, Volunteer};
use crate::domain::ports::{EntityStore, VolunteerDirectory};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateVolunteerBody<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDepartmentBody<'a> {
    department_name: &'a str,
    initial_head_id: &'a str,
    volunteer_members: Vec<&'a str>,
}

/// 排班系統 REST API 的客戶端
#[derive(Debug, Clone)]
pub struct RestApiClient {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl RestApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::build(base_url, None, None)
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::build(&config.base_url, config.timeout_seconds, config.token())
    }

    fn build(base_url: &str, timeout_seconds: Option<u64>, auth_token: Option<&str>) -> Result<Self> {
        // trailing slash so joins append instead of replacing the last segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| ImportError::InvalidConfigValueError {
            field: "api.base_url".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let mut builder = Client::builder();
        if let Some(seconds) = timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            auth_token: auth_token.map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ImportError::ConfigError {
                message: format!("Cannot build API url for '{}': {}", path, e),
            })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        tracing::debug!("📡 {}: API response status: {}", what, status);

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ImportError::ApiStatus {
            status: status.as_u16(),
            message: if body.is_empty() {
                format!("{} failed", what)
            } else {
                format!("{} failed: {}", what, body)
            },
        })
    }

    pub async fn list_volunteers(&self) -> Result<Vec<Volunteer>> {
        let request = self.client.get(self.url("volunteers")?);
        Ok(self.send(request, "list volunteers").await?.json().await?)
    }

    pub async fn list_departments(&self) -> Result<Vec<Department>> {
        let request = self.client.get(self.url("departments")?);
        Ok(self.send(request, "list departments").await?.json().await?)
    }
}

/// Active departments that list the volunteer, head or member.
fn active_department_count(departments: &[Department], volunteer_id: &str) -> usize {
    departments
        .iter()
        .filter(|d| !d.is_disabled)
        .filter(|d| d.volunteer_members.iter().any(|m| m.volunteer_id == volunteer_id))
        .count()
}

/// Matches names against one volunteer listing. When several active
/// volunteers share a name the first listed wins and the clash is logged.
fn match_names(names: &[String], volunteers: Vec<Volunteer>) -> HashMap<String, Volunteer> {
    let mut by_name: HashMap<String, Vec<Volunteer>> = HashMap::new();
    for volunteer in volunteers.into_iter().filter(|v| !v.is_disabled) {
        by_name
            .entry(volunteer.name.trim().to_string())
            .or_default()
            .push(volunteer);
    }

    let mut matched = HashMap::new();
    for name in names {
        let Some(candidates) = by_name.remove(name.trim()) else {
            continue;
        };
        if candidates.len() > 1 {
            let ids: Vec<&str> = candidates.iter().map(|v| v.id.as_str()).collect();
            tracing::warn!(
                "⚠️ {} active volunteers are named '{}' ({}); using {}",
                candidates.len(),
                name.trim(),
                ids.join(", "),
                ids[0]
            );
        }
        if let Some(first) = candidates.into_iter().next() {
            matched.insert(name.clone(), first);
        }
    }
    matched
}

#[async_trait]
impl VolunteerDirectory for RestApiClient {
    async fn find_by_exact_name(&self, name: &str) -> Result<Option<ExistingVolunteer>> {
        let name = name.to_string();
        let mut found = self.find_by_exact_names(std::slice::from_ref(&name)).await?;
        Ok(found.remove(&name))
    }

    /// One volunteer listing per call, plus one department listing when
    /// anything matched.
    async fn find_by_exact_names(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, ExistingVolunteer>> {
        let matched = match_names(names, self.list_volunteers().await?);
        if matched.is_empty() {
            return Ok(HashMap::new());
        }

        let departments = self.list_departments().await?;
        tracing::debug!(
            "📡 {} of {} roster names match existing volunteers",
            matched.len(),
            names.len()
        );

        Ok(matched
            .into_iter()
            .map(|(name, volunteer)| {
                let current_dept_count = active_department_count(&departments, &volunteer.id);
                let existing = ExistingVolunteer {
                    id: volunteer.id,
                    name: volunteer.name,
                    created_at: volunteer.created_at,
                    current_dept_count,
                };
                (name, existing)
            })
            .collect())
    }
}

#[async_trait]
impl EntityStore for RestApiClient {
    async fn create_volunteer(&self, name: &str) -> Result<Volunteer> {
        let request = self
            .client
            .post(self.url("volunteers")?)
            .json(&CreateVolunteerBody { name });
        Ok(self.send(request, "create volunteer").await?.json().await?)
    }

    /// The API takes the head separately; the remaining memberships become
    /// plain members.
    async fn create_department(&self, name: &str, members: &[Membership]) -> Result<Department> {
        let head = members
            .iter()
            .find(|m| m.membership_type == MembershipType::Head)
            .ok_or_else(|| ImportError::InvalidFormat {
                message: format!("department '{}' has no head", name),
            })?;

        let body = CreateDepartmentBody {
            department_name: name,
            initial_head_id: &head.volunteer_id,
            volunteer_members: members
                .iter()
                .filter(|m| m.membership_type == MembershipType::Member)
                .map(|m| m.volunteer_id.as_str())
                .collect(),
        };
        let request = self.client.post(self.url("departments")?).json(&body);
        Ok(self.send(request, "create department").await?.json().await?)
    }

    async fn delete_volunteer(&self, id: &str) -> Result<()> {
        let request = self.client.delete(self.url(&format!("volunteers/{}", id))?);
        self.send(request, "delete volunteer").await?;
        Ok(())
    }

    async fn delete_department(&self, id: &str) -> Result<()> {
        let request = self.client.delete(self.url(&format!("departments/{}", id))?);
        self.send(request, "delete department").await?;
        Ok(())
    }
}
