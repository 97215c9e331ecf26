use crate::core::detector::{count_distinct_volunteers, detect_conflicts};
use crate::core::executor::ImportExecutor;
use crate::core::parser::parse_file;
use crate::core::session::SessionStore;
use crate::domain::model::{
    DepartmentPreview, ExecuteRequest, ExecuteResult, PreviewResult, RosterFile,
};
use crate::domain::ports::{EntityStore, ImportApi, VolunteerDirectory};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 批次匯入服務：預覽（解析、偵測衝突、建立工作階段）與執行
pub struct BatchImportService<D, S> {
    directory: D,
    store: S,
    sessions: SessionStore,
}

impl<D, S> BatchImportService<D, S>
where
    D: VolunteerDirectory,
    S: EntityStore,
{
    pub fn new(directory: D, store: S) -> Self {
        Self::with_sessions(directory, store, SessionStore::default())
    }

    pub fn with_session_ttl(directory: D, store: S, ttl_minutes: u64) -> Self {
        Self::with_sessions(directory, store, SessionStore::with_ttl_minutes(ttl_minutes))
    }

    pub fn with_sessions(directory: D, store: S, sessions: SessionStore) -> Self {
        Self {
            directory,
            store,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Parses the upload and records a session for it.
    ///
    /// Validation errors short-circuit: the result carries only the errors
    /// and no session is created. A failing directory lookup is an error.
    pub async fn preview(&self, file: &RosterFile) -> Result<PreviewResult> {
        tracing::info!(
            "🔍 Previewing '{}' ({} bytes)",
            file.file_name,
            file.bytes.len()
        );

        let roster = parse_file(file);
        if !roster.is_valid() {
            tracing::warn!(
                "⚠️ '{}' has {} validation errors; no session created",
                file.file_name,
                roster.errors.len()
            );
            return Ok(PreviewResult::rejected(roster.errors));
        }

        let conflicts = detect_conflicts(&roster.columns, &self.directory).await?;
        let total_volunteers = count_distinct_volunteers(&roster.columns);
        let departments: Vec<DepartmentPreview> =
            roster.columns.iter().map(DepartmentPreview::from).collect();
        let total_departments = departments.len();

        let session_id = self
            .sessions
            .create(roster.columns, conflicts.clone(), Vec::new());

        tracing::info!(
            "📋 Session {}: {} departments, {} volunteers, {} conflicts ({} live sessions)",
            session_id,
            total_departments,
            total_volunteers,
            conflicts.len(),
            self.sessions.len()
        );

        Ok(PreviewResult {
            departments,
            conflicts,
            validation_errors: Vec::new(),
            total_departments,
            total_volunteers,
            session_id: Some(session_id),
        })
    }

    /// Consumes the session before anything else, so a session can only
    /// ever be executed once even when the resolutions turn out invalid.
    pub async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResult> {
        let session = self.sessions.consume(&request.session_id)?;
        tracing::info!(
            "🚀 Executing session {} with {} resolutions",
            session.session_id,
            request.resolutions.len()
        );

        let result = ImportExecutor::new(&self.store)
            .execute(&session, &request.resolutions)
            .await;

        match &result {
            Ok(done) => tracing::info!(
                "✅ Session {} imported: {} departments, {} volunteers created, {} reused",
                session.session_id,
                done.departments_created,
                done.volunteers_created,
                done.volunteers_reused
            ),
            Err(e) => tracing::error!("❌ Session {} failed: {}", session.session_id, e),
        }

        result
    }
}

#[async_trait]
impl<D, S> ImportApi for BatchImportService<D, S>
where
    D: VolunteerDirectory,
    S: EntityStore,
{
    async fn preview(&self, file: &RosterFile) -> Result<PreviewResult> {
        BatchImportService::preview(self, file).await
    }

    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResult> {
        BatchImportService::execute(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDirectory;
    use crate::domain::model::{ConflictResolution, ConflictType, ValidationErrorType};
    use crate::utils::error::ImportError;
    use std::sync::Arc;

    const MEDIA_WORSHIP: &str = "Media,Worship\nJohn,Sarah\nAlice,John\n";

    fn service() -> (Arc<InMemoryDirectory>, BatchImportService<Arc<InMemoryDirectory>, Arc<InMemoryDirectory>>) {
        let backend = Arc::new(InMemoryDirectory::new());
        let service = BatchImportService::new(backend.clone(), backend.clone());
        (backend, service)
    }

    #[tokio::test]
    async fn test_preview_reports_duplicate_and_session() {
        let (_, service) = service();
        let preview = service
            .preview(&RosterFile::new("roster.csv", MEDIA_WORSHIP))
            .await
            .unwrap();

        assert!(preview.session_id.is_some());
        assert_eq!(preview.total_departments, 2);
        assert_eq!(preview.total_volunteers, 3);
        assert_eq!(preview.conflicts.len(), 1);
        assert_eq!(
            preview.conflicts[0].conflict_type,
            ConflictType::DuplicateInImport
        );
        assert_eq!(service.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_roster_creates_no_session() {
        let (_, service) = service();
        let preview = service
            .preview(&RosterFile::new("roster.csv", "Media,Worship\nJohn,\n"))
            .await
            .unwrap();

        assert!(preview.session_id.is_none());
        assert!(preview.departments.is_empty());
        assert_eq!(
            preview.validation_errors[0].error_type,
            ValidationErrorType::EmptyHead
        );
        assert!(service.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_execute_end_to_end() {
        let (backend, service) = service();
        let preview = service
            .preview(&RosterFile::new("roster.csv", MEDIA_WORSHIP))
            .await
            .unwrap();

        let request = ExecuteRequest {
            session_id: preview.session_id.unwrap(),
            resolutions: vec![ConflictResolution::create_multiple("John")],
        };
        let result = service.execute(&request).await.unwrap();

        assert!(result.success);
        assert_eq!(result.departments_created, 2);
        assert_eq!(result.volunteers_created, 4);
        assert_eq!(backend.departments().len(), 2);
    }

    #[tokio::test]
    async fn test_session_is_consumed_even_when_resolutions_are_invalid() {
        let (backend, service) = service();
        let preview = service
            .preview(&RosterFile::new("roster.csv", MEDIA_WORSHIP))
            .await
            .unwrap();
        let session_id = preview.session_id.unwrap();

        let first = service
            .execute(&ExecuteRequest {
                session_id: session_id.clone(),
                resolutions: vec![],
            })
            .await;
        assert!(matches!(first, Err(ImportError::UnresolvedConflicts { .. })));

        let second = service
            .execute(&ExecuteRequest {
                session_id,
                resolutions: vec![ConflictResolution::create_one("John")],
            })
            .await;
        assert!(matches!(
            second,
            Err(ImportError::SessionAlreadyExecuted { .. })
        ));
        assert!(backend.volunteers().is_empty());
    }

    #[test]
    fn test_oversized_session_ttl_is_clamped() {
        let backend = Arc::new(InMemoryDirectory::new());
        let service =
            BatchImportService::with_session_ttl(backend.clone(), backend, 1_000_000_000_000_000);

        assert_eq!(
            service.sessions().ttl(),
            chrono::Duration::minutes(crate::core::session::MAX_SESSION_TTL_MINUTES)
        );
    }

    #[tokio::test]
    async fn test_unknown_session_reads_as_expired() {
        let (_, service) = service();
        let err = service
            .execute(&ExecuteRequest {
                session_id: "missing".to_string(),
                resolutions: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::SessionExpired { .. }));
        assert_eq!(
            ExecuteResult::failure(&err).error_message.as_deref(),
            Some(err.to_string().as_str())
        );
    }
}
