use crate::domain::model::{DepartmentColumn, ValidationError, VolunteerConflict};
use crate::utils::error::ImportError;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 30;
/// One week; longer sessions would outlive any realistic review.
pub const MAX_SESSION_TTL_MINUTES: i64 = 7 * 24 * 60;

/// 預覽結果的伺服器端快取，只能執行一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSession {
    pub session_id: String,
    pub roster: Vec<DepartmentColumn>,
    pub conflicts: Vec<VolunteerConflict>,
    pub validation_errors: Vec<ValidationError>,
    pub created_at: DateTime<Utc>,
    pub consumed: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("session '{0}' already consumed")]
    AlreadyConsumed(String),
}

impl From<SessionError> for ImportError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(session_id) => ImportError::SessionExpired { session_id },
            SessionError::AlreadyConsumed(session_id) => {
                ImportError::SessionAlreadyExecuted { session_id }
            }
        }
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Holds preview sessions for a bounded time. Expired sessions are evicted
/// lazily on every access; consumed sessions stay as tombstones until then
/// so a second execute still reports `AlreadyConsumed`.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, ImportSession>>,
    ttl: Duration,
    clock: Clock,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .field("sessions", &self.len())
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_SESSION_TTL_MINUTES))
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(Utc::now))
    }

    /// TTL in whole minutes, clamped to `1..=MAX_SESSION_TTL_MINUTES`.
    pub fn with_ttl_minutes(ttl_minutes: u64) -> Self {
        let minutes = i64::try_from(ttl_minutes)
            .unwrap_or(i64::MAX)
            .clamp(1, MAX_SESSION_TTL_MINUTES);
        if u64::try_from(minutes) != Ok(ttl_minutes) {
            tracing::warn!(
                "⚠️ Session TTL of {} minutes is out of range; using {}",
                ttl_minutes,
                minutes
            );
        }
        Self::new(Duration::minutes(minutes))
    }

    pub fn with_clock(ttl: Duration, clock: Clock) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ImportSession>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let now = (self.clock)();
        let ttl = self.ttl;
        sessions.retain(|id, session| {
            let alive = session
                .created_at
                .checked_add_signed(ttl)
                .map_or(true, |expires_at| expires_at > now);
            if !alive {
                tracing::debug!("🗑️ Evicting expired import session {}", id);
            }
            alive
        });
        sessions
    }

    pub fn create(
        &self,
        roster: Vec<DepartmentColumn>,
        conflicts: Vec<VolunteerConflict>,
        validation_errors: Vec<ValidationError>,
    ) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = ImportSession {
            session_id: session_id.clone(),
            roster,
            conflicts,
            validation_errors,
            created_at: (self.clock)(),
            consumed: false,
        };

        self.lock().insert(session_id.clone(), session);
        tracing::debug!("Created import session {}", session_id);
        session_id
    }

    pub fn get(&self, session_id: &str) -> Result<ImportSession, SessionError> {
        self.lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Flips the session to consumed under the store lock, so exactly one
    /// caller wins; every later call sees `AlreadyConsumed`.
    pub fn consume(&self, session_id: &str) -> Result<ImportSession, SessionError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if session.consumed {
            return Err(SessionError::AlreadyConsumed(session_id.to_string()));
        }
        session.consumed = true;
        tracing::debug!("Consumed import session {}", session_id);
        Ok(session.clone())
    }

    /// Live (unexpired) sessions, consumed or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
