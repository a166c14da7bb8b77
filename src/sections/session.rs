//! Editor sessions, keyed by the `x-editor-session` header.
//!
//! A session owns its open-section storage, one [`SectionEditor`] per case
//! study and a [`SectionFetcher`] for page loads. It ends on logout or once
//! it has been idle longer than the registry's TTL. The registry also keeps
//! at most `max_sessions` sessions and evicts the least recently used.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::editor::SectionEditor;
use super::fetch::SectionFetcher;
use super::open_state::MemorySessionStorage;
use super::store::SectionStore;

pub type SharedEditor = Arc<tokio::sync::Mutex<SectionEditor<Arc<dyn SectionStore>>>>;

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(8 * 60 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 256;

#[derive(Default)]
pub struct EditorSession {
    storage: Arc<MemorySessionStorage>,
    fetcher: SectionFetcher,
    editors: Mutex<HashMap<Uuid, SharedEditor>>,
}

impl EditorSession {
    pub fn storage(&self) -> Arc<MemorySessionStorage> {
        self.storage.clone()
    }

    pub fn fetcher(&self) -> &SectionFetcher {
        &self.fetcher
    }

    fn editors(&self) -> MutexGuard<'_, HashMap<Uuid, SharedEditor>> {
        self.editors.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The editor already open for `case_study_id`, if any.
    pub fn editor(&self, case_study_id: Uuid) -> Option<SharedEditor> {
        self.editors().get(&case_study_id).cloned()
    }

    /// Keep `editor` for `case_study_id` unless a concurrent request got
    /// there first; either way the kept editor is returned.
    pub fn insert_editor(
        &self,
        case_study_id: Uuid,
        editor: SectionEditor<Arc<dyn SectionStore>>,
    ) -> SharedEditor {
        self.editors()
            .entry(case_study_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(editor)))
            .clone()
    }
}

struct SessionEntry {
    session: Arc<EditorSession>,
    last_seen: Instant,
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_limits(DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The session for `session_id`, created on first use. Touching a
    /// session refreshes its idle timer.
    pub fn session(&self, session_id: &str) -> Arc<EditorSession> {
        let now = Instant::now();
        let mut sessions = self.lock();

        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) <= self.idle_ttl);
        if sessions.len() < before {
            tracing::debug!(expired = before - sessions.len(), "expired idle editor sessions");
        }

        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_seen = now;
            return entry.session.clone();
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                tracing::debug!("evicted least recently used editor session");
            }
        }

        let session = Arc::new(EditorSession::default());
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                session: session.clone(),
                last_seen: now,
            },
        );
        session
    }

    /// Open-section storage for `session_id`.
    pub fn storage(&self, session_id: &str) -> Arc<MemorySessionStorage> {
        self.session(session_id).storage()
    }

    /// Drop everything kept for a session. Returns whether it existed.
    pub fn end(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
