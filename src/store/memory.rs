use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{DEFAULT_SESSION_TTL, STATE_MARKER, STATE_TTL, TokenStore, session_key, state_key};
use crate::error::Error;
use crate::random::generate_identifier;
use crate::types::{SessionId, StateId};

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process [`TokenStore`] backed by a mutex-guarded map.
///
/// Expired entries are invisible to every operation and are reclaimed by
/// [`sweep_expired`](Self::sweep_expired). Uses the tokio clock, so tests can
/// pause and advance time.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    session_ttl: Duration,
}

impl MemoryStore {
    #[must_use]
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            session_ttl,
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Number of entries currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: String, value: String, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().insert(key, entry);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl TokenStore for MemoryStore {
    async fn create_state(&self) -> Result<StateId, Error> {
        let state = StateId(generate_identifier());
        self.insert(state_key(&state), STATE_MARKER.to_string(), STATE_TTL);
        Ok(state)
    }

    async fn validate_state(&self, state: &StateId) -> Result<(), Error> {
        let now = Instant::now();
        // Remove under the lock: the first caller takes the entry, later ones find nothing.
        match self.entries.lock().remove(&state_key(state)) {
            Some(entry) if entry.is_live(now) => Ok(()),
            _ => Err(Error::InvalidOrExpiredState),
        }
    }

    async fn create_session(&self, refresh_token: &str) -> Result<SessionId, Error> {
        let session_id = SessionId(generate_identifier());
        self.insert(
            session_key(&session_id),
            refresh_token.to_string(),
            self.session_ttl,
        );
        Ok(session_id)
    }

    async fn get_refresh_token(&self, session_id: &SessionId) -> Result<String, Error> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(&session_key(session_id))
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
            .ok_or(Error::SessionNotFound)
    }

    async fn update_session(&self, session_id: &SessionId, refresh_token: &str) -> Result<(), Error> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(&session_key(session_id)) {
            Some(entry) if entry.is_live(now) => {
                entry.value = refresh_token.to_string();
                entry.expires_at = now + self.session_ttl;
                Ok(())
            }
            _ => Err(Error::SessionNotFound),
        }
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), Error> {
        self.entries.lock().remove(&session_key(session_id));
        Ok(())
    }
}
