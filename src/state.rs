use crate::backend::HabitBackend;
use crate::config::DEFAULT_MAX_SESSIONS;
use crate::errors::AppError;
use crate::models::UserId;
use crate::store::HabitStore;
use std::{collections::HashMap, sync::Arc, time::Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub type SharedStore = Arc<Mutex<HabitStore>>;

struct Session {
    store: SharedStore,
    last_used: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn HabitBackend>,
    sessions: Arc<Mutex<HashMap<UserId, Session>>>,
    max_sessions: usize,
}

impl AppState {
    pub fn new(backend: Arc<dyn HabitBackend>) -> Self {
        Self::with_session_limit(backend, DEFAULT_MAX_SESSIONS)
    }

    /// Keeps at most `max_sessions` idle stores in memory. Stores are rebuilt
    /// from the backend on demand, so evicting one loses nothing.
    pub fn with_session_limit(backend: Arc<dyn HabitBackend>, max_sessions: usize) -> Self {
        Self {
            backend,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Returns the user's store, loading it from the backend on first use.
    /// The registry lock is not held while loading.
    pub async fn store_for(&self, user: &UserId) -> Result<SharedStore, AppError> {
        if let Some(session) = self.sessions.lock().await.get_mut(user) {
            session.last_used = Instant::now();
            return Ok(Arc::clone(&session.store));
        }

        let loaded = HabitStore::load(user.clone(), Arc::clone(&self.backend)).await?;

        let mut sessions = self.sessions.lock().await;
        if !sessions.contains_key(user) {
            evict_idle(&mut sessions, self.max_sessions);
        }
        // a concurrent request may have loaded the same user first; keep that one
        let session = sessions.entry(user.clone()).or_insert_with(|| Session {
            store: Arc::new(Mutex::new(loaded)),
            last_used: Instant::now(),
        });
        session.last_used = Instant::now();
        Ok(Arc::clone(&session.store))
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Drops least recently used stores nobody holds until there is room for one more.
fn evict_idle(sessions: &mut HashMap<UserId, Session>, max_sessions: usize) {
    while sessions.len() >= max_sessions {
        let idle = sessions
            .iter()
            .filter(|(_, session)| Arc::strong_count(&session.store) == 1)
            .min_by_key(|(_, session)| session.last_used)
            .map(|(user, _)| user.clone());

        match idle {
            Some(user) => {
                sessions.remove(&user);
                debug!(user = %user, "evicted idle session");
            }
            None => {
                warn!(sessions = sessions.len(), "all sessions busy, exceeding limit");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FileBackend;
    use crate::errors::BackendError;
    use crate::models::{CompletionRecord, HabitPatch, HabitRecord, Section};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn user(name: &str) -> UserId {
        UserId::parse(name).unwrap()
    }

    /// Holds `fetch_habits` for the user "slow" until `release` is notified.
    struct GatedBackend {
        inner: FileBackend,
        release: Notify,
    }

    #[async_trait]
    impl HabitBackend for GatedBackend {
        async fn fetch_habits(&self, user: &UserId) -> Result<Vec<HabitRecord>, BackendError> {
            if user.as_str() == "slow" {
                self.release.notified().await;
            }
            self.inner.fetch_habits(user).await
        }

        async fn fetch_completions(
            &self,
            user: &UserId,
        ) -> Result<Vec<CompletionRecord>, BackendError> {
            self.inner.fetch_completions(user).await
        }

        async fn insert_habit(
            &self,
            user: &UserId,
            name: &str,
            section: Section,
        ) -> Result<HabitRecord, BackendError> {
            self.inner.insert_habit(user, name, section).await
        }

        async fn delete_habit(&self, user: &UserId, habit_id: &str) -> Result<(), BackendError> {
            self.inner.delete_habit(user, habit_id).await
        }

        async fn update_habit(
            &self,
            user: &UserId,
            habit_id: &str,
            patch: &HabitPatch,
        ) -> Result<HabitRecord, BackendError> {
            self.inner.update_habit(user, habit_id, patch).await
        }

        async fn insert_completion(
            &self,
            user: &UserId,
            habit_id: &str,
            date: &str,
        ) -> Result<(), BackendError> {
            self.inner.insert_completion(user, habit_id, date).await
        }

        async fn delete_completion(
            &self,
            user: &UserId,
            habit_id: &str,
            date: &str,
        ) -> Result<(), BackendError> {
            self.inner.delete_completion(user, habit_id, date).await
        }
    }

    #[tokio::test]
    async fn slow_load_does_not_block_other_users() {
        let backend = Arc::new(GatedBackend {
            inner: FileBackend::in_memory(),
            release: Notify::new(),
        });
        let state = AppState::new(backend.clone());

        let slow_state = state.clone();
        let slow = tokio::spawn(async move { slow_state.store_for(&user("slow")).await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let fast = tokio::time::timeout(Duration::from_secs(2), state.store_for(&user("fast")))
            .await
            .expect("fast user waited on slow user's load");
        assert!(fast.is_ok());

        backend.release.notify_one();
        assert!(slow.await.unwrap().is_ok());
        assert_eq!(state.session_count().await, 2);
    }

    #[tokio::test]
    async fn repeated_lookups_share_one_store() {
        let state = AppState::new(Arc::new(FileBackend::in_memory()));
        let first = state.store_for(&user("alice")).await.unwrap();
        let second = state.store_for(&user("alice")).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_at_the_limit() {
        let backend = Arc::new(FileBackend::in_memory());
        let state = AppState::with_session_limit(backend, 2);

        {
            let store = state.store_for(&user("a")).await.unwrap();
            store.lock().await.add("Run", Section::BodyAndMind).await.unwrap();
        }
        state.store_for(&user("b")).await.unwrap();
        state.store_for(&user("c")).await.unwrap();
        assert_eq!(state.session_count().await, 2);

        // "a" was evicted and reloads with its data intact
        let reloaded = state.store_for(&user("a")).await.unwrap();
        assert_eq!(reloaded.lock().await.habits().len(), 1);
        assert_eq!(state.session_count().await, 2);
    }

    #[tokio::test]
    async fn sessions_in_use_are_not_evicted() {
        let state = AppState::with_session_limit(Arc::new(FileBackend::in_memory()), 1);
        let held = state.store_for(&user("a")).await.unwrap();

        state.store_for(&user("b")).await.unwrap();
        assert_eq!(state.session_count().await, 2);

        let again = state.store_for(&user("a")).await.unwrap();
        assert!(Arc::ptr_eq(&held, &again));
    }
}
