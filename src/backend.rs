use crate::errors::BackendError;
use crate::models::{CompletionRecord, HabitPatch, HabitRecord, Section, UserId};
use crate::storage::{load_data, persist_data, BackendData, StoredCompletion, StoredHabit};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Persistence collaborator holding habits and completion records.
/// Every call is scoped to the user it is made on behalf of.
#[async_trait]
pub trait HabitBackend: Send + Sync + 'static {
    /// Habits of `user`, newest first.
    async fn fetch_habits(&self, user: &UserId) -> Result<Vec<HabitRecord>, BackendError>;

    async fn fetch_completions(&self, user: &UserId)
    -> Result<Vec<CompletionRecord>, BackendError>;

    /// Creates a habit, assigning its id and creation timestamp.
    async fn insert_habit(
        &self,
        user: &UserId,
        name: &str,
        section: Section,
    ) -> Result<HabitRecord, BackendError>;

    /// Deletes a habit together with all of its completion records.
    async fn delete_habit(&self, user: &UserId, habit_id: &str) -> Result<(), BackendError>;

    async fn update_habit(
        &self,
        user: &UserId,
        habit_id: &str,
        patch: &HabitPatch,
    ) -> Result<HabitRecord, BackendError>;

    async fn insert_completion(
        &self,
        user: &UserId,
        habit_id: &str,
        date: &str,
    ) -> Result<(), BackendError>;

    async fn delete_completion(
        &self,
        user: &UserId,
        habit_id: &str,
        date: &str,
    ) -> Result<(), BackendError>;
}

/// JSON document backend. Writes are applied to a copy of the document and only
/// become visible once the copy was persisted.
pub struct FileBackend {
    path: Option<PathBuf>,
    data: Mutex<BackendData>,
}

impl FileBackend {
    pub async fn open(path: PathBuf) -> Result<Self, BackendError> {
        let data = load_data(&path).await?;
        debug!(
            habits = data.habits.len(),
            completions = data.completions.len(),
            "loaded data file {}",
            path.display()
        );
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(BackendData::default()),
        }
    }

    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut BackendData) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let value = change(&mut next)?;

        if let Some(path) = &self.path {
            persist_data(path, &next).await?;
        }

        *data = next;
        Ok(value)
    }
}

fn owns_habit(data: &BackendData, user: &UserId, habit_id: &str) -> bool {
    data.habits
        .iter()
        .any(|habit| &habit.user_id == user && habit.record.id == habit_id)
}

fn habit_not_found(habit_id: &str) -> BackendError {
    BackendError::NotFound(format!("habit {habit_id}"))
}

#[async_trait]
impl HabitBackend for FileBackend {
    async fn fetch_habits(&self, user: &UserId) -> Result<Vec<HabitRecord>, BackendError> {
        let data = self.data.lock().await;
        let mut habits: Vec<HabitRecord> = data
            .habits
            .iter()
            .rev()
            .filter(|habit| &habit.user_id == user)
            .map(|habit| habit.record.clone())
            .collect();
        // stable: equal timestamps keep newest-inserted first
        habits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(habits)
    }

    async fn fetch_completions(
        &self,
        user: &UserId,
    ) -> Result<Vec<CompletionRecord>, BackendError> {
        let data = self.data.lock().await;
        Ok(data
            .completions
            .iter()
            .filter(|completion| &completion.user_id == user)
            .map(|completion| completion.record.clone())
            .collect())
    }

    async fn insert_habit(
        &self,
        user: &UserId,
        name: &str,
        section: Section,
    ) -> Result<HabitRecord, BackendError> {
        let record = HabitRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            section,
            created_at: Utc::now(),
        };

        self.commit(|data| {
            data.habits.push(StoredHabit {
                user_id: user.clone(),
                record: record.clone(),
            });
            Ok(())
        })
        .await?;

        Ok(record)
    }

    async fn delete_habit(&self, user: &UserId, habit_id: &str) -> Result<(), BackendError> {
        self.commit(|data| {
            if !owns_habit(data, user, habit_id) {
                return Err(habit_not_found(habit_id));
            }
            data.habits
                .retain(|habit| !(&habit.user_id == user && habit.record.id == habit_id));
            data.completions.retain(|completion| {
                !(&completion.user_id == user && completion.record.habit_id == habit_id)
            });
            Ok(())
        })
        .await
    }

    async fn update_habit(
        &self,
        user: &UserId,
        habit_id: &str,
        patch: &HabitPatch,
    ) -> Result<HabitRecord, BackendError> {
        self.commit(|data| {
            let stored = data
                .habits
                .iter_mut()
                .find(|habit| &habit.user_id == user && habit.record.id == habit_id)
                .ok_or_else(|| habit_not_found(habit_id))?;

            if let Some(name) = &patch.name {
                stored.record.name = name.clone();
            }
            if let Some(section) = patch.section {
                stored.record.section = section;
            }
            Ok(stored.record.clone())
        })
        .await
    }

    async fn insert_completion(
        &self,
        user: &UserId,
        habit_id: &str,
        date: &str,
    ) -> Result<(), BackendError> {
        self.commit(|data| {
            if !owns_habit(data, user, habit_id) {
                return Err(habit_not_found(habit_id));
            }
            let exists = data.completions.iter().any(|completion| {
                &completion.user_id == user
                    && completion.record.habit_id == habit_id
                    && completion.record.date == date
            });
            if !exists {
                data.completions.push(StoredCompletion {
                    user_id: user.clone(),
                    record: CompletionRecord {
                        habit_id: habit_id.to_string(),
                        date: date.to_string(),
                    },
                });
            }
            Ok(())
        })
        .await
    }

    async fn delete_completion(
        &self,
        user: &UserId,
        habit_id: &str,
        date: &str,
    ) -> Result<(), BackendError> {
        self.commit(|data| {
            data.completions.retain(|completion| {
                !(&completion.user_id == user
                    && completion.record.habit_id == habit_id
                    && completion.record.date == date)
            });
            Ok(())
        })
        .await
    }
}
