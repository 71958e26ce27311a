use crate::backend::HabitBackend;
use crate::dates::{date_key, parse_date_key};
use crate::errors::AppError;
use crate::models::{
    validate_name, DayHabit, DayView, Habit, HabitPatch, Section, SectionView, UserId,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Flips membership of `date` in the habit's completion set.
pub fn toggle_completion(mut habit: Habit, date: &str) -> Habit {
    if !habit.completed_dates.remove(date) {
        habit.completed_dates.insert(date.to_string());
    }
    habit
}

/// In-memory habits of one signed-in user.
///
/// Every mutation is written to the backend first; the local snapshot only
/// changes once the backend confirmed the write, so a failed call leaves the
/// store exactly as it was.
pub struct HabitStore {
    user: UserId,
    backend: Arc<dyn HabitBackend>,
    habits: Vec<Habit>,
}

impl HabitStore {
    pub fn new(user: UserId, backend: Arc<dyn HabitBackend>) -> Self {
        Self {
            user,
            backend,
            habits: Vec::new(),
        }
    }

    /// Builds a store from the habits and completion records the backend holds for `user`.
    pub async fn load(user: UserId, backend: Arc<dyn HabitBackend>) -> Result<Self, AppError> {
        let mut store = Self::new(user, backend);
        store.refresh().await?;
        Ok(store)
    }

    pub async fn refresh(&mut self) -> Result<(), AppError> {
        let records = self
            .backend
            .fetch_habits(&self.user)
            .await
            .inspect_err(|err| error!(user = %self.user, "failed to fetch habits: {err}"))?;
        let completions = self
            .backend
            .fetch_completions(&self.user)
            .await
            .inspect_err(|err| error!(user = %self.user, "failed to fetch completions: {err}"))?;

        let mut habits: Vec<Habit> = records.into_iter().map(Habit::from_record).collect();
        for completion in completions {
            let date = match parse_date_key(&completion.date) {
                Ok(date) => date_key(date),
                Err(_) => {
                    warn!(habit = %completion.habit_id, "skipping completion with invalid date '{}'", completion.date);
                    continue;
                }
            };
            match habits.iter_mut().find(|habit| habit.id == completion.habit_id) {
                Some(habit) => {
                    habit.completed_dates.insert(date);
                }
                None => warn!(habit = %completion.habit_id, "skipping completion of unknown habit"),
            }
        }

        self.habits = habits;
        Ok(())
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn get(&self, habit_id: &str) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == habit_id)
    }

    /// Owned copy for the statistics engine.
    pub fn snapshot(&self) -> Vec<Habit> {
        self.habits.clone()
    }

    pub async fn add(&mut self, name: &str, section: Section) -> Result<Habit, AppError> {
        let name = validate_name(name)?;
        let record = self
            .backend
            .insert_habit(&self.user, &name, section)
            .await
            .inspect_err(|err| error!(user = %self.user, "failed to add habit: {err}"))?;

        let habit = Habit::from_record(record);
        info!(user = %self.user, habit = %habit.id, "added habit");
        self.habits.insert(0, habit.clone());
        Ok(habit)
    }

    pub async fn remove(&mut self, habit_id: &str) -> Result<(), AppError> {
        let index = self.position(habit_id)?;
        self.backend
            .delete_habit(&self.user, habit_id)
            .await
            .inspect_err(|err| error!(user = %self.user, habit = habit_id, "failed to remove habit: {err}"))?;

        self.habits.remove(index);
        info!(user = %self.user, habit = habit_id, "removed habit");
        Ok(())
    }

    pub async fn update(&mut self, habit_id: &str, patch: HabitPatch) -> Result<Habit, AppError> {
        let patch = HabitPatch {
            name: patch.name.as_deref().map(validate_name).transpose()?,
            section: patch.section,
        };
        if patch.is_empty() {
            return Err(AppError::bad_request("nothing to update"));
        }
        let index = self.position(habit_id)?;

        self.backend
            .update_habit(&self.user, habit_id, &patch)
            .await
            .inspect_err(|err| error!(user = %self.user, habit = habit_id, "failed to update habit: {err}"))?;

        let habit = &mut self.habits[index];
        patch.apply(habit);
        info!(user = %self.user, habit = habit_id, "updated habit");
        Ok(habit.clone())
    }

    pub async fn toggle(&mut self, habit_id: &str, date: NaiveDate) -> Result<Habit, AppError> {
        let index = self.position(habit_id)?;
        let key = date_key(date);
        let completed = self.habits[index].is_completed_on(&key);

        let written = if completed {
            self.backend
                .delete_completion(&self.user, habit_id, &key)
                .await
        } else {
            self.backend
                .insert_completion(&self.user, habit_id, &key)
                .await
        };
        written.inspect_err(|err| {
            error!(user = %self.user, habit = habit_id, date = %key, "failed to toggle completion: {err}")
        })?;

        let habit = toggle_completion(self.habits[index].clone(), &key);
        self.habits[index] = habit.clone();
        info!(user = %self.user, habit = habit_id, date = %key, completed = !completed, "toggled completion");
        Ok(habit)
    }

    /// Habits grouped by section in display order, flagged for `date`.
    pub fn day_view(&self, date: NaiveDate) -> DayView {
        let key = date_key(date);
        let sections = Section::ALL
            .into_iter()
            .map(|section| SectionView {
                section,
                habits: self
                    .habits
                    .iter()
                    .filter(|habit| habit.section == section)
                    .map(|habit| DayHabit {
                        id: habit.id.clone(),
                        name: habit.name.clone(),
                        completed: habit.is_completed_on(&key),
                    })
                    .collect(),
            })
            .collect();

        DayView { date: key, sections }
    }

    fn position(&self, habit_id: &str) -> Result<usize, AppError> {
        self.habits
            .iter()
            .position(|habit| habit.id == habit_id)
            .ok_or_else(|| AppError::not_found(format!("habit {habit_id} not found")))
    }
}
