use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    #[serde(rename = "Body and Mind")]
    BodyAndMind,
    #[serde(rename = "Knowledge and Learning")]
    KnowledgeAndLearning,
    #[serde(rename = "Misc")]
    Misc,
}

impl Section {
    /// Display order of the habit list.
    pub const ALL: [Section; 3] = [
        Section::BodyAndMind,
        Section::KnowledgeAndLearning,
        Section::Misc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::BodyAndMind => "Body and Mind",
            Section::KnowledgeAndLearning => "Knowledge and Learning",
            Section::Misc => "Misc",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s.trim())
            .ok_or_else(|| AppError::bad_request(format!("unknown section '{s}'")))
    }
}

/// Identity of the signed-in user every collaborator call is scoped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::unauthorized("missing user identity"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub section: Section,
    pub completed_dates: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    pub fn from_record(record: HabitRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            section: record.section,
            completed_dates: BTreeSet::new(),
            created_at: record.created_at,
        }
    }

    pub fn is_completed_on(&self, date_key: &str) -> bool {
        self.completed_dates.contains(date_key)
    }
}

/// Habit row as the persistence collaborator stores it, without completions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitRecord {
    pub id: String,
    pub name: String,
    pub section: Section,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub habit_id: String,
    pub date: String,
}

/// Partial edit of a habit. Completions are never part of a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub section: Option<Section>,
}

impl HabitPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.section.is_none()
    }

    pub fn apply(&self, habit: &mut Habit) {
        if let Some(name) = &self.name {
            habit.name = name.clone();
        }
        if let Some(section) = self.section {
            habit.section = section;
        }
    }
}

/// Trims a habit name and rejects it when nothing is left.
pub fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("habit name must not be empty"));
    }
    Ok(name.to_string())
}

#[derive(Debug, Deserialize)]
pub struct NewHabitRequest {
    pub name: String,
    pub section: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateHabitRequest {
    pub name: Option<String>,
    pub section: Option<String>,
}

impl UpdateHabitRequest {
    pub fn into_patch(self) -> Result<HabitPatch, AppError> {
        let patch = HabitPatch {
            name: self.name.as_deref().map(validate_name).transpose()?,
            section: self.section.as_deref().map(str::parse::<Section>).transpose()?,
        };
        if patch.is_empty() {
            return Err(AppError::bad_request("nothing to update"));
        }
        Ok(patch)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleRequest {
    pub date: Option<String>,
}

impl ToggleRequest {
    /// An empty body toggles today; anything else must be a well-formed request.
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|err| AppError::bad_request(format!("invalid toggle request: {err}")))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub today: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHabit {
    pub id: String,
    pub name: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionView {
    pub section: Section,
    pub habits: Vec<DayHabit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayView {
    pub date: String,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitStats {
    pub id: String,
    pub name: String,
    pub section: Section,
    pub current_streak: u32,
    pub completion_rate: u8,
    pub total_completions: usize,
    pub streak_bar_width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_habits: usize,
    pub total_completions: usize,
    pub avg_completion_rate: u8,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub name: String,
    pub completion_rate: u8,
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub today: String,
    pub overall: OverallStats,
    pub habits: Vec<HabitStats>,
    pub completion_rate_chart: Vec<ChartPoint>,
}
