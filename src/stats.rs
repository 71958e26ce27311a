use crate::dates::{date_key, today};
use crate::models::{ChartPoint, Habit, HabitStats, OverallStats, StatsResponse};
use chrono::{Duration, NaiveDate};

/// Length of the rolling completion-rate window, today included.
pub const RATE_WINDOW_DAYS: u32 = 30;
/// Chart labels longer than this are cut and suffixed with `...`.
pub const CHART_NAME_LIMIT: usize = 15;

const STREAK_BAR_STEP: u32 = 10;
const STREAK_BAR_MAX: u32 = 200;

pub fn build_stats(habits: &[Habit]) -> StatsResponse {
    build_stats_at(today(), habits)
}

pub fn build_stats_at(today: NaiveDate, habits: &[Habit]) -> StatsResponse {
    let habit_stats: Vec<HabitStats> = habits
        .iter()
        .map(|habit| habit_stats_at(today, habit))
        .collect();

    StatsResponse {
        today: date_key(today),
        overall: overall_stats(&habit_stats),
        completion_rate_chart: completion_rate_chart(&habit_stats),
        habits: habit_stats,
    }
}

pub fn habit_stats_at(today: NaiveDate, habit: &Habit) -> HabitStats {
    let current_streak = current_streak(today, habit);
    HabitStats {
        id: habit.id.clone(),
        name: habit.name.clone(),
        section: habit.section,
        current_streak,
        completion_rate: completion_rate(today, habit),
        total_completions: habit.completed_dates.len(),
        streak_bar_width: current_streak
            .saturating_mul(STREAK_BAR_STEP)
            .min(STREAK_BAR_MAX),
    }
}

/// Consecutive completed days ending at `today`. Zero when today is not completed.
pub fn current_streak(today: NaiveDate, habit: &Habit) -> u32 {
    let mut streak = 0u32;
    let mut date = Some(today);
    while let Some(day) = date {
        if !habit.is_completed_on(&date_key(day)) {
            break;
        }
        streak = streak.saturating_add(1);
        date = day.pred_opt();
    }
    streak
}

/// Share of the last 30 days (today included) the habit was completed, as a rounded percentage.
pub fn completion_rate(today: NaiveDate, habit: &Habit) -> u8 {
    let completed = (0..RATE_WINDOW_DAYS)
        .map(|offset| today - Duration::days(i64::from(offset)))
        .filter(|date| habit.is_completed_on(&date_key(*date)))
        .count() as u32;

    round_half_up(completed * 100, RATE_WINDOW_DAYS) as u8
}

pub fn overall_stats(habit_stats: &[HabitStats]) -> OverallStats {
    let total_habits = habit_stats.len();
    let total_completions: usize = habit_stats.iter().map(|stat| stat.total_completions).sum();
    let rate_sum: u32 = habit_stats
        .iter()
        .map(|stat| u32::from(stat.completion_rate))
        .sum();
    let avg_completion_rate = if total_habits == 0 {
        0
    } else {
        round_half_up(rate_sum, total_habits as u32) as u8
    };
    let longest_streak = habit_stats
        .iter()
        .map(|stat| stat.current_streak)
        .max()
        .unwrap_or(0);

    OverallStats {
        total_habits,
        total_completions,
        avg_completion_rate,
        longest_streak,
    }
}

pub fn completion_rate_chart(habit_stats: &[HabitStats]) -> Vec<ChartPoint> {
    habit_stats
        .iter()
        .enumerate()
        .map(|(index, stat)| ChartPoint {
            name: chart_label(&stat.name),
            completion_rate: stat.completion_rate,
            fill: bar_fill(index),
        })
        .collect()
}

pub fn chart_label(name: &str) -> String {
    if name.chars().count() > CHART_NAME_LIMIT {
        let head: String = name.chars().take(CHART_NAME_LIMIT).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

fn bar_fill(index: usize) -> String {
    format!("hsl({}, 70%, 80%)", (index * 30) % 360)
}

fn round_half_up(numerator: u32, denominator: u32) -> u32 {
    (2 * numerator + denominator) / (2 * denominator)
}
