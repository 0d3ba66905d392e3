//! Daily, weekly and monthly nutrition aggregates.
//!
//! The fold functions are pure: the same entries and goals always give the
//! same result. [`StatsSession`] tracks the `idle -> loading -> ready` cycle of
//! a statistics view and drops responses for requests that were superseded.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use chrono::{Days, Months, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{
    CalendarDay, DailyBucket, DateRange, DayDetail, Goals, MacroPercentages, MacroProgress,
    MealLogEntry, MealType, MonthCalendar, NutrientRecord, PeriodSummary, TargetBand,
};
use crate::service::{GoalProvider, MealStore};

pub const WEEK_DAYS: i64 = 7;
/// A day counts towards the weekly goal up to 10% over the calorie goal.
pub const ATTAINMENT_TOLERANCE: f64 = 1.1;
pub const ON_TARGET_MIN_PERCENT: i64 = 80;
pub const ON_TARGET_MAX_PERCENT: i64 = 120;

/// `round(value / goal * 100)`, or `0` when no goal is set.
#[must_use]
pub fn percent(value: f64, goal: f64) -> i64 {
    if goal > 0.0 {
        (value / goal * 100.0).round() as i64
    } else {
        0
    }
}

#[must_use]
pub fn classify(percent: i64) -> TargetBand {
    if percent > ON_TARGET_MAX_PERCENT {
        TargetBand::Over
    } else if percent >= ON_TARGET_MIN_PERCENT {
        TargetBand::OnTarget
    } else {
        TargetBand::Under
    }
}

/// Seven days ending `offset` weeks before `today`.
pub fn week_range(today: NaiveDate, offset: u32) -> Result<DateRange> {
    let week = WEEK_DAYS.unsigned_abs();
    let end = today.checked_sub_days(Days::new(week * u64::from(offset)));
    let start = end.and_then(|d| d.checked_sub_days(Days::new(week - 1)));
    match (start, end) {
        (Some(start), Some(end)) => Ok(DateRange::new(start, end)),
        _ => anyhow::bail!("Week offset out of range: {offset}"),
    }
}

pub fn month_range(year: i32, month: u32) -> Result<DateRange> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .with_context(|| format!("Invalid month: {year}-{month:02}"))?;
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .with_context(|| format!("Month out of range: {year}-{month:02}"))?;
    Ok(DateRange::new(start, end))
}

fn totals<'a>(entries: impl IntoIterator<Item = &'a MealLogEntry>) -> NutrientRecord {
    let mut total = NutrientRecord::default();
    for entry in entries {
        total.accumulate(&entry.nutrients);
    }
    total
}

/// Totals for one date, with a calorie figure for every meal type.
#[must_use]
pub fn daily_bucket(entries: &[MealLogEntry], date: NaiveDate) -> DailyBucket {
    let mut totals_by_meal_type: BTreeMap<MealType, f64> =
        MealType::ALL.into_iter().map(|m| (m, 0.0)).collect();
    let mut daily_total = NutrientRecord::default();
    for entry in entries.iter().filter(|e| e.date == date) {
        *totals_by_meal_type.entry(entry.meal_type).or_default() += entry.nutrients.calories;
        daily_total.accumulate(&entry.nutrients);
    }
    DailyBucket {
        date,
        totals_by_meal_type,
        daily_total,
    }
}

pub fn weekly_summary(
    entries: &[MealLogEntry],
    goals: &Goals,
    today: NaiveDate,
    offset: u32,
) -> Result<PeriodSummary> {
    let range = week_range(today, offset)?;
    let in_range: Vec<&MealLogEntry> = entries.iter().filter(|e| range.contains(e.date)).collect();

    let nutrient_totals = totals(in_range.iter().copied());
    let logged_days: HashSet<NaiveDate> = in_range.iter().map(|e| e.date).collect();
    #[allow(clippy::cast_precision_loss)]
    let logged = logged_days.len().max(1) as f64;
    let average_daily_calories = (nutrient_totals.calories / logged).round();

    let days: Vec<DailyBucket> = range.days().map(|d| daily_bucket(entries, d)).collect();

    let goal_attainment_day_count = if goals.calories > 0.0 {
        let ceiling = goals.calories * ATTAINMENT_TOLERANCE;
        days.iter()
            .filter(|b| b.daily_total.calories > 0.0 && b.daily_total.calories <= ceiling)
            .count() as u32
    } else {
        0
    };

    #[allow(clippy::cast_precision_loss)]
    let week = WEEK_DAYS as f64;
    let macro_percentages = MacroPercentages {
        carbs: percent(nutrient_totals.carbs, goals.carbs * week),
        protein: percent(nutrient_totals.protein, goals.protein * week),
        fat: percent(nutrient_totals.fat, goals.fat * week),
    };

    Ok(PeriodSummary {
        range_start: range.start,
        range_end: range.end,
        nutrient_totals,
        average_daily_calories,
        goal_attainment_day_count,
        macro_percentages,
        days,
    })
}

pub fn month_calendar(
    entries: &[MealLogEntry],
    goals: &Goals,
    year: i32,
    month: u32,
) -> Result<MonthCalendar> {
    let range = month_range(year, month)?;
    let mut by_date: BTreeMap<NaiveDate, NutrientRecord> = BTreeMap::new();
    for entry in entries.iter().filter(|e| range.contains(e.date)) {
        by_date
            .entry(entry.date)
            .or_default()
            .accumulate(&entry.nutrients);
    }

    let days = range
        .days()
        .map(|date| {
            let totals = by_date.remove(&date);
            let percent_of_goal = totals
                .as_ref()
                .map_or(0, |t| percent(t.calories, goals.calories));
            let day = CalendarDay {
                totals,
                percent_of_goal,
                band: classify(percent_of_goal),
            };
            (date, day)
        })
        .collect();

    Ok(MonthCalendar { year, month, days })
}

fn progress(value: f64, goal: f64) -> MacroProgress {
    let percent = percent(value, goal);
    MacroProgress {
        value,
        goal,
        percent,
        over_goal: percent > 100,
    }
}

/// Detail for a selected day. `None` when nothing was logged on it.
#[must_use]
pub fn day_detail(entries: &[MealLogEntry], date: NaiveDate, goals: &Goals) -> Option<DayDetail> {
    let mut day = entries.iter().filter(|e| e.date == date).peekable();
    day.peek()?;
    let totals = totals(day);
    Some(DayDetail {
        date,
        calories: progress(totals.calories, goals.calories),
        carbs: progress(totals.carbs, goals.carbs),
        protein: progress(totals.protein, goals.protein),
        fat: progress(totals.fat, goals.fat),
        totals,
    })
}

// --- Session state machine ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsRequest {
    Week { offset: u32 },
    Month { year: i32, month: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum StatsView {
    Week(PeriodSummary),
    Month(MonthCalendar),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsTicket {
    generation: u64,
    request: StatsRequest,
    today: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The ticket was superseded before its response arrived.
    Discarded,
}

#[derive(Debug, Default)]
pub struct StatsSession {
    phase: Phase,
    generation: u64,
    view: Option<StatsView>,
    last_error: Option<String>,
}

impl StatsSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn view(&self) -> Option<&StatsView> {
        self.view.as_ref()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Enter `loading` for `request`. Any earlier ticket becomes stale.
    pub fn begin(&mut self, request: StatsRequest, today: NaiveDate) -> StatsTicket {
        self.generation += 1;
        self.phase = Phase::Loading;
        StatsTicket {
            generation: self.generation,
            request,
            today,
        }
    }

    /// Settle a fetch. On failure the previous view is kept and the error is
    /// returned to the caller.
    pub fn complete(
        &mut self,
        ticket: &StatsTicket,
        result: Result<StatsView>,
    ) -> Result<Completion> {
        if ticket.generation != self.generation {
            debug!(request = ?ticket.request, "discarding stale statistics response");
            return Ok(Completion::Discarded);
        }
        self.phase = Phase::Ready;
        match result {
            Ok(view) => {
                self.view = Some(view);
                self.last_error = None;
                Ok(Completion::Applied)
            }
            Err(e) => {
                self.last_error = Some(format!("{e:#}"));
                Err(e)
            }
        }
    }
}

/// Loads meal logs and goals for a [`StatsSession`].
pub struct NutritionStats<'a> {
    store: &'a dyn MealStore,
    goals: &'a dyn GoalProvider,
    user_id: &'a str,
}

impl<'a> NutritionStats<'a> {
    #[must_use]
    pub fn new(store: &'a dyn MealStore, goals: &'a dyn GoalProvider, user_id: &'a str) -> Self {
        Self {
            store,
            goals,
            user_id,
        }
    }

    async fn load_goals(&self) -> Goals {
        self.goals.get_goals(self.user_id).await.unwrap_or_else(|e| {
            warn!(error = %e, "goal lookup failed, using zero goals");
            Goals::default()
        })
    }

    /// Fetch and fold the data a ticket asks for.
    pub async fn fetch(&self, ticket: &StatsTicket) -> Result<StatsView> {
        let range = match ticket.request {
            StatsRequest::Week { offset } => week_range(ticket.today, offset)?,
            StatsRequest::Month { year, month } => month_range(year, month)?,
        };
        let (entries, goals) = futures::join!(
            self.store.list_meal_logs(self.user_id, range),
            self.load_goals()
        );
        let entries = entries.context("Failed to load meal logs")?;

        Ok(match ticket.request {
            StatsRequest::Week { offset } => {
                StatsView::Week(weekly_summary(&entries, &goals, ticket.today, offset)?)
            }
            StatsRequest::Month { year, month } => {
                StatsView::Month(month_calendar(&entries, &goals, year, month)?)
            }
        })
    }

    /// Begin, fetch and complete in one step.
    pub async fn refresh(
        &self,
        session: &mut StatsSession,
        request: StatsRequest,
        today: NaiveDate,
    ) -> Result<Completion> {
        let ticket = session.begin(request, today);
        let result = self.fetch(&ticket).await;
        session.complete(&ticket, result)
    }

    pub async fn daily(&self, date: NaiveDate) -> Result<DailyBucket> {
        let entries = self
            .store
            .list_meal_logs(self.user_id, DateRange::single(date))
            .await
            .context("Failed to load meal logs")?;
        Ok(daily_bucket(&entries, date))
    }

    pub async fn day_detail(&self, date: NaiveDate) -> Result<Option<DayDetail>> {
        let (entries, goals) = futures::join!(
            self.store.list_meal_logs(self.user_id, DateRange::single(date)),
            self.load_goals()
        );
        let entries = entries.context("Failed to load meal logs")?;
        Ok(day_detail(&entries, date, &goals))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use anyhow::bail;
    use async_trait::async_trait;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(date: NaiveDate, meal_type: MealType, calories: f64) -> MealLogEntry {
        MealLogEntry {
            id: 0,
            date,
            meal_type,
            nutrients: NutrientRecord {
                calories,
                carbs: calories / 10.0,
                protein: calories / 20.0,
                fat: calories / 40.0,
                ..NutrientRecord::named("food")
            },
        }
    }

    fn goals(calories: f64) -> Goals {
        Goals {
            calories,
            carbs: 250.0,
            protein: 100.0,
            fat: 50.0,
        }
    }

    #[test]
    fn test_daily_bucket_by_meal_type() {
        let d = date(2024, 6, 15);
        let entries = vec![
            entry(d, MealType::Breakfast, 300.0),
            entry(d, MealType::Lunch, 400.0),
            entry(d, MealType::Dinner, 250.0),
            entry(date(2024, 6, 14), MealType::Dinner, 999.0),
        ];
        let bucket = daily_bucket(&entries, d);
        assert_eq!(bucket.daily_total.calories, 950.0);
        assert_eq!(bucket.totals_by_meal_type[&MealType::Breakfast], 300.0);
        assert_eq!(bucket.totals_by_meal_type[&MealType::Lunch], 400.0);
        assert_eq!(bucket.totals_by_meal_type[&MealType::Snack], 0.0);
    }

    #[test]
    fn test_week_range_offsets() {
        let today = date(2024, 6, 15);
        let current = week_range(today, 0).unwrap();
        assert_eq!(current.start, date(2024, 6, 9));
        assert_eq!(current.end, today);
        let previous = week_range(today, 1).unwrap();
        assert_eq!(previous.start, date(2024, 6, 2));
        assert_eq!(previous.end, date(2024, 6, 8));
    }

    #[test]
    fn test_week_offset_out_of_range() {
        let today = date(2024, 6, 15);
        assert!(week_range(today, u32::MAX).is_err());
        assert!(weekly_summary(&[], &goals(2000.0), today, 20_000_000).is_err());
    }

    #[test]
    fn test_weekly_goal_attainment() {
        let today = date(2024, 6, 15);
        let calories = [0.0, 1000.0, 2200.0, 2000.0, 2100.0, 0.0, 1900.0];
        let entries: Vec<MealLogEntry> = week_range(today, 0)
            .unwrap()
            .days()
            .zip(calories)
            .filter(|(_, c)| *c > 0.0)
            .map(|(d, c)| entry(d, MealType::Lunch, c))
            .collect();

        let summary = weekly_summary(&entries, &goals(2000.0), today, 0).unwrap();
        // 1000, 2200, 2000, 2100 and 1900 all fall in (0, 2200]
        assert_eq!(summary.goal_attainment_day_count, 5);

        let strict = weekly_summary(&entries, &goals(1800.0), today, 0).unwrap();
        // ceiling 1980: 1000 and 1900
        assert_eq!(strict.goal_attainment_day_count, 2);

        let no_goal = weekly_summary(&entries, &goals(0.0), today, 0).unwrap();
        assert_eq!(no_goal.goal_attainment_day_count, 0);
    }

    #[test]
    fn test_weekly_average_uses_logged_days() {
        let today = date(2024, 6, 15);
        let entries = vec![
            entry(today, MealType::Breakfast, 500.0),
            entry(today, MealType::Dinner, 700.0),
            entry(date(2024, 6, 12), MealType::Lunch, 1001.0),
            entry(date(2024, 6, 1), MealType::Lunch, 5000.0),
        ];
        let summary = weekly_summary(&entries, &goals(2000.0), today, 0).unwrap();
        assert_eq!(summary.nutrient_totals.calories, 2201.0);
        // 2201 / 2 = 1100.5
        assert_eq!(summary.average_daily_calories, 1101.0);
        assert_eq!(summary.days.len(), 7);
        assert_eq!(summary.range_start, date(2024, 6, 9));
    }

    #[test]
    fn test_weekly_empty_window() {
        let summary = weekly_summary(&[], &goals(2000.0), date(2024, 6, 15), 3).unwrap();
        assert_eq!(summary.average_daily_calories, 0.0);
        assert_eq!(summary.macro_percentages.carbs, 0);
        assert_eq!(summary.days.len(), 7);
    }

    #[test]
    fn test_weekly_macro_percentages() {
        let today = date(2024, 6, 15);
        let entries = vec![MealLogEntry {
            nutrients: NutrientRecord {
                carbs: 875.0,
                protein: 700.0,
                fat: 0.0,
                ..NutrientRecord::named("week")
            },
            ..entry(today, MealType::Lunch, 0.0)
        }];
        let g = Goals {
            calories: 2000.0,
            carbs: 250.0,
            protein: 100.0,
            fat: 0.0,
        };
        let summary = weekly_summary(&entries, &g, today, 0).unwrap();
        assert_eq!(summary.macro_percentages.carbs, 50);
        assert_eq!(summary.macro_percentages.protein, 100);
        assert_eq!(summary.macro_percentages.fat, 0);
    }

    #[test]
    fn test_percent_and_bands() {
        assert_eq!(percent(1600.0, 2000.0), 80);
        assert_eq!(classify(80), TargetBand::OnTarget);
        assert_eq!(classify(79), TargetBand::Under);
        assert_eq!(classify(120), TargetBand::OnTarget);
        assert_eq!(classify(121), TargetBand::Over);
        assert_eq!(percent(500.0, 0.0), 0);
    }

    #[test]
    fn test_month_calendar() {
        let entries = vec![
            entry(date(2024, 2, 10), MealType::Lunch, 1000.0),
            entry(date(2024, 2, 10), MealType::Dinner, 600.0),
            entry(date(2024, 2, 29), MealType::Snack, 2500.0),
            entry(date(2024, 3, 1), MealType::Snack, 2000.0),
        ];
        let cal = month_calendar(&entries, &goals(2000.0), 2024, 2).unwrap();
        assert_eq!(cal.days.len(), 29);

        let tenth = &cal.days[&date(2024, 2, 10)];
        assert_eq!(tenth.totals.as_ref().unwrap().calories, 1600.0);
        assert_eq!(tenth.percent_of_goal, 80);
        assert_eq!(tenth.band, TargetBand::OnTarget);

        assert_eq!(cal.days[&date(2024, 2, 29)].band, TargetBand::Over);

        let empty = &cal.days[&date(2024, 2, 1)];
        assert!(empty.totals.is_none());
        assert_eq!(empty.band, TargetBand::Under);
    }

    #[test]
    fn test_month_calendar_is_idempotent() {
        let entries = vec![entry(date(2024, 12, 31), MealType::Lunch, 1800.0)];
        let first = month_calendar(&entries, &goals(2000.0), 2024, 12).unwrap();
        let second = month_calendar(&entries, &goals(2000.0), 2024, 12).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.days.len(), 31);
    }

    #[test]
    fn test_month_calendar_rejects_bad_month() {
        assert!(month_calendar(&[], &Goals::default(), 2024, 13).is_err());
        assert!(month_calendar(&[], &Goals::default(), 2024, 0).is_err());
    }

    #[test]
    fn test_day_detail() {
        let d = date(2024, 6, 15);
        let entries = vec![
            entry(d, MealType::Lunch, 2000.0),
            entry(d, MealType::Dinner, 1000.0),
        ];
        let detail = day_detail(&entries, d, &goals(2000.0)).unwrap();
        assert_eq!(detail.totals.calories, 3000.0);
        assert_eq!(detail.calories.percent, 150);
        assert!(detail.calories.over_goal);
        // 300g of 250g carbs
        assert_eq!(detail.carbs.percent, 120);
        assert!(detail.carbs.over_goal);
        // 150g of 100g protein
        assert!(detail.protein.over_goal);
        // 75g of 50g fat
        assert_eq!(detail.fat.percent, 150);

        assert!(day_detail(&entries, date(2024, 6, 16), &goals(2000.0)).is_none());
    }

    #[test]
    fn test_day_detail_at_goal_is_not_over() {
        let d = date(2024, 6, 15);
        let entries = vec![entry(d, MealType::Lunch, 2000.0)];
        let detail = day_detail(&entries, d, &goals(2000.0)).unwrap();
        assert_eq!(detail.calories.percent, 100);
        assert!(!detail.calories.over_goal);
    }

    struct MockStore {
        entries: Vec<MealLogEntry>,
        fail: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl MealStore for MockStore {
        async fn list_meal_logs(
            &self,
            _user_id: &str,
            range: DateRange,
        ) -> Result<Vec<MealLogEntry>> {
            if self.fail.get() {
                bail!("persistence unreachable");
            }
            Ok(self
                .entries
                .iter()
                .filter(|e| range.contains(e.date))
                .cloned()
                .collect())
        }

        async fn list_custom_foods(
            &self,
            _user_id: &str,
            _query: &str,
        ) -> Result<Vec<NutrientRecord>> {
            Ok(Vec::new())
        }

        async fn list_favorites(&self, _user_id: &str) -> Result<Vec<NutrientRecord>> {
            Ok(Vec::new())
        }
    }

    struct MockGoals(Option<Goals>);

    #[async_trait(?Send)]
    impl GoalProvider for MockGoals {
        async fn get_goals(&self, _user_id: &str) -> Result<Goals> {
            match self.0 {
                Some(g) => Ok(g),
                None => bail!("profile missing"),
            }
        }
    }

    fn store() -> MockStore {
        let today = date(2024, 6, 15);
        MockStore {
            entries: vec![
                entry(today, MealType::Lunch, 1600.0),
                entry(date(2024, 6, 5), MealType::Lunch, 2000.0),
            ],
            fail: Cell::new(false),
        }
    }

    #[tokio::test]
    async fn test_session_idle_loading_ready() {
        let store = store();
        let goals = MockGoals(Some(goals(2000.0)));
        let stats = NutritionStats::new(&store, &goals, "u1");
        let mut session = StatsSession::new();
        assert_eq!(session.phase(), Phase::Idle);

        let ticket = session.begin(StatsRequest::Week { offset: 0 }, date(2024, 6, 15));
        assert_eq!(session.phase(), Phase::Loading);
        let result = stats.fetch(&ticket).await;
        assert_eq!(session.complete(&ticket, result).unwrap(), Completion::Applied);
        assert_eq!(session.phase(), Phase::Ready);

        let Some(StatsView::Week(week)) = session.view() else {
            panic!("expected a weekly view");
        };
        assert_eq!(week.nutrient_totals.calories, 1600.0);
        assert_eq!(week.goal_attainment_day_count, 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_data() {
        let store = store();
        let goals = MockGoals(Some(goals(2000.0)));
        let stats = NutritionStats::new(&store, &goals, "u1");
        let mut session = StatsSession::new();
        let today = date(2024, 6, 15);

        stats
            .refresh(&mut session, StatsRequest::Month { year: 2024, month: 6 }, today)
            .await
            .unwrap();
        let before = session.view().cloned();
        assert!(before.is_some());

        store.fail.set(true);
        let err = stats
            .refresh(&mut session, StatsRequest::Week { offset: 1 }, today)
            .await;
        assert!(err.is_err());
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.view().cloned(), before);
        assert!(session.last_error().unwrap().contains("meal logs"));
    }

    #[tokio::test]
    async fn test_bad_week_offset_keeps_previous_view() {
        let store = store();
        let goals = MockGoals(Some(goals(2000.0)));
        let stats = NutritionStats::new(&store, &goals, "u1");
        let mut session = StatsSession::new();
        let today = date(2024, 6, 15);

        stats
            .refresh(&mut session, StatsRequest::Week { offset: 0 }, today)
            .await
            .unwrap();
        let before = session.view().cloned();

        let err = stats
            .refresh(&mut session, StatsRequest::Week { offset: u32::MAX }, today)
            .await;
        assert!(err.is_err());
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.view().cloned(), before);
        assert!(session.last_error().unwrap().contains("out of range"));
    }

    #[tokio::test]
    async fn test_superseded_request_is_discarded() {
        let store = store();
        let goals = MockGoals(Some(goals(2000.0)));
        let stats = NutritionStats::new(&store, &goals, "u1");
        let mut session = StatsSession::new();
        let today = date(2024, 6, 15);

        let old = session.begin(StatsRequest::Week { offset: 0 }, today);
        let new = session.begin(StatsRequest::Week { offset: 1 }, today);
        let old_result = stats.fetch(&old).await;
        let new_result = stats.fetch(&new).await;

        assert_eq!(
            session.complete(&old, old_result).unwrap(),
            Completion::Discarded
        );
        assert_eq!(session.phase(), Phase::Loading);
        assert!(session.view().is_none());

        assert_eq!(
            session.complete(&new, new_result).unwrap(),
            Completion::Applied
        );
        let Some(StatsView::Week(week)) = session.view() else {
            panic!("expected a weekly view");
        };
        assert_eq!(week.range_end, date(2024, 6, 8));
        assert_eq!(week.nutrient_totals.calories, 2000.0);
    }

    #[tokio::test]
    async fn test_stale_failure_is_discarded_silently() {
        let store = store();
        let goals = MockGoals(Some(goals(2000.0)));
        let stats = NutritionStats::new(&store, &goals, "u1");
        let mut session = StatsSession::new();
        let today = date(2024, 6, 15);

        let old = session.begin(StatsRequest::Month { year: 2024, month: 13 }, today);
        let old_result = stats.fetch(&old).await;
        assert!(old_result.is_err());
        let _new = session.begin(StatsRequest::Month { year: 2024, month: 6 }, today);
        assert_eq!(
            session.complete(&old, old_result).unwrap(),
            Completion::Discarded
        );
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_missing_goals_degrade_to_zero() {
        let store = store();
        let goals = MockGoals(None);
        let stats = NutritionStats::new(&store, &goals, "u1");

        let detail = stats.day_detail(date(2024, 6, 15)).await.unwrap().unwrap();
        assert_eq!(detail.calories.goal, 0.0);
        assert_eq!(detail.calories.percent, 0);
        assert!(!detail.calories.over_goal);

        let bucket = stats.daily(date(2024, 6, 15)).await.unwrap();
        assert_eq!(bucket.daily_total.calories, 1600.0);
    }
}
