use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Nutrient values for one food or one logged portion.
///
/// Missing macros are always `0.0`, never absent. Normalizers apply
/// [`coerce_number`] at the boundary so everything downstream can sum freely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NutrientRecord {
    pub name: String,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_size: Option<String>,
    #[serde(default)]
    pub source_label: String,
}

impl NutrientRecord {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Add another record's macros into this one. Name and labels are kept.
    pub fn accumulate(&mut self, other: &NutrientRecord) {
        self.calories += other.calories;
        self.carbs += other.carbs;
        self.protein += other.protein;
        self.fat += other.fat;
    }

    /// Case-insensitive substring match on name or maker. `needle` must
    /// already be lowercased.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.source_label.to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        validate_meal_type(s)
    }
}

pub fn validate_meal_type(meal: &str) -> Result<MealType> {
    let lower = meal.to_lowercase();
    MealType::ALL
        .into_iter()
        .find(|m| m.as_str() == lower)
        .with_context(|| {
            let names: Vec<&str> = MealType::ALL.iter().map(|m| m.as_str()).collect();
            format!(
                "Invalid meal type '{meal}'. Must be one of: {}",
                names.join(", ")
            )
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchOrigin {
    LocalFavorite,
    LocalCustom,
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    #[serde(flatten)]
    pub record: NutrientRecord,
    pub origin: SearchOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl SearchResultItem {
    #[must_use]
    pub fn local(record: NutrientRecord, origin: SearchOrigin) -> Self {
        Self {
            record,
            origin,
            external_id: None,
        }
    }

    #[must_use]
    pub fn external(record: NutrientRecord, external_id: Option<String>) -> Self {
        Self {
            record,
            origin: SearchOrigin::External,
            external_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealLogEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub nutrients: NutrientRecord,
}

#[derive(Debug, Clone)]
pub struct NewMealLog {
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub nutrients: NutrientRecord,
}

/// Daily targets from the user's profile. Unset values are `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Goals {
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
}

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub totals_by_meal_type: BTreeMap<MealType, f64>,
    pub daily_total: NutrientRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroPercentages {
    pub carbs: i64,
    pub protein: i64,
    pub fat: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub nutrient_totals: NutrientRecord,
    pub average_daily_calories: f64,
    pub goal_attainment_day_count: u32,
    pub macro_percentages: MacroPercentages,
    pub days: Vec<DailyBucket>,
}

/// Display band for a calendar day's percent-of-goal. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetBand {
    /// 80–120% inclusive.
    OnTarget,
    /// Above 120%.
    Over,
    /// Below 80%, or nothing logged.
    Under,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarDay {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<NutrientRecord>,
    pub percent_of_goal: i64,
    pub band: TargetBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCalendar {
    pub year: i32,
    pub month: u32,
    pub days: BTreeMap<NaiveDate, CalendarDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroProgress {
    pub value: f64,
    pub goal: f64,
    pub percent: i64,
    pub over_goal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayDetail {
    pub date: NaiveDate,
    pub totals: NutrientRecord,
    pub calories: MacroProgress,
    pub carbs: MacroProgress,
    pub protein: MacroProgress,
    pub fat: MacroProgress,
}

/// Coerce a loosely-typed JSON value into a non-negative number.
///
/// Numbers pass through; strings are parsed from their leading numeric part
/// (`"12.5g"` is `12.5`). Anything else, and any negative or non-finite
/// result, becomes `0.0`.
#[must_use]
pub fn coerce_number(value: Option<&serde_json::Value>) -> f64 {
    let n = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => parse_leading_number(s).unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 { n } else { 0.0 }
}

fn parse_leading_number(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', "");
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '0'..='9' => end = i + 1,
            '.' if !seen_dot => seen_dot = true,
            '-' | '+' if i == 0 => {}
            _ => break,
        }
    }
    s[..end].parse().ok()
}

/// Parse a required numeric text field from user input.
pub fn parse_required_amount(field: &str, input: &str) -> Result<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        bail!("{field} is required");
    }
    parse_amount(field, trimmed)
}

/// Parse an optional numeric text field; empty input is `0`.
pub fn parse_optional_amount(field: &str, input: Option<&str>) -> Result<f64> {
    match input.map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(s) => parse_amount(field, s),
    }
}

fn parse_amount(field: &str, s: &str) -> Result<f64> {
    let value: f64 = s
        .parse()
        .with_context(|| format!("{field} must be a number (got '{s}')"))?;
    if !value.is_finite() || value < 0.0 {
        bail!("{field} must not be negative");
    }
    Ok(value)
}

/// Build a record from manually entered text fields. Name and calories are
/// required; empty macros default to `0`.
pub fn manual_record(
    name: &str,
    calories: &str,
    carbs: Option<&str>,
    protein: Option<&str>,
    fat: Option<&str>,
) -> Result<NutrientRecord> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Food name is required");
    }
    Ok(NutrientRecord {
        name: name.to_string(),
        calories: parse_required_amount("calories", calories)?,
        carbs: parse_optional_amount("carbs", carbs)?,
        protein: parse_optional_amount("protein", protein)?,
        fat: parse_optional_amount("fat", fat)?,
        serving_size: None,
        source_label: String::new(),
    })
}

pub fn validate_goals(goals: &Goals) -> Result<()> {
    for (field, value) in [
        ("calories", goals.calories),
        ("carbs", goals.carbs),
        ("protein", goals.protein),
        ("fat", goals.fat),
    ] {
        if !value.is_finite() || value < 0.0 {
            bail!("Goal {field} must not be negative");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_matches_name_or_maker() {
        let record = NutrientRecord {
            source_label: "Ÿvonne's Bakery".to_string(),
            ..NutrientRecord::named("Crème brûlée")
        };
        assert!(record.matches(&"CRÈME".to_lowercase()));
        assert!(record.matches("ÿvonne"));
        assert!(!record.matches("tofu"));
    }

    #[test]
    fn test_valid_meal_types() {
        assert_eq!(validate_meal_type("breakfast").unwrap(), MealType::Breakfast);
        assert_eq!(validate_meal_type("lunch").unwrap(), MealType::Lunch);
        assert_eq!(validate_meal_type("dinner").unwrap(), MealType::Dinner);
        assert_eq!(validate_meal_type("snack").unwrap(), MealType::Snack);
    }

    #[test]
    fn test_meal_type_case_insensitive() {
        assert_eq!(validate_meal_type("Lunch").unwrap(), MealType::Lunch);
        assert_eq!("BREAKFAST".parse::<MealType>().unwrap(), MealType::Breakfast);
    }

    #[test]
    fn test_invalid_meal_type() {
        assert!(validate_meal_type("brunch").is_err());
        assert!(validate_meal_type("").is_err());
    }

    #[test]
    fn test_coerce_number_shapes() {
        assert_eq!(coerce_number(Some(&json!(12.5))), 12.5);
        assert_eq!(coerce_number(Some(&json!("230"))), 230.0);
        assert_eq!(coerce_number(Some(&json!(" 7.25 "))), 7.25);
        assert_eq!(coerce_number(Some(&json!("12.5g"))), 12.5);
        assert_eq!(coerce_number(Some(&json!("1,250"))), 1250.0);
    }

    #[test]
    fn test_coerce_number_defaults_to_zero() {
        assert_eq!(coerce_number(None), 0.0);
        assert_eq!(coerce_number(Some(&json!(null))), 0.0);
        assert_eq!(coerce_number(Some(&json!(""))), 0.0);
        assert_eq!(coerce_number(Some(&json!("N/A"))), 0.0);
        assert_eq!(coerce_number(Some(&json!(-3))), 0.0);
        assert_eq!(coerce_number(Some(&json!({"nested": 1}))), 0.0);
    }

    #[test]
    fn test_manual_record_requires_name_and_calories() {
        assert!(manual_record("", "100", None, None, None).is_err());
        assert!(manual_record("Rice", "", None, None, None).is_err());
        assert!(manual_record("Rice", "abc", None, None, None).is_err());
    }

    #[test]
    fn test_manual_record_defaults_macros() {
        let r = manual_record(" Rice ", "300", Some(""), Some("6"), None).unwrap();
        assert_eq!(r.name, "Rice");
        assert_eq!(r.calories, 300.0);
        assert_eq!(r.carbs, 0.0);
        assert_eq!(r.protein, 6.0);
        assert_eq!(r.fat, 0.0);
    }

    #[test]
    fn test_manual_record_rejects_negative_and_text_macros() {
        assert!(manual_record("Rice", "-10", None, None, None).is_err());
        assert!(manual_record("Rice", "100", Some("lots"), None, None).is_err());
    }

    #[test]
    fn test_validate_goals() {
        assert!(validate_goals(&Goals::default()).is_ok());
        let bad = Goals {
            calories: 2000.0,
            carbs: -1.0,
            protein: 0.0,
            fat: 0.0,
        };
        assert!(validate_goals(&bad).is_err());
    }

    #[test]
    fn test_date_range_days() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 2, 27).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        );
        let days: Vec<NaiveDate> = range.days().collect();
        assert_eq!(days.len(), 4);
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()));
    }

    #[test]
    fn test_search_item_serializes_flat() {
        let item = SearchResultItem::external(NutrientRecord::named("Kimchi"), Some("D1".into()));
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["name"], "Kimchi");
        assert_eq!(v["origin"], "external");
        assert_eq!(v["external_id"], "D1");
    }
}
