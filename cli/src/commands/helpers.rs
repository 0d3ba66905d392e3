use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use plate_core::models::{MealLogEntry, SearchOrigin, SearchResultItem};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse `YYYY-MM`, defaulting to the current month.
pub(crate) fn parse_month(month_str: Option<&str>) -> Result<(i32, u32)> {
    let Some(s) = month_str else {
        let today = Local::now().date_naive();
        return Ok((today.year(), today.month()));
    };
    let (year, month) = s
        .split_once('-')
        .with_context(|| format!("Invalid month '{s}'. Use YYYY-MM"))?;
    let year: i32 = year
        .parse()
        .with_context(|| format!("Invalid year in '{s}'"))?;
    let month: u32 = month
        .parse()
        .with_context(|| format!("Invalid month in '{s}'"))?;
    if !(1..=12).contains(&month) {
        bail!("Month must be between 1 and 12 (got {month})");
    }
    Ok((year, month))
}

pub(crate) fn prompt_choice(count: usize) -> Result<usize> {
    eprint!("\nSelect a food (1-{count}): ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let n: usize = line.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

fn origin_label(origin: SearchOrigin) -> &'static str {
    match origin {
        SearchOrigin::LocalFavorite => "favorite",
        SearchOrigin::LocalCustom => "custom",
        SearchOrigin::External => "mfds",
    }
}

pub(crate) fn print_search_table(items: &[SearchResultItem]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Maker")]
        maker: String,
        #[tabled(rename = "Serving")]
        serving: String,
        #[tabled(rename = "kcal")]
        calories: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "F")]
        fat: String,
        #[tabled(rename = "Source")]
        source: &'static str,
    }

    let rows: Vec<FoodRow> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let r = &item.record;
            FoodRow {
                idx: i + 1,
                name: truncate(&r.name, 35),
                maker: truncate(&r.source_label, 20),
                serving: r.serving_size.clone().unwrap_or_default(),
                calories: format!("{:.0}", r.calories),
                carbs: format!("{:.1}", r.carbs),
                protein: format!("{:.1}", r.protein),
                fat: format!("{:.1}", r.fat),
                source: origin_label(item.origin),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_meal_table(entries: &[MealLogEntry]) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Food")]
        name: String,
        #[tabled(rename = "kcal")]
        calories: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "F")]
        fat: String,
    }

    let rows: Vec<MealRow> = entries
        .iter()
        .map(|e| {
            let n = &e.nutrients;
            MealRow {
                id: e.id,
                meal: e.meal_type.to_string(),
                name: truncate(&n.name, 35),
                calories: format!("{:.0}", no_neg_zero(n.calories)),
                carbs: format!("{:.0}g", no_neg_zero(n.carbs)),
                protein: format!("{:.0}g", no_neg_zero(n.protein)),
                fat: format!("{:.0}g", no_neg_zero(n.fat)),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Ten-cell text bar for a percent value, capped at full.
pub(crate) fn progress_bar(percent: i64) -> String {
    let filled = usize::try_from(percent.clamp(0, 100) / 10).unwrap_or(0);
    format!("{}{}", "#".repeat(filled), ".".repeat(10 - filled))
}
