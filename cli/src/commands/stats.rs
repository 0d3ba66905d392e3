use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use plate_core::models::{DayDetail, MacroProgress, MealType, TargetBand};
use plate_core::service::PlateService;
use plate_core::stats::{NutritionStats, StatsRequest, StatsSession, StatsView};

use super::helpers::{no_neg_zero, parse_date, parse_month, print_meal_table, progress_bar};

fn print_progress(label: &str, unit: &str, p: &MacroProgress) {
    let value = no_neg_zero(p.value);
    let goal = p.goal;
    let pct = p.percent;
    let bar = progress_bar(pct);
    let over = if p.over_goal { "  over" } else { "" };
    println!("  {label:<8} [{bar}] {value:.0}/{goal:.0}{unit} ({pct}%){over}");
}

fn print_day_detail(detail: &DayDetail) {
    println!("  Goal progress:");
    print_progress("kcal", "", &detail.calories);
    print_progress("carbs", "g", &detail.carbs);
    print_progress("protein", "g", &detail.protein);
    print_progress("fat", "g", &detail.fat);
}

pub(crate) async fn cmd_day(
    svc: &PlateService,
    stats: &NutritionStats<'_>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let bucket = stats.daily(date).await?;
    let detail = stats.day_detail(date).await?;

    if json {
        let out = serde_json::json!({ "bucket": bucket, "detail": detail });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let Some(detail) = detail else {
        eprintln!("No entries for {date}");
        process::exit(2);
    };

    println!("=== {date} ===\n");
    print_meal_table(&svc.list_meals(date)?);

    let by_meal: Vec<String> = MealType::ALL
        .iter()
        .map(|m| {
            let cal = bucket.totals_by_meal_type.get(m).copied().unwrap_or(0.0);
            format!("{m}: {cal:.0}")
        })
        .collect();
    println!("  {}", by_meal.join(" | "));
    let t = &bucket.daily_total;
    let (cal, c, p, f) = (t.calories, t.carbs, t.protein, t.fat);
    println!("  TOTAL: {cal:.0} kcal | C:{c:.0}g P:{p:.0}g F:{f:.0}g\n");
    print_day_detail(&detail);

    Ok(())
}

pub(crate) async fn cmd_week(
    svc: &PlateService,
    stats: &NutritionStats<'_>,
    offset: u32,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct WeekRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Breakfast")]
        breakfast: String,
        #[tabled(rename = "Lunch")]
        lunch: String,
        #[tabled(rename = "Dinner")]
        dinner: String,
        #[tabled(rename = "Snack")]
        snack: String,
        #[tabled(rename = "Total")]
        total: String,
    }

    let mut session = StatsSession::new();
    let today = Local::now().date_naive();
    stats
        .refresh(&mut session, StatsRequest::Week { offset }, today)
        .await?;
    let Some(StatsView::Week(summary)) = session.view() else {
        anyhow::bail!("Weekly statistics unavailable");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    let goals = svc.get_goals()?;
    let (start, end) = (summary.range_start, summary.range_end);
    println!("=== {start} ~ {end} ===\n");

    let rows: Vec<WeekRow> = summary
        .days
        .iter()
        .map(|b| {
            let cal = |m: MealType| {
                let v = b.totals_by_meal_type.get(&m).copied().unwrap_or(0.0);
                format!("{:.0}", no_neg_zero(v))
            };
            WeekRow {
                date: b.date.format("%m-%d %a").to_string(),
                breakfast: cal(MealType::Breakfast),
                lunch: cal(MealType::Lunch),
                dinner: cal(MealType::Dinner),
                snack: cal(MealType::Snack),
                total: format!("{:.0}", no_neg_zero(b.daily_total.calories)),
            }
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let hit = summary.goal_attainment_day_count;
    let avg = summary.average_daily_calories;
    let goal = goals.calories;
    println!("  Goal met: {hit} / 7 days");
    println!("  Daily average: {avg:.0} / {goal:.0} kcal");
    let m = &summary.macro_percentages;
    println!(
        "  Weekly macros vs goal: carbs {}% | protein {}% | fat {}%",
        m.carbs, m.protein, m.fat
    );

    Ok(())
}

fn band_label(band: TargetBand) -> &'static str {
    match band {
        TargetBand::OnTarget => "on target",
        TargetBand::Over => "over",
        TargetBand::Under => "under",
    }
}

pub(crate) async fn cmd_month(
    stats: &NutritionStats<'_>,
    month: Option<&str>,
    day: Option<String>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct MonthRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "kcal")]
        calories: String,
        #[tabled(rename = "Goal %")]
        percent: String,
        #[tabled(rename = "Band")]
        band: &'static str,
    }

    let (year, month) = parse_month(month)?;
    let mut session = StatsSession::new();
    stats
        .refresh(
            &mut session,
            StatsRequest::Month { year, month },
            Local::now().date_naive(),
        )
        .await?;
    let Some(StatsView::Month(calendar)) = session.view() else {
        anyhow::bail!("Monthly statistics unavailable");
    };

    let selected = match day {
        Some(d) => {
            let date = parse_date(Some(d))?;
            let first = NaiveDate::from_ymd_opt(year, month, 1).context("Invalid month")?;
            if date.year() != first.year() || date.month() != first.month() {
                anyhow::bail!("{date} is not in {year}-{month:02}");
            }
            Some(stats.day_detail(date).await?)
        }
        None => None,
    };

    if json {
        let out = match &selected {
            Some(detail) => serde_json::json!({ "calendar": calendar, "detail": detail }),
            None => serde_json::json!({ "calendar": calendar }),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("=== {year}-{month:02} ===\n");
    let rows: Vec<MonthRow> = calendar
        .days
        .iter()
        .filter_map(|(date, day)| {
            let totals = day.totals.as_ref()?;
            Some(MonthRow {
                date: date.format("%m-%d %a").to_string(),
                calories: format!("{:.0}", no_neg_zero(totals.calories)),
                percent: format!("{}%", day.percent_of_goal),
                band: band_label(day.band),
            })
        })
        .collect();

    if rows.is_empty() {
        eprintln!("No entries for {year}-{month:02}");
    } else {
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    match selected {
        Some(Some(detail)) => {
            println!("\n  {}", detail.date);
            print_day_detail(&detail);
        }
        Some(None) => eprintln!("No entries on the selected day"),
        None => {}
    }

    Ok(())
}
