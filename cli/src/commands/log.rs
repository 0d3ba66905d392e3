use anyhow::Result;
use std::process;

use plate_core::models::{MealLogEntry, validate_meal_type};
use plate_core::search::FoodSearch;
use plate_core::service::{ManualFood, PlateService};
use plate_core::serving::ServingMultiplier;

use super::helpers::{json_error, parse_date};
use super::resolve_food;

fn print_logged(entry: &MealLogEntry, multiplier: Option<ServingMultiplier>) {
    let n = &entry.nutrients;
    let name = &n.name;
    let meal_type = entry.meal_type;
    let portion = multiplier
        .filter(|m| (m.value() - 1.0).abs() > f64::EPSILON)
        .map(|m| format!(" x{}", m.value()))
        .unwrap_or_default();
    let (cal, c, p, f) = (n.calories, n.carbs, n.protein, n.fat);
    println!(
        "Logged [{}]: {name}{portion} for {meal_type}: {cal:.0} kcal | C:{c:.0}g P:{p:.0}g F:{f:.0}g",
        entry.id
    );
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_log(
    svc: &PlateService,
    search: &FoodSearch<'_>,
    food_query: &str,
    meal: &str,
    serving: &str,
    pick: Option<usize>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let meal_type = validate_meal_type(meal)?;
    let multiplier = ServingMultiplier::parse(serving)?;
    let date = parse_date(date)?;

    let item = match resolve_food(search, food_query, pick).await {
        Ok(item) => item,
        Err(e) => {
            if json {
                println!("{}", json_error(&format!("{e:#}")));
            } else {
                eprintln!("{e:#}");
            }
            process::exit(2);
        }
    };

    let entry = svc.log_food(date, meal_type, &item.record, multiplier)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_logged(&entry, Some(multiplier));
    }

    Ok(())
}

pub(crate) fn cmd_add(
    svc: &PlateService,
    food: ManualFood<'_>,
    meal: &str,
    date: Option<String>,
    save: bool,
    json: bool,
) -> Result<()> {
    let meal_type = validate_meal_type(meal)?;
    let date = parse_date(date)?;

    let entry = svc.log_manual(date, meal_type, food)?;
    if save {
        svc.save_custom_food(food)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_logged(&entry, None);
        if save {
            println!("Saved '{}' to your custom foods", entry.nutrients.name);
        }
    }

    Ok(())
}

pub(crate) fn cmd_delete(svc: &PlateService, entry_id: i64, json: bool) -> Result<()> {
    let deleted = svc.delete_meal(entry_id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "deleted": deleted, "id": entry_id })
        );
    } else if deleted {
        println!("Deleted entry {entry_id}");
    } else {
        eprintln!("Entry {entry_id} not found");
        process::exit(2);
    }

    Ok(())
}
