use anyhow::{Result, bail};

use plate_core::models::Goals;
use plate_core::service::PlateService;

pub(crate) fn cmd_goal_set(
    svc: &PlateService,
    calories: Option<f64>,
    carbs: Option<f64>,
    protein: Option<f64>,
    fat: Option<f64>,
    json: bool,
) -> Result<()> {
    if calories.is_none() && carbs.is_none() && protein.is_none() && fat.is_none() {
        bail!("Nothing to set. Pass at least one of --calories, --carbs, --protein, --fat");
    }

    // Unspecified fields keep their current value
    let current = svc.get_goals()?;
    let goals = svc.set_goals(&Goals {
        calories: calories.unwrap_or(current.calories),
        carbs: carbs.unwrap_or(current.carbs),
        protein: protein.unwrap_or(current.protein),
        fat: fat.unwrap_or(current.fat),
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else {
        print_goals(&goals);
    }

    Ok(())
}

pub(crate) fn cmd_goal_show(svc: &PlateService, json: bool) -> Result<()> {
    let goals = svc.get_goals()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else if goals == Goals::default() {
        println!("No goals set. Use `plate goal set --calories 2000`");
    } else {
        print_goals(&goals);
    }

    Ok(())
}

fn print_goals(goals: &Goals) {
    let Goals {
        calories,
        carbs,
        protein,
        fat,
    } = goals;
    println!("Daily goals: {calories:.0} kcal | C:{carbs:.0}g P:{protein:.0}g F:{fat:.0}g");
}
