mod goal;
mod helpers;
mod log;
mod search;
mod stats;

use anyhow::{Result, bail};

use plate_core::models::SearchResultItem;
use plate_core::search::{FoodSearch, SearchSession};

use helpers::{print_search_table, prompt_choice};

pub(crate) use goal::{cmd_goal_set, cmd_goal_show};
pub(crate) use log::{cmd_add, cmd_delete, cmd_log};
pub(crate) use search::{
    cmd_favorite_add, cmd_favorite_list, cmd_favorite_remove, cmd_food_add, cmd_food_list,
    cmd_search,
};
pub(crate) use stats::{cmd_day, cmd_month, cmd_week};

/// Print the search notice, if any, on stderr.
pub(super) fn report_notice(session: &SearchSession) {
    if let Some(notice) = session.notice() {
        eprintln!("Note: external results unavailable ({notice})");
    }
}

/// Search and pick one result: `pick` is 1-based, otherwise prompt when
/// more than one candidate is found.
pub(super) async fn resolve_food(
    search: &FoodSearch<'_>,
    query: &str,
    pick: Option<usize>,
) -> Result<SearchResultItem> {
    let mut session = SearchSession::new();
    let mut all = search.search(&mut session, query).await;
    report_notice(&session);

    if all.is_empty() {
        bail!("No food found for '{query}'");
    }

    let idx = match pick {
        Some(n) if n >= 1 && n <= all.len() => n - 1,
        Some(n) => bail!("Selection {n} out of range (1-{})", all.len()),
        None if all.len() == 1 => 0,
        None => {
            print_search_table(&all);
            prompt_choice(all.len())?
        }
    };
    Ok(all.swap_remove(idx))
}
