use anyhow::Result;
use std::process;

use plate_core::models::{SearchOrigin, SearchResultItem};
use plate_core::search::{FoodSearch, SearchSession};
use plate_core::service::{ManualFood, PlateService};

use super::helpers::print_search_table;
use super::{report_notice, resolve_food};

pub(crate) async fn cmd_search(
    search: &FoodSearch<'_>,
    query: &str,
    pages: u32,
    json: bool,
) -> Result<()> {
    let mut session = SearchSession::new();
    search.search(&mut session, query).await;
    for _ in 1..pages.max(1) {
        if !session.has_more() {
            break;
        }
        search.load_more(&mut session).await;
    }
    report_notice(&session);

    let all = session.results();
    if all.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No results found for '{query}'");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(all)?);
    } else {
        print_search_table(all);
        if session.has_more() {
            let next = session.page() + 1;
            eprintln!("More results available (use --pages {next})");
        }
    }

    Ok(())
}

pub(crate) fn cmd_food_add(svc: &PlateService, food: ManualFood<'_>, json: bool) -> Result<()> {
    let record = svc.save_custom_food(food)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        let name = &record.name;
        let cal = record.calories;
        println!("Saved custom food: {name} ({cal:.0} kcal)");
    }

    Ok(())
}

pub(crate) fn cmd_food_list(svc: &PlateService, search: &str, json: bool) -> Result<()> {
    let foods = svc.search_custom_foods(search)?;

    if foods.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No custom foods found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
    } else {
        let items: Vec<SearchResultItem> = foods
            .into_iter()
            .map(|r| SearchResultItem::local(r, SearchOrigin::LocalCustom))
            .collect();
        print_search_table(&items);
    }

    Ok(())
}

pub(crate) async fn cmd_favorite_add(
    svc: &PlateService,
    search: &FoodSearch<'_>,
    query: &str,
    pick: Option<usize>,
    json: bool,
) -> Result<()> {
    let item = resolve_food(search, query, pick).await?;
    svc.add_favorite(&item.record)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item.record)?);
    } else {
        let name = &item.record.name;
        println!("Added to favorites: {name}");
    }

    Ok(())
}

pub(crate) fn cmd_favorite_list(svc: &PlateService, json: bool) -> Result<()> {
    let favorites = svc.list_favorites()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&favorites)?);
        return Ok(());
    }

    if favorites.is_empty() {
        eprintln!("No favorites yet");
        process::exit(2);
    }

    let items: Vec<SearchResultItem> = favorites
        .into_iter()
        .map(|r| SearchResultItem::local(r, SearchOrigin::LocalFavorite))
        .collect();
    print_search_table(&items);

    Ok(())
}

pub(crate) fn cmd_favorite_remove(
    svc: &PlateService,
    name: &str,
    maker: Option<&str>,
    json: bool,
) -> Result<()> {
    let removed = svc.remove_favorite(name, maker)?;

    if json {
        println!("{}", serde_json::json!({ "removed": removed, "name": name }));
    } else if removed {
        println!("Removed from favorites: {name}");
    } else {
        eprintln!("'{name}' is not a favorite");
        process::exit(2);
    }

    Ok(())
}
