mod commands;
mod config;
mod mfds;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_add, cmd_day, cmd_delete, cmd_favorite_add, cmd_favorite_list, cmd_favorite_remove,
    cmd_food_add, cmd_food_list, cmd_goal_set, cmd_goal_show, cmd_log, cmd_month, cmd_search,
    cmd_week,
};
use crate::config::Config;
use crate::mfds::MfdsClient;
use plate_core::search::FoodSearch;
use plate_core::service::{ManualFood, PlateService};
use plate_core::stats::NutritionStats;

#[derive(Parser)]
#[command(
    name = "plate",
    version,
    about = "A small nutrition tracker CLI",
    long_about = "Search the MFDS food database and your own foods, log meals by portion, \
                  and review daily, weekly and monthly nutrition against your goals."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Macro fields shared by manual entry and custom foods. Kept as text so
/// validation errors can name the offending field.
#[derive(clap::Args)]
struct ManualArgs {
    /// Food name
    name: String,
    /// Calories (kcal)
    #[arg(long)]
    calories: String,
    /// Carbohydrates (g)
    #[arg(long)]
    carbs: Option<String>,
    /// Protein (g)
    #[arg(long)]
    protein: Option<String>,
    /// Fat (g)
    #[arg(long)]
    fat: Option<String>,
    /// Serving size label (e.g. "1 bowl", "200g")
    #[arg(long)]
    serving: Option<String>,
}

impl ManualArgs {
    fn as_food<'a>(&'a self, maker: Option<&'a str>) -> ManualFood<'a> {
        ManualFood {
            name: &self.name,
            calories: &self.calories,
            carbs: self.carbs.as_deref(),
            protein: self.protein.as_deref(),
            fat: self.fat.as_deref(),
            serving_size: self.serving.as_deref(),
            maker,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search your favorites, custom foods and the MFDS database
    Search {
        /// Search query (at least 2 characters)
        query: String,
        /// Number of external result pages to load
        #[arg(short, long, default_value = "1")]
        pages: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food entry by searching for it
    Log {
        /// Food name or maker to search for
        food: String,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Serving multiplier (e.g. "1.5" or "0.5x")
        #[arg(short, long, default_value = "1")]
        serving: String,
        /// Pick the Nth search result instead of prompting
        #[arg(long)]
        pick: Option<usize>,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food by entering its nutrients directly
    Add {
        #[command(flatten)]
        food: ManualArgs,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Also save it as a custom food
        #[arg(long)]
        save: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal entry by ID
    Delete {
        /// Entry ID to delete
        entry_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage custom foods
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Manage favorite foods
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Manage daily calorie/macro goals
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Show one day's meals and goal progress (defaults to today)
    Day {
        /// Date to show (YYYY-MM-DD, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a 7-day summary
    Week {
        /// Weeks back from today (0 = the last 7 days)
        #[arg(short, long, default_value = "0")]
        offset: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a monthly calendar of percent-of-goal
    Month {
        /// Month to show (YYYY-MM, default: this month)
        month: Option<String>,
        /// Also show detail for one day of the month
        #[arg(long)]
        day: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Save a custom food
    Add {
        #[command(flatten)]
        food: ManualArgs,
        /// Maker or brand name
        #[arg(long)]
        maker: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search your custom foods
    List {
        /// Search query (name or maker)
        #[arg(default_value = "")]
        search: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// Search for a food and add it to favorites
    Add {
        /// Food name or maker to search for
        food: String,
        /// Pick the Nth search result instead of prompting
        #[arg(long)]
        pick: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List favorites
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a favorite by name
    Remove {
        /// Food name
        name: String,
        /// Only remove the favorite from this maker (default: all makers)
        #[arg(long)]
        maker: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Set daily goals; omitted values are kept
    Set {
        /// Daily calories (kcal)
        #[arg(long)]
        calories: Option<f64>,
        /// Daily carbohydrates (g)
        #[arg(long)]
        carbs: Option<f64>,
        /// Daily protein (g)
        #[arg(long)]
        protein: Option<f64>,
        /// Daily fat (g)
        #[arg(long)]
        fat: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show daily goals
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = PlateService::new(&config.db_path, &config.user_id)?;
    let mfds = MfdsClient::new(&config.mfds_url, config.mfds_service_key.clone())?;
    let search = FoodSearch::new(svc.db(), &mfds, svc.user_id());
    let stats = NutritionStats::new(svc.db(), svc.db(), svc.user_id());

    match cli.command {
        Commands::Search { query, pages, json } => cmd_search(&search, &query, pages, json).await,
        Commands::Log {
            food,
            meal,
            serving,
            pick,
            date,
            json,
        } => cmd_log(&svc, &search, &food, &meal, &serving, pick, date, json).await,
        Commands::Add {
            food,
            meal,
            date,
            save,
            json,
        } => cmd_add(&svc, food.as_food(None), &meal, date, save, json),
        Commands::Delete { entry_id, json } => cmd_delete(&svc, entry_id, json),
        Commands::Food { command } => match command {
            FoodCommands::Add { food, maker, json } => {
                cmd_food_add(&svc, food.as_food(maker.as_deref()), json)
            }
            FoodCommands::List { search, json } => cmd_food_list(&svc, &search, json),
        },
        Commands::Favorite { command } => match command {
            FavoriteCommands::Add { food, pick, json } => {
                cmd_favorite_add(&svc, &search, &food, pick, json).await
            }
            FavoriteCommands::List { json } => cmd_favorite_list(&svc, json),
            FavoriteCommands::Remove { name, maker, json } => {
                cmd_favorite_remove(&svc, &name, maker.as_deref(), json)
            }
        },
        Commands::Goal { command } => match command {
            GoalCommands::Set {
                calories,
                carbs,
                protein,
                fat,
                json,
            } => cmd_goal_set(&svc, calories, carbs, protein, fat, json),
            GoalCommands::Show { json } => cmd_goal_show(&svc, json),
        },
        Commands::Day { date, json } => cmd_day(&svc, &stats, date, json).await,
        Commands::Week { offset, json } => cmd_week(&svc, &stats, offset, json).await,
        Commands::Month { month, day, json } => {
            cmd_month(&stats, month.as_deref(), day, json).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_log_defaults() {
        let cli = Cli::try_parse_from(["plate", "log", "kimchi"]).unwrap();
        let Commands::Log { meal, serving, .. } = cli.command else {
            panic!("expected log");
        };
        assert_eq!(meal, "snack");
        assert_eq!(serving, "1");
    }

    #[test]
    fn test_parse_manual_add() {
        let cli = Cli::try_parse_from([
            "plate", "add", "Rice", "--calories", "300", "--protein", "6", "--meal", "lunch",
            "--save",
        ])
        .unwrap();
        let Commands::Add { food, meal, save, .. } = cli.command else {
            panic!("expected add");
        };
        let manual = food.as_food(None);
        assert_eq!(manual.name, "Rice");
        assert_eq!(manual.calories, "300");
        assert_eq!(manual.protein, Some("6"));
        assert!(manual.carbs.is_none());
        assert_eq!(meal, "lunch");
        assert!(save);
    }

    #[test]
    fn test_parse_favorite_remove_maker() {
        let cli =
            Cli::try_parse_from(["plate", "favorite", "remove", "Tofu", "--maker", "CJ"]).unwrap();
        let Commands::Favorite {
            command: FavoriteCommands::Remove { name, maker, .. },
        } = cli.command
        else {
            panic!("expected favorite remove");
        };
        assert_eq!(name, "Tofu");
        assert_eq!(maker.as_deref(), Some("CJ"));
    }

    #[test]
    fn test_add_requires_calories() {
        assert!(Cli::try_parse_from(["plate", "add", "Rice"]).is_err());
    }
}
