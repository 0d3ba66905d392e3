use std::path::Path;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::Database;
use crate::mfds::{ExternalError, ExternalPage, SearchField};
use crate::models::{
    DailyBucket, DateRange, Goals, MealLogEntry, MealType, NewMealLog, NutrientRecord,
    manual_record, validate_goals,
};
use crate::search::LOCAL_LIMIT;
use crate::serving::ServingMultiplier;
use crate::stats;

pub const CUSTOM_FOOD_LABEL: &str = "My food";

/// Read side of the meal-log and food-list persistence.
///
/// Futures are not required to be `Send`: callers drive them on a single
/// cooperative event loop.
#[async_trait(?Send)]
pub trait MealStore {
    async fn list_meal_logs(&self, user_id: &str, range: DateRange) -> Result<Vec<MealLogEntry>>;
    async fn list_custom_foods(&self, user_id: &str, query: &str) -> Result<Vec<NutrientRecord>>;
    async fn list_favorites(&self, user_id: &str) -> Result<Vec<NutrientRecord>>;
}

/// Paginated external nutrition database.
///
/// The CLI implements this with reqwest against the MFDS API.
#[async_trait(?Send)]
pub trait NutritionDatabase {
    async fn search_by_field(
        &self,
        field: SearchField,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ExternalPage, ExternalError>;
}

#[async_trait(?Send)]
pub trait GoalProvider {
    /// Unset goals are returned as zero.
    async fn get_goals(&self, user_id: &str) -> Result<Goals>;
}

#[async_trait(?Send)]
impl MealStore for Database {
    async fn list_meal_logs(&self, user_id: &str, range: DateRange) -> Result<Vec<MealLogEntry>> {
        Database::list_meal_logs(self, user_id, range)
    }

    async fn list_custom_foods(&self, user_id: &str, query: &str) -> Result<Vec<NutrientRecord>> {
        self.search_custom_foods(user_id, query, LOCAL_LIMIT)
    }

    async fn list_favorites(&self, user_id: &str) -> Result<Vec<NutrientRecord>> {
        Database::list_favorites(self, user_id)
    }
}

#[async_trait(?Send)]
impl GoalProvider for Database {
    async fn get_goals(&self, user_id: &str) -> Result<Goals> {
        Database::get_goals(self, user_id)
    }
}

/// Text fields of a manually entered food, as typed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualFood<'a> {
    pub name: &'a str,
    pub calories: &'a str,
    pub carbs: Option<&'a str>,
    pub protein: Option<&'a str>,
    pub fat: Option<&'a str>,
    pub serving_size: Option<&'a str>,
    pub maker: Option<&'a str>,
}

impl ManualFood<'_> {
    fn to_record(self) -> Result<NutrientRecord> {
        let mut record = manual_record(self.name, self.calories, self.carbs, self.protein, self.fat)?;
        record.serving_size = self
            .serving_size
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if let Some(maker) = self.maker.map(str::trim).filter(|s| !s.is_empty()) {
            record.source_label = maker.to_string();
        }
        Ok(record)
    }
}

/// Foreground CRUD over the local store for one user.
pub struct PlateService {
    db: Database,
    user_id: String,
}

impl PlateService {
    pub fn new(db_path: &Path, user_id: &str) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self {
            db,
            user_id: user_id.to_string(),
        })
    }

    pub fn new_in_memory(user_id: &str) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db,
            user_id: user_id.to_string(),
        })
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // --- Meal logs ---

    /// Log a food at the given portion; the stored values are the scaled ones.
    pub fn log_food(
        &self,
        date: NaiveDate,
        meal_type: MealType,
        record: &NutrientRecord,
        multiplier: ServingMultiplier,
    ) -> Result<MealLogEntry> {
        if record.name.trim().is_empty() {
            bail!("Food name is required");
        }
        self.db.insert_meal_log(
            &self.user_id,
            &NewMealLog {
                date,
                meal_type,
                nutrients: multiplier.apply(record),
            },
        )
    }

    pub fn log_manual(
        &self,
        date: NaiveDate,
        meal_type: MealType,
        food: ManualFood<'_>,
    ) -> Result<MealLogEntry> {
        let nutrients = food.to_record()?;
        self.db.insert_meal_log(
            &self.user_id,
            &NewMealLog {
                date,
                meal_type,
                nutrients,
            },
        )
    }

    pub fn delete_meal(&self, id: i64) -> Result<bool> {
        self.db.delete_meal_log(&self.user_id, id)
    }

    pub fn list_meals(&self, date: NaiveDate) -> Result<Vec<MealLogEntry>> {
        self.db.list_meal_logs(&self.user_id, DateRange::single(date))
    }

    pub fn daily_bucket(&self, date: NaiveDate) -> Result<DailyBucket> {
        let entries = self.list_meals(date)?;
        Ok(stats::daily_bucket(&entries, date))
    }

    // --- Custom foods and favorites ---

    pub fn save_custom_food(&self, food: ManualFood<'_>) -> Result<NutrientRecord> {
        let mut record = food.to_record()?;
        if record.source_label.is_empty() {
            record.source_label = CUSTOM_FOOD_LABEL.to_string();
        }
        self.db.insert_custom_food(&self.user_id, &record)?;
        Ok(record)
    }

    pub fn search_custom_foods(&self, query: &str) -> Result<Vec<NutrientRecord>> {
        self.db
            .search_custom_foods(&self.user_id, query, LOCAL_LIMIT)
    }

    pub fn add_favorite(&self, record: &NutrientRecord) -> Result<()> {
        if record.name.trim().is_empty() {
            bail!("Food name is required");
        }
        self.db.add_favorite(&self.user_id, record)
    }

    pub fn remove_favorite(&self, name: &str, maker: Option<&str>) -> Result<bool> {
        self.db.remove_favorite(&self.user_id, name, maker)
    }

    pub fn list_favorites(&self) -> Result<Vec<NutrientRecord>> {
        self.db.list_favorites(&self.user_id)
    }

    // --- Goals ---

    pub fn set_goals(&self, goals: &Goals) -> Result<Goals> {
        validate_goals(goals)?;
        self.db.set_goals(&self.user_id, goals)?;
        Ok(*goals)
    }

    pub fn get_goals(&self) -> Result<Goals> {
        self.db.get_goals(&self.user_id)
    }
}
