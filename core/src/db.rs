use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::{Connection, params};

use crate::models::{DateRange, Goals, MealLogEntry, MealType, NewMealLog, NutrientRecord};

/// Local single-user store for meal logs, custom foods, favorites and goals.
///
/// Rows carry a `user_id` so the store can stand in for a multi-user backend.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS meal_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    date TEXT NOT NULL,
                    meal_type TEXT NOT NULL,
                    food_name TEXT NOT NULL,
                    calories REAL NOT NULL DEFAULT 0,
                    carbs REAL NOT NULL DEFAULT 0,
                    protein REAL NOT NULL DEFAULT 0,
                    fat REAL NOT NULL DEFAULT 0,
                    serving_size TEXT,
                    source_label TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS custom_foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    food_name TEXT NOT NULL,
                    maker_name TEXT NOT NULL DEFAULT '',
                    calories REAL NOT NULL DEFAULT 0,
                    carbs REAL NOT NULL DEFAULT 0,
                    protein REAL NOT NULL DEFAULT 0,
                    fat REAL NOT NULL DEFAULT 0,
                    serving_size TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS favorites (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    food_name TEXT NOT NULL,
                    maker_name TEXT NOT NULL DEFAULT '',
                    calories REAL NOT NULL DEFAULT 0,
                    carbs REAL NOT NULL DEFAULT 0,
                    protein REAL NOT NULL DEFAULT 0,
                    fat REAL NOT NULL DEFAULT 0,
                    serving_size TEXT,
                    created_at TEXT NOT NULL,
                    UNIQUE (user_id, food_name, maker_name)
                );

                CREATE TABLE IF NOT EXISTS goals (
                    user_id TEXT PRIMARY KEY,
                    calories REAL NOT NULL DEFAULT 0,
                    carbs REAL NOT NULL DEFAULT 0,
                    protein REAL NOT NULL DEFAULT 0,
                    fat REAL NOT NULL DEFAULT 0,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_meal_logs_user_date ON meal_logs(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_custom_foods_user ON custom_foods(user_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    // Expects columns:
    // 0: id, 1: date, 2: meal_type, 3: food_name, 4: calories, 5: carbs,
    // 6: protein, 7: fat, 8: serving_size, 9: source_label
    fn meal_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealLogEntry> {
        let date: String = row.get(1)?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let meal_type: String = row.get(2)?;
        let meal_type: MealType = meal_type.parse().map_err(|e: anyhow::Error| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;
        Ok(MealLogEntry {
            id: row.get(0)?,
            date,
            meal_type,
            nutrients: NutrientRecord {
                name: row.get(3)?,
                calories: row.get(4)?,
                carbs: row.get(5)?,
                protein: row.get(6)?,
                fat: row.get(7)?,
                serving_size: row.get(8)?,
                source_label: row.get(9)?,
            },
        })
    }

    // Expects columns:
    // 0: food_name, 1: maker_name, 2: calories, 3: carbs, 4: protein,
    // 5: fat, 6: serving_size
    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<NutrientRecord> {
        Ok(NutrientRecord {
            name: row.get(0)?,
            source_label: row.get(1)?,
            calories: row.get(2)?,
            carbs: row.get(3)?,
            protein: row.get(4)?,
            fat: row.get(5)?,
            serving_size: row.get(6)?,
        })
    }

    // --- Meal logs ---

    pub fn insert_meal_log(&self, user_id: &str, entry: &NewMealLog) -> Result<MealLogEntry> {
        let now = Local::now().to_rfc3339();
        let date_str = entry.date.format("%Y-%m-%d").to_string();
        let n = &entry.nutrients;
        self.conn.execute(
            "INSERT INTO meal_logs (user_id, date, meal_type, food_name, calories, carbs, protein, fat, serving_size, source_label, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                user_id,
                date_str,
                entry.meal_type.as_str(),
                n.name,
                n.calories,
                n.carbs,
                n.protein,
                n.fat,
                n.serving_size,
                n.source_label,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_meal_log(id)
    }

    pub fn get_meal_log(&self, id: i64) -> Result<MealLogEntry> {
        self.conn
            .query_row(
                "SELECT id, date, meal_type, food_name, calories, carbs, protein, fat, serving_size, source_label
                 FROM meal_logs WHERE id = ?1",
                params![id],
                Self::meal_log_from_row,
            )
            .context("Meal log not found")
    }

    pub fn delete_meal_log(&self, user_id: &str, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM meal_logs WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn list_meal_logs(&self, user_id: &str, range: DateRange) -> Result<Vec<MealLogEntry>> {
        let start = range.start.format("%Y-%m-%d").to_string();
        let end = range.end.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, date, meal_type, food_name, calories, carbs, protein, fat, serving_size, source_label
             FROM meal_logs
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, id",
        )?;
        let entries = stmt
            .query_map(params![user_id, start, end], Self::meal_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // --- Custom foods ---

    pub fn insert_custom_food(&self, user_id: &str, food: &NutrientRecord) -> Result<i64> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO custom_foods (user_id, food_name, maker_name, calories, carbs, protein, fat, serving_size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user_id,
                food.name,
                food.source_label,
                food.calories,
                food.carbs,
                food.protein,
                food.fat,
                food.serving_size,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Case-insensitive substring match on name or maker.
    ///
    /// SQLite `LIKE` only folds ASCII, so matching happens here rather than in
    /// the query.
    pub fn search_custom_foods(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<NutrientRecord>> {
        let needle = query.to_lowercase();
        let mut stmt = self.conn.prepare(
            "SELECT food_name, maker_name, calories, carbs, protein, fat, serving_size
             FROM custom_foods
             WHERE user_id = ?1
             ORDER BY food_name",
        )?;
        let mut foods = Vec::new();
        for food in stmt.query_map(params![user_id], Self::food_from_row)? {
            if foods.len() >= limit {
                break;
            }
            let food = food?;
            if food.matches(&needle) {
                foods.push(food);
            }
        }
        Ok(foods)
    }

    // --- Favorites ---

    pub fn add_favorite(&self, user_id: &str, food: &NutrientRecord) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO favorites (user_id, food_name, maker_name, calories, carbs, protein, fat, serving_size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(user_id, food_name, maker_name) DO UPDATE SET
                calories = excluded.calories,
                carbs = excluded.carbs,
                protein = excluded.protein,
                fat = excluded.fat,
                serving_size = excluded.serving_size",
            params![
                user_id,
                food.name,
                food.source_label,
                food.calories,
                food.carbs,
                food.protein,
                food.fat,
                food.serving_size,
                now,
            ],
        )?;
        Ok(())
    }

    /// Without a maker, every favorite with this name is removed.
    pub fn remove_favorite(
        &self,
        user_id: &str,
        name: &str,
        maker: Option<&str>,
    ) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM favorites
             WHERE user_id = ?1 AND food_name = ?2 AND (?3 IS NULL OR maker_name = ?3)",
            params![user_id, name, maker],
        )?;
        Ok(rows > 0)
    }

    pub fn list_favorites(&self, user_id: &str) -> Result<Vec<NutrientRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT food_name, maker_name, calories, carbs, protein, fat, serving_size
             FROM favorites WHERE user_id = ?1 ORDER BY id",
        )?;
        let foods = stmt
            .query_map(params![user_id], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    // --- Goals ---

    pub fn set_goals(&self, user_id: &str, goals: &Goals) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO goals (user_id, calories, carbs, protein, fat, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                calories = excluded.calories,
                carbs = excluded.carbs,
                protein = excluded.protein,
                fat = excluded.fat,
                updated_at = excluded.updated_at",
            params![
                user_id,
                goals.calories,
                goals.carbs,
                goals.protein,
                goals.fat,
                now
            ],
        )?;
        Ok(())
    }

    pub fn get_goals(&self, user_id: &str) -> Result<Goals> {
        let mut stmt = self
            .conn
            .prepare("SELECT calories, carbs, protein, fat FROM goals WHERE user_id = ?1")?;
        let mut rows = stmt.query(params![user_id])?;
        if let Some(row) = rows.next()? {
            Ok(Goals {
                calories: row.get(0)?,
                carbs: row.get(1)?,
                protein: row.get(2)?,
                fat: row.get(3)?,
            })
        } else {
            Ok(Goals::default())
        }
    }
}
