use anyhow::{Result, bail};
use serde::Serialize;

use crate::models::NutrientRecord;

pub const MULTIPLIER_STEP: f64 = 0.5;
pub const MIN_STEPPED_MULTIPLIER: f64 = 0.5;

/// Scale a record's calories and macros by `multiplier`.
///
/// Each field is rounded independently, half away from zero. Calories are not
/// re-derived from the rounded macros, so 4/4/9 consistency is not preserved.
#[must_use]
pub fn scale(record: &NutrientRecord, multiplier: f64) -> NutrientRecord {
    NutrientRecord {
        calories: (record.calories * multiplier).round(),
        carbs: (record.carbs * multiplier).round(),
        protein: (record.protein * multiplier).round(),
        fat: (record.fat * multiplier).round(),
        ..record.clone()
    }
}

/// Portion multiplier as adjusted by the `-`/`+` controls.
///
/// Stepping never goes below `0.5`. A multiplier typed in directly may be `0`,
/// which scales every field to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServingMultiplier(f64);

impl Default for ServingMultiplier {
    fn default() -> Self {
        Self(1.0)
    }
}

impl ServingMultiplier {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            bail!("Serving multiplier must be a finite number");
        }
        if value < 0.0 {
            bail!("Serving multiplier must not be negative (got {value})");
        }
        Ok(Self(value))
    }

    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_end_matches(['x', 'X']).trim();
        let value: f64 = trimmed
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid serving multiplier '{input}'. Use e.g. 1.5"))?;
        Self::new(value)
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn increment(self) -> Self {
        self.step(MULTIPLIER_STEP)
    }

    #[must_use]
    pub fn decrement(self) -> Self {
        self.step(-MULTIPLIER_STEP)
    }

    fn step(self, amount: f64) -> Self {
        Self((self.0 + amount).max(MIN_STEPPED_MULTIPLIER))
    }

    #[must_use]
    pub fn apply(self, record: &NutrientRecord) -> NutrientRecord {
        scale(record, self.0)
    }
}
