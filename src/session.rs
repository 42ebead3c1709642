//! Per-conversation state
//!
//! A [`Session`] owns the last structured result and the ledger of products
//! the user confirmed consuming. It is passed explicitly to every handler
//! call; nothing is shared between sessions.

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Reference daily energy intake used for percentage summaries.
pub const DAILY_CALORIE_REFERENCE: f64 = 2000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumedProduct {
    pub data: Value,
    pub consumed_at: DateTime<Local>,
}

impl ConsumedProduct {
    pub fn name(&self) -> &str {
        self.data
            .pointer("/product/name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Product")
    }

    pub fn nutrients(&self) -> NutrientTotals {
        NutrientTotals::from_product(&self.data)
    }
}

/// Summed nutritive values; missing or non-numeric fields count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NutrientTotals {
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbohydrates: f64,
    pub sugar: f64,
    pub fiber: f64,
    pub sodium: f64,
}

impl NutrientTotals {
    pub fn from_product(data: &Value) -> Self {
        let value = |field: &str| {
            data.pointer(&format!("/product/nutritive_value/{}", field))
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
        };

        Self {
            calories: value("calories"),
            protein: value("protein"),
            fat: value("fat"),
            carbohydrates: value("carbohydrates"),
            sugar: value("sugar"),
            fiber: value("fiber"),
            sodium: value("sodium"),
        }
    }

    pub fn add(&mut self, other: &NutrientTotals) {
        self.calories += other.calories;
        self.protein += other.protein;
        self.fat += other.fat;
        self.carbohydrates += other.carbohydrates;
        self.sugar += other.sugar;
        self.fiber += other.fiber;
        self.sodium += other.sodium;
    }

    pub fn percent_of_daily_calories(&self) -> f64 {
        self.calories * 100.0 / DAILY_CALORIE_REFERENCE
    }
}

pub struct Session {
    id: Uuid,
    started_at: DateTime<Local>,
    structured_result: Option<Value>,
    // Grows for the session's lifetime; there is no eviction.
    ledger: Vec<ConsumedProduct>,
}

impl Session {
    pub fn start() -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            started_at: Local::now(),
            structured_result: None,
            ledger: Vec::new(),
        };
        tracing::info!("Session {} started", session.id);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn structured_result(&self) -> Option<&Value> {
        self.structured_result.as_ref()
    }

    pub fn set_structured_result(&mut self, data: Value) {
        self.structured_result = Some(data);
    }

    pub fn ledger(&self) -> &[ConsumedProduct] {
        &self.ledger
    }

    pub fn consume(&mut self, data: Value) -> &ConsumedProduct {
        let entry = ConsumedProduct {
            data,
            consumed_at: Local::now(),
        };
        tracing::info!("Session {}: recorded '{}'", self.id, entry.name());
        self.ledger.push(entry);
        &self.ledger[self.ledger.len() - 1]
    }

    /// Record the cached structured result as consumed, if there is one.
    pub fn consume_current(&mut self) -> Option<&ConsumedProduct> {
        let data = self.structured_result.clone()?;
        Some(self.consume(data))
    }

    pub fn nutrient_totals(&self) -> NutrientTotals {
        self.ledger
            .iter()
            .fold(NutrientTotals::default(), |mut totals, product| {
                totals.add(&product.nutrients());
                totals
            })
    }

    pub fn end(self) -> NutrientTotals {
        let totals = self.nutrient_totals();
        tracing::info!(
            "Session {} ended after {}s: {} product(s), {:.0} kcal",
            self.id,
            (Local::now() - self.started_at).num_seconds(),
            self.ledger.len(),
            totals.calories
        );
        totals
    }
}
