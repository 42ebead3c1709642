//! Display formatting for replies.

use crate::session::{ConsumedProduct, NutrientTotals};
use serde_json::Value;
use std::fmt::Write as _;

pub const NAME_PLACEHOLDER: &str = "No product name available";

/// Render the product name and the explanation as one display string.
pub fn format_response(structured_data: &Value, explanation: &str) -> String {
    let name = structured_data
        .pointer("/product/name")
        .and_then(Value::as_str)
        .unwrap_or(NAME_PLACEHOLDER);

    format!(
        "### Response\n{}\n\n### Additional Details\n{}\n",
        name, explanation
    )
}

/// Per-product nutrient lines followed by the running totals.
pub fn format_consumption(ledger: &[ConsumedProduct]) -> String {
    if ledger.is_empty() {
        return "No products recorded yet.\n".to_string();
    }

    let mut out = String::new();
    let mut totals = NutrientTotals::default();

    for (i, product) in ledger.iter().enumerate() {
        let n = product.nutrients();
        totals.add(&n);
        let _ = writeln!(out, "{}. {}:", i + 1, product.name());
        let _ = writeln!(out, "   - Calories: {} kcal", n.calories);
        let _ = writeln!(out, "   - Protein: {} g", n.protein);
        let _ = writeln!(out, "   - Carbohydrates: {} g", n.carbohydrates);
        let _ = writeln!(out, "   - Fat: {} g", n.fat);
    }

    let _ = writeln!(out, "\nDaily totals so far:");
    let _ = writeln!(out, "- Total Calories: {} kcal", totals.calories);
    let _ = writeln!(out, "- Total Protein: {} g", totals.protein);
    let _ = writeln!(out, "- Total Carbohydrates: {} g", totals.carbohydrates);
    let _ = writeln!(out, "- Total Fat: {} g", totals.fat);
    let _ = writeln!(
        out,
        "- Approximate % of 2000 kcal diet: {:.1}%",
        totals.percent_of_daily_calories()
    );
    out
}
