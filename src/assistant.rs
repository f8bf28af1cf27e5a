//! Keyword router behind the analytics query endpoint.
//!
//! Rules are checked in a fixed order and the first match wins, so a query
//! mentioning both growth and activity is always answered with growth.

use crate::error::Result;
use crate::metrics::PulseEngine;
use crate::models::{DistrictActivity, UnitScore};

pub const FALLBACK_ANSWER: &str = "I'm sorry, I couldn't find analytical data for that specific query yet. Try asking about 'growth', 'top units', or 'activity levels'.";

const TOP_UNITS_IN_ANSWER: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Growth,
    TopUnits,
    Activity,
    Unknown,
}

impl Intent {
    pub fn classify(query: &str) -> Self {
        let query = query.to_lowercase();

        if query.contains("growth") {
            Intent::Growth
        } else if query.contains("top units") || query.contains("best performing") {
            Intent::TopUnits
        } else if query.contains("activity") || query.contains("heatmap") {
            Intent::Activity
        } else {
            Intent::Unknown
        }
    }
}

/// Answers `query` in plain language, hitting the store only for the matched intent.
pub async fn route(engine: &PulseEngine, query: &str) -> Result<String> {
    let intent = Intent::classify(query);
    tracing::debug!(?intent, "routing analytics query");

    let answer = match intent {
        Intent::Growth => growth_answer(engine.growth_velocity().await?),
        Intent::TopUnits => top_units_answer(&engine.unit_performance().await?),
        Intent::Activity => activity_answer(&engine.heatmap_data().await?),
        Intent::Unknown => FALLBACK_ANSWER.to_string(),
    };

    Ok(answer)
}

pub fn growth_answer(velocity: f64) -> String {
    format!("The current organizational growth velocity is {velocity:.2}% week-over-week.")
}

pub fn top_units_answer(units: &[UnitScore]) -> String {
    let names = units
        .iter()
        .take(TOP_UNITS_IN_ANSWER)
        .map(|unit| unit.unit_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("The top performing units currently are: {names}.")
}

pub fn activity_answer(heatmap: &[DistrictActivity]) -> String {
    let total: i64 = heatmap.iter().map(|district| district.activity_count).sum();
    format!("System detects {total} active operations across all monitored districts.")
}
