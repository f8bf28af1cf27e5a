use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Users created during the week starting at `week_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupWeekCount {
    pub week_start: NaiveDateTime,
    pub member_count: i64,
}

/// Activities recorded in one district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictActivity {
    pub district_name: String,
    pub activity_count: i64,
}

/// Leaderboard entry: ten points per activity plus one per member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitScore {
    #[serde(rename = "name")]
    pub unit_name: String,
    pub score: i64,
}

/// Snapshot served by the pulse endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    pub growth_velocity: f64,
    pub heatmap: Vec<DistrictActivity>,
    pub top_performing_units: Vec<UnitScore>,
}
