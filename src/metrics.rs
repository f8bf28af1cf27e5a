use std::sync::Arc;

use crate::db::MetricsStore;
use crate::error::Result;
use crate::models::{DistrictActivity, Pulse, SignupWeekCount, UnitScore};

pub const UNIT_LEADERBOARD_SIZE: usize = 10;

/// Returned when the previous week had no signups at all.
pub const SATURATED_GROWTH: f64 = 100.0;

/// Computes the organizational pulse from an injected store.
#[derive(Clone)]
pub struct PulseEngine {
    store: Arc<dyn MetricsStore>,
}

impl PulseEngine {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    /// Week-over-week signup growth as a percentage rounded to two decimals.
    pub async fn growth_velocity(&self) -> Result<f64> {
        let weeks = self.store.recent_weekly_signups().await?;
        Ok(growth_velocity(&weeks))
    }

    /// Activity per district, busiest first.
    pub async fn heatmap_data(&self) -> Result<Vec<DistrictActivity>> {
        self.store.district_activity().await
    }

    /// Top ten districts and upazilas by score.
    pub async fn unit_performance(&self) -> Result<Vec<UnitScore>> {
        let mut units = self.store.unit_scores(UNIT_LEADERBOARD_SIZE).await?;
        units.truncate(UNIT_LEADERBOARD_SIZE);
        Ok(units)
    }

    /// All three metrics, or the first failure.
    pub async fn pulse(&self) -> Result<Pulse> {
        let growth_velocity = self.growth_velocity().await?;
        let heatmap = self.heatmap_data().await?;
        let top_performing_units = self.unit_performance().await?;

        Ok(Pulse {
            growth_velocity,
            heatmap,
            top_performing_units,
        })
    }
}

/// Expects `weeks` newest first. Anything past the second week is ignored.
pub fn growth_velocity(weeks: &[SignupWeekCount]) -> f64 {
    let [latest, previous, ..] = weeks else {
        return 0.0;
    };

    if previous.member_count == 0 {
        return SATURATED_GROWTH;
    }

    let latest = latest.member_count as f64;
    let previous = previous.member_count as f64;
    round_to_hundredths((latest - previous) / previous * 100.0)
}

/// Rounds the exact binary value of `value` to two decimals, ties to even.
fn round_to_hundredths(value: f64) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }

    let bits = value.abs().to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };

    // Already integral.
    if exponent >= 0 {
        return value;
    }

    // |value| * 100 == scaled / 2^shift exactly.
    let scaled = u128::from(mantissa) * 100;
    let shift = exponent.unsigned_abs();
    let hundredths = if shift >= 127 {
        0
    } else {
        let quotient = scaled >> shift;
        let remainder = scaled - (quotient << shift);
        let half = 1u128 << (shift - 1);
        if remainder > half || (remainder == half && quotient & 1 == 1) {
            quotient + 1
        } else {
            quotient
        }
    };

    (hundredths as f64 / 100.0).copysign(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn monday(weeks_ago: i64) -> NaiveDateTime {
        let base = NaiveDate::from_ymd_opt(2026, 10, 12)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        base - Duration::weeks(weeks_ago)
    }

    fn weeks(latest: i64, previous: i64) -> Vec<SignupWeekCount> {
        vec![
            SignupWeekCount {
                week_start: monday(0),
                member_count: latest,
            },
            SignupWeekCount {
                week_start: monday(1),
                member_count: previous,
            },
        ]
    }

    fn unit(name: &str, score: i64) -> UnitScore {
        UnitScore {
            unit_name: name.to_string(),
            score,
        }
    }

    #[test]
    fn growth_is_percentage_change_between_latest_weeks() {
        assert_eq!(growth_velocity(&weeks(110, 100)), 10.0);
        assert_eq!(growth_velocity(&weeks(100, 100)), 0.0);
        assert!((growth_velocity(&weeks(1, 3)) - -66.67).abs() < 1e-9);
        assert!((growth_velocity(&weeks(4, 3)) - 33.33).abs() < 1e-9);
    }

    #[test]
    fn growth_rounds_exact_halves_to_even() {
        assert_eq!(growth_velocity(&weeks(33, 32)), 3.12);
        assert_eq!(growth_velocity(&weeks(3, 32)), -90.62);
        assert_eq!(growth_velocity(&weeks(35, 32)), 9.38);
        assert_eq!(round_to_hundredths(0.125), 0.12);
        assert_eq!(round_to_hundredths(-0.375), -0.38);
    }

    #[test]
    fn rounding_uses_binary_value_not_decimal_literal() {
        // 2.675 is stored just below the tie.
        assert_eq!(round_to_hundredths(2.675), 2.67);
        assert_eq!(round_to_hundredths(1.005), 1.0);
        assert_eq!(round_to_hundredths(12.0), 12.0);
    }

    #[test]
    fn growth_saturates_when_previous_week_is_empty() {
        assert_eq!(growth_velocity(&weeks(42, 0)), 100.0);
        assert_eq!(growth_velocity(&weeks(0, 0)), 100.0);
    }

    #[test]
    fn growth_needs_two_weeks_of_history() {
        assert_eq!(growth_velocity(&[]), 0.0);
        let single = vec![SignupWeekCount {
            week_start: monday(0),
            member_count: 12,
        }];
        assert_eq!(growth_velocity(&single), 0.0);
    }

    #[test]
    fn growth_ignores_older_weeks() {
        let mut history = weeks(120, 100);
        history.push(SignupWeekCount {
            week_start: monday(2),
            member_count: 1,
        });
        assert_eq!(growth_velocity(&history), 20.0);
    }

    #[tokio::test]
    async fn unit_performance_is_capped_at_ten() {
        let units = (0..15).map(|i| unit(&format!("Unit {i}"), 100 - i)).collect();
        let store = MemoryStore {
            units,
            ..MemoryStore::default()
        };
        let engine = PulseEngine::new(Arc::new(store));

        let top = engine.unit_performance().await.unwrap();
        assert_eq!(top.len(), UNIT_LEADERBOARD_SIZE);
        assert!(top.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert_eq!(top[0].unit_name, "Unit 0");
    }

    #[tokio::test]
    async fn pulse_collects_all_three_metrics() {
        let store = MemoryStore {
            weeks: weeks(30, 20),
            districts: vec![DistrictActivity {
                district_name: "Dhaka".to_string(),
                activity_count: 7,
            }],
            units: vec![unit("Dhaka", 75), unit("Savar", 0)],
            ..MemoryStore::default()
        };
        let engine = PulseEngine::new(Arc::new(store));

        let pulse = engine.pulse().await.unwrap();
        assert_eq!(pulse.growth_velocity, 50.0);
        assert_eq!(pulse.heatmap.len(), 1);
        assert_eq!(pulse.top_performing_units[1].score, 0);
    }

    #[tokio::test]
    async fn pulse_fails_as_a_whole() {
        let store = MemoryStore {
            weeks: weeks(30, 20),
            failing: true,
            ..MemoryStore::default()
        };
        let engine = PulseEngine::new(Arc::new(store));

        assert!(engine.pulse().await.is_err());
    }
}
