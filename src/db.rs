use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::error::Result;
use crate::models::{DistrictActivity, SignupWeekCount, UnitScore};

/// Read-only access to the aggregates the engine is built on.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Signup counts for the most recent weeks, newest first, at most two rows.
    async fn recent_weekly_signups(&self) -> Result<Vec<SignupWeekCount>>;

    /// Activity counts per district, busiest first. Districts without activity are absent.
    async fn district_activity(&self) -> Result<Vec<DistrictActivity>>;

    /// Leaderboard scores for districts and upazilas, best first.
    async fn unit_scores(&self, limit: usize) -> Result<Vec<UnitScore>>;
}

pub struct PgMetricsStore {
    pool: PgPool,
}

impl PgMetricsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricsStore for PgMetricsStore {
    async fn recent_weekly_signups(&self) -> Result<Vec<SignupWeekCount>> {
        // A NULL week would sort first under DESC and be read as the latest week.
        let rows = sqlx::query(
            r#"
            SELECT date_trunc('week', created_at)::timestamp AS week_start,
                   count(*) AS member_count
            FROM users
            WHERE created_at IS NOT NULL
            GROUP BY 1
            ORDER BY 1 DESC
            LIMIT 2
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut weeks = Vec::with_capacity(rows.len());
        for row in rows {
            weeks.push(SignupWeekCount {
                week_start: row.try_get("week_start")?,
                member_count: row.try_get("member_count")?,
            });
        }

        Ok(weeks)
    }

    async fn district_activity(&self) -> Result<Vec<DistrictActivity>> {
        let rows = sqlx::query(
            r#"
            SELECT j.name AS district_name, count(a.id) AS activity_count
            FROM activities a
            JOIN jurisdictions j ON a.jurisdiction_id = j.id
            WHERE j.level = 'district'
            GROUP BY j.name
            ORDER BY activity_count DESC, district_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut districts = Vec::with_capacity(rows.len());
        for row in rows {
            districts.push(DistrictActivity {
                district_name: row.try_get("district_name")?,
                activity_count: row.try_get("activity_count")?,
            });
        }

        Ok(districts)
    }

    async fn unit_scores(&self, limit: usize) -> Result<Vec<UnitScore>> {
        // Both left joins fan out per jurisdiction; counts run over the joined rows.
        let rows = sqlx::query(
            r#"
            SELECT j.name, count(a.id) * 10 + count(u.id) AS score
            FROM jurisdictions j
            LEFT JOIN activities a ON a.jurisdiction_id = j.id
            LEFT JOIN users u ON u.jurisdiction_id = j.id
            WHERE j.level IN ('district', 'upazila')
            GROUP BY j.name
            ORDER BY score DESC, j.name ASC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut units = Vec::with_capacity(rows.len());
        for row in rows {
            units.push(UnitScore {
                unit_name: row.try_get("name")?,
                score: row.try_get("score")?,
            });
        }

        Ok(units)
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub weeks: Vec<SignupWeekCount>,
    pub districts: Vec<DistrictActivity>,
    pub units: Vec<UnitScore>,
    pub failing: bool,
    pub calls: std::sync::Mutex<Vec<&'static str>>,
}

#[cfg(test)]
impl MemoryStore {
    fn record(&self, call: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl MetricsStore for MemoryStore {
    async fn recent_weekly_signups(&self) -> Result<Vec<SignupWeekCount>> {
        self.record("weekly_signups")?;
        Ok(self.weeks.iter().take(2).cloned().collect())
    }

    async fn district_activity(&self) -> Result<Vec<DistrictActivity>> {
        self.record("district_activity")?;
        Ok(self.districts.clone())
    }

    async fn unit_scores(&self, limit: usize) -> Result<Vec<UnitScore>> {
        self.record("unit_scores")?;
        Ok(self.units.iter().take(limit).cloned().collect())
    }
}
