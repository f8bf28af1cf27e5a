use thiserror::Error;

/// Failure raised while computing a metric.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
