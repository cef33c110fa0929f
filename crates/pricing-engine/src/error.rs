// Error taxonomy for the pricing engine.
//
// Configuration problems are rejected before any computation, fetch problems
// stop the pipeline before allocation, and adjustment problems are rejected
// before any player in the batch is touched.

use thiserror::Error;

use crate::valuation::category::{Category, Side};

/// Invalid budget or scoring input. Always raised before any price is computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("salary_increment must be greater than 0")]
    NonPositiveIncrement,

    #[error("min_salary must be at least 1, got {0}")]
    InvalidMinSalary(u32),

    #[error("invalid budget field `{field}`: {message}")]
    InvalidBudget { field: &'static str, message: String },

    #[error("no {side} categories selected but the pool contains {side} players")]
    EmptyCategorySelection { side: Side },

    #[error("category {category} is a {actual} category, not {expected}")]
    WrongSide {
        category: Category,
        expected: Side,
        actual: Side,
    },

    #[error("category {0} selected more than once")]
    DuplicateCategory(Category),

    #[error("unknown scoring category code `{0}`")]
    UnknownCategory(String),

    #[error("weight for {category} must be a positive finite number, got {weight}")]
    InvalidWeight { category: Category, weight: f64 },
}

/// Upstream player/stat data could not be obtained or is unusable.
#[derive(Debug, Error)]
pub enum DataFetchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("league `{0}` not found")]
    LeagueNotFound(String),

    #[error("malformed pricing data for league `{league_id}`: {message}")]
    Malformed { league_id: String, message: String },

    #[error("data source error: {0:#}")]
    Source(anyhow::Error),
}

/// A rejected override request. The price set is left unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdjustmentError {
    #[error("no players selected for adjustment")]
    EmptySelection,

    #[error("player `{0}` is not in the price set")]
    UnknownPlayer(String),

    #[error("adjustment value `{0}` is not numeric")]
    NonNumeric(String),

    #[error("unknown adjustment kind `{0}` (expected percentage, fixed or set)")]
    UnknownKind(String),

    #[error("adjustment produced a non-numeric salary for player `{0}`")]
    NonNumericResult(String),
}

/// Umbrella error for the pipeline and session entry points.
#[derive(Debug, Error)]
pub enum PricingError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    DataFetch(#[from] DataFetchError),

    #[error(transparent)]
    Adjustment(#[from] AdjustmentError),

    #[error("no price set has been generated for league `{0}`")]
    NotGenerated(String),

    #[error("failed to persist price set: {0:#}")]
    Persist(anyhow::Error),
}
