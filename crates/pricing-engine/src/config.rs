// Configuration loading and parsing (pricing.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::error::ConfigurationError;
use crate::valuation::budget::{
    BudgetConfig, CapStructure, DEFAULT_CURVE_EXPONENT, DEFAULT_USAGE_TARGET,
};
use crate::valuation::category::LeagueScoringConfig;
use crate::valuation::normalize::SeasonWeights;

/// Default lifetime of cached pricing data.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error(transparent)]
    Invalid(#[from] ConfigurationError),
}

// ---------------------------------------------------------------------------
// pricing.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    pub league: LeagueSection,
    pub budget: BudgetSection,
    #[serde(default)]
    pub valuation: ValuationSection,
    /// When present, replaces the scoring selection fetched with the data.
    #[serde(default)]
    pub scoring: Option<LeagueScoringConfig>,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub data: DataSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueSection {
    pub name: String,
    /// Identifier used to look the league up in the data source. Defaults to
    /// `name`.
    #[serde(default)]
    pub id: Option<String>,
    pub num_teams: u32,
    pub roster_size: u32,
}

impl LeagueSection {
    pub fn league_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// Either `salary_cap` or `draft_cap` (+ optional `season_cap`) must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct BudgetSection {
    #[serde(default)]
    pub salary_cap: Option<u32>,
    #[serde(default)]
    pub draft_cap: Option<u32>,
    #[serde(default)]
    pub season_cap: Option<u32>,
    pub min_salary: u32,
    pub salary_increment: u32,
    #[serde(default = "default_usage_target")]
    pub draft_cap_usage_target: f64,
    #[serde(default)]
    pub rookie_price: Option<u32>,
}

fn default_usage_target() -> f64 {
    DEFAULT_USAGE_TARGET
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValuationSection {
    #[serde(default)]
    pub season_weights: SeasonWeights,
    #[serde(default = "default_curve_exponent")]
    pub curve_exponent: f64,
}

fn default_curve_exponent() -> f64 {
    DEFAULT_CURVE_EXPONENT
}

impl Default for ValuationSection {
    fn default() -> Self {
        ValuationSection {
            season_weights: SeasonWeights::default(),
            curve_exponent: DEFAULT_CURVE_EXPONENT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl CacheSection {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    #[default]
    Json,
    Sqlite,
}

/// `source` picks where pricing input is read from. Finalized price sets are
/// always written to `database`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub source: DataSourceKind,
    /// Directory of `<league_id>.json` files.
    pub path: String,
    /// SQLite database file.
    pub database: String,
}

impl Default for DataSection {
    fn default() -> Self {
        DataSection {
            source: DataSourceKind::Json,
            path: "data".into(),
            database: "pricing.db".into(),
        }
    }
}

impl PricingConfig {
    /// Assemble the allocator's budget from the `[league]`, `[budget]` and
    /// `[valuation]` sections.
    pub fn budget_config(&self) -> Result<BudgetConfig, ConfigError> {
        let b = &self.budget;
        let cap = match (b.salary_cap, b.draft_cap) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::ValidationError {
                    field: "budget.salary_cap".into(),
                    message: "set either salary_cap or draft_cap, not both".into(),
                });
            }
            (Some(salary_cap), None) => {
                if b.season_cap.is_some() {
                    return Err(ConfigError::ValidationError {
                        field: "budget.season_cap".into(),
                        message: "season_cap requires draft_cap".into(),
                    });
                }
                CapStructure::Single { salary_cap }
            }
            (None, Some(draft_cap)) => CapStructure::Dual {
                draft_cap,
                season_cap: b.season_cap.unwrap_or(0),
            },
            (None, None) => {
                return Err(ConfigError::ValidationError {
                    field: "budget.salary_cap".into(),
                    message: "one of salary_cap or draft_cap is required".into(),
                });
            }
        };

        Ok(BudgetConfig {
            cap,
            min_salary: b.min_salary,
            salary_increment: b.salary_increment,
            draft_cap_usage_target: b.draft_cap_usage_target,
            num_teams: self.league.num_teams,
            roster_size: self.league.roster_size,
            rookie_price: b.rookie_price,
            curve_exponent: self.valuation.curve_exponent,
        })
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate a pricing config file.
pub fn load_config(path: &Path) -> Result<PricingConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    parse_config(&text, path)
}

/// Parse and validate config text. `path` is only used in error messages.
pub fn parse_config(text: &str, path: &Path) -> Result<PricingConfig, ConfigError> {
    let config: PricingConfig = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &PricingConfig) -> Result<(), ConfigError> {
    if config.league.name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "league.name".into(),
            message: "must not be empty".into(),
        });
    }

    // Budget rules are shared with the engine.
    config.budget_config()?.validate()?;

    let w = &config.valuation.season_weights;
    let weight_fields: &[(&str, f64)] = &[
        ("valuation.season_weights.current", w.current),
        ("valuation.season_weights.prior", w.prior),
        ("valuation.season_weights.two_years_ago", w.two_years_ago),
    ];
    for (name, val) in weight_fields {
        if !val.is_finite() || *val < 0.0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be >= 0, got {val}"),
            });
        }
    }
    if w.current + w.prior + w.two_years_ago <= 0.0 {
        return Err(ConfigError::ValidationError {
            field: "valuation.season_weights".into(),
            message: "at least one season weight must be > 0".into(),
        });
    }

    if let Some(scoring) = &config.scoring {
        // No pool yet, so only structural checks apply here.
        scoring.validate(&[])?;
    }

    if config.cache.ttl_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "cache.ttl_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
