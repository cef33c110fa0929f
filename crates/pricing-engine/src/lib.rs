// Library root: re-exports all modules so integration tests and the CLI can
// access the crate's public API.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod player;
pub mod price_set;
pub mod session;
pub mod source;
pub mod valuation;

pub use error::{AdjustmentError, ConfigurationError, DataFetchError, PricingError};
pub use price_set::{PriceEntry, PriceSet};
pub use valuation::adjust::{apply_adjustment, AdjustmentKind, AdjustmentRequest};
pub use valuation::generate_prices;
