//! Core data types for option scanning
//!
//! Defines fundamental types:
//! - OptionContract / OptionChain: what is listed
//! - MarketSnapshot / PricePoint: valuation inputs
//! - ScanRequest / ComparisonRecord: scan input and output rows

pub mod error;
pub mod market;
pub mod option;
pub mod record;

pub use error::*;
pub use market::*;
pub use option::*;
pub use record::*;
