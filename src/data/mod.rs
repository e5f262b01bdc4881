//! Market data, rates and broker quotes
//!
//! Handles:
//! - Port traits the scan depends on
//! - Yahoo Finance for spot, expirations, chains and daily closes
//! - FRED for the risk-free rate
//! - Robinhood and IBKR Client Portal for live option marks
//! - JSON fixtures and local caching

mod http;

pub mod cache;
pub mod fixture;
pub mod fred;
pub mod ibkr;
pub mod ports;
pub mod robinhood;
pub mod session;
pub mod yahoo;

pub use cache::*;
pub use fixture::*;
pub use fred::*;
pub use ibkr::*;
pub use ports::*;
pub use robinhood::*;
pub use session::*;
pub use yahoo::*;
