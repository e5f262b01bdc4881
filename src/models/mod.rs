//! Pricing models
//!
//! Black-Scholes closed form for European calls and puts.

pub mod black_scholes;

pub use black_scholes::*;
