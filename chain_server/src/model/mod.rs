//! Domain models and calculators of the option chain server.
//!
//! This module groups the data types and pure helpers used by the engine:
//! - `chain`: the chain aggregate: underlying feed, ladder, option legs.
//! - `ladder`: strike ladder calculation around the underlying price.
//! - `volatility`: Black-Scholes pricing and implied volatility solver.
//! - `registry`: subscription id to model location correlation.
//! - `clock`: injectable wall clock for time-to-expiry.

pub mod chain;
pub mod clock;
pub mod ladder;
pub mod registry;
pub mod volatility;
