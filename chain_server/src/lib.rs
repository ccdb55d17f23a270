//! Option chain live model.
//!
//! Keeps an option chain of one series synchronised with an exchange push feed and
//! derives implied volatilities for every option on a strike ladder around the
//! underlying price:
//!
//! - `engine`: model store and event correlator, the only owner of the chain state;
//! - `model`: chain data, strike ladder, volatility solver, subscription registry, clock;
//! - `recompute`: timer context refreshing bid/ask volatilities;
//! - `inbound`: context applying push messages in arrival order;
//! - `snapshot_server`: TCP endpoint serving `model` and `chart` views;
//! - `simulator`: simulated exchange standing in for the push transport;
//! - `config`, `args`: immutable parameters and their CLI form.
#![warn(missing_docs)]

pub mod args;
pub mod config;
pub mod engine;
pub mod inbound;
pub mod model;
pub mod recompute;
pub mod simulator;
pub mod snapshot_server;

pub use config::{ChainConfig, RetentionPolicy};
pub use engine::{ChainEngine, EventOutcome};
