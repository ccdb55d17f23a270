//!
//! Common types and utilities shared by the option chain server and dashboard client.
//!
//! This crate aggregates:
//! - `error`: unified error type `ChainError` used across the workspace.
//! - `result`: handy `Result<T, ChainError>` alias.
//! - `option_kind`: call/put kind of an option contract.
//! - `series`: the listed contracts of one option series and their parser.
//! - `protocol`: subscribe requests and push messages exchanged with the exchange.
//! - `snapshot`: read-only model and chart views served to dashboards.
//! - `net`: networking constants and the snapshot view selector.
#![warn(missing_docs)]
pub mod error;
pub mod net;
pub mod option_kind;
pub mod protocol;
pub mod result;
pub mod series;
pub mod snapshot;

pub use error::ChainError;
pub use option_kind::OptionKind;
pub use result::Result;
