//! Result type alias shared across the workspace.
//!
//! This module defines a convenient alias that defaults the error type to the
//! common `ChainError`, so functions can simply return `Result<T>`.
use crate::error::ChainError;

/// Workspace-wide `Result` alias with `ChainError` as the default error.
pub type Result<T, E = ChainError> = std::result::Result<T, E>;
