//! Periodic volatility recomputation.
//!
//! Volatility depends on two independently arriving inputs, the underlying price and
//! the option quote. The loop refreshes bid/ask volatility of every ladder leg on a
//! fixed interval, whether or not a message arrived for that leg.
//!
//! Ticks come from a channel: `spawn` uses a crossbeam `tick` at the configured
//! interval, tests drive `run` with their own channel. The loop stops when the
//! shutdown channel fires or disconnects.
use crate::engine::ChainEngine;
use crossbeam_channel::{Receiver, select, tick};
use log::{debug, error, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Timer context driving `ChainEngine::recompute_volatilities`.
pub struct RecomputeLoop;

impl RecomputeLoop {
    /// Spawn the loop on its own thread, ticking at the engine's recompute interval.
    pub fn spawn(engine: Arc<ChainEngine>, shutdown: Receiver<()>) -> JoinHandle<()> {
        let ticks = tick(engine.config().recompute_interval);
        thread::spawn(move || Self::run(&engine, ticks, shutdown))
    }

    /// Recompute on every tick until shutdown or until the tick source closes.
    pub fn run(engine: &ChainEngine, ticks: Receiver<Instant>, shutdown: Receiver<()>) {
        info!("Recomputation loop started");
        loop {
            select! {
                recv(shutdown) -> _ => break,
                recv(ticks) -> tick => match tick {
                    Ok(_) => match engine.recompute_volatilities() {
                        Ok(refreshed) => debug!("Refreshed volatilities of {} legs", refreshed),
                        Err(e) => error!("Volatility recomputation failed: {}", e),
                    },
                    Err(_) => break,
                },
            }
        }
        info!("Recomputation loop stopping...");
    }
}
