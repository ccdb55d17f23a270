//! Option chain server.
//!
//! Loads the option series listing, then wires together the building blocks of the
//! live model:
//!
//! - `ExchangeSimulator`: drains subscribe requests issued by the engine and pushes
//!   synthetic quote and instrument messages back.
//! - `InboundListener`: applies push messages to the engine in arrival order.
//! - `RecomputeLoop`: refreshes bid/ask volatilities on the configured interval.
//! - `SnapshotServer`: TCP endpoint answering `model` and `chart` view requests.
//!
//! Usage example (CLI):
//! ```bash
//! chain_server --expiry 2026-12-17T18:50:00+03:00 --series ./data/series.json --retention release
//! ```
//!
//! Shutdown: Ctrl+C drops the shared shutdown sender, which wakes every `select!` loop;
//! the loops are then joined. The snapshot listener thread is left to process exit.
use chain_common::net::addr;
use chain_common::series::{OptionSeries, SeriesParser};
use chain_common::{ChainError, Result};
use chain_server::args::{Args, normalize_path};
use chain_server::engine::ChainEngine;
use chain_server::inbound::InboundListener;
use chain_server::model::clock::SystemClock;
use chain_server::recompute::RecomputeLoop;
use chain_server::simulator::{ExchangeSimulator, SimulatorConfig};
use chain_server::snapshot_server::SnapshotServer;
use chain_server::ChainConfig;
use clap::Parser;
use crossbeam_channel::{bounded, unbounded};
use log::{error, info};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let config = ChainConfig::try_from(&args)?;

    let series_path = normalize_path(&args.series);
    let file = File::open(&series_path).map_err(|e| {
        ChainError::Config(format!("cannot open series {}: {}", series_path.display(), e))
    })?;
    let series = OptionSeries::parse_from_reader(BufReader::new(file))?;
    info!(
        "Loaded {} listed contracts from {}",
        series.len(),
        series_path.display()
    );

    let (outbound_tx, outbound_rx) = unbounded();
    let (inbound_tx, inbound_rx) = unbounded::<String>();
    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

    let simulator = ExchangeSimulator::new(
        SimulatorConfig {
            underlying_code: config.underlying_code.clone(),
            initial_price: args.simulator_price,
            expiry: config.expiry,
            interval: Duration::from_millis(args.simulator_interval_ms.max(1)),
        },
        &series,
    );
    let engine = Arc::new(ChainEngine::new(
        config,
        series,
        Arc::new(SystemClock),
        outbound_tx,
    ));

    let simulator = simulator.start(outbound_rx, inbound_tx, shutdown_rx.clone());
    let inbound = InboundListener::start(Arc::clone(&engine), inbound_rx, shutdown_rx.clone());
    let recompute = RecomputeLoop::spawn(Arc::clone(&engine), shutdown_rx);

    let snapshot_server = SnapshotServer::new(&addr("0.0.0.0", args.snapshot_port))?;
    let snapshot_engine = Arc::clone(&engine);
    thread::spawn(move || {
        if let Err(e) = snapshot_server.serve(snapshot_engine) {
            error!("Snapshot endpoint failed: {}", e);
        }
    });

    engine.subscribe_underlying()?;

    let (signal_tx, signal_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = signal_tx.try_send(());
    })
    .map_err(|e| ChainError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;

    info!("Option chain server is running. Press Ctrl+C to exit.");
    signal_rx
        .recv()
        .map_err(|e| ChainError::ChannelRecv(e.to_string()))?;
    info!("Ctrl+C received. Shutting down...");

    drop(shutdown_tx);
    for (name, handle) in [
        ("simulator", simulator),
        ("inbound", inbound),
        ("recompute", recompute),
    ] {
        if handle.join().is_err() {
            error!("The {} thread panicked", name);
        }
    }
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
