//! Chain dashboard: a TCP client that fetches views of the live option chain from the
//! server's snapshot endpoint and prints them to stdout. The `chart` view is printed as a
//! strike table of implied volatilities, the `model` view as pretty JSON.
//!
//! Usage example (CLI):
//! ```bash
//! chain_client --server-ip 192.168.0.10 --view chart --interval-ms 1000
//! ```
//!
//! Without `--interval-ms` the view is fetched once; otherwise it is refreshed until
//! Ctrl+C.
#![warn(missing_docs)]
mod args;
mod fetcher;
mod table;

use crate::args::Args;
use crate::fetcher::SnapshotFetcher;
use chain_common::net::SnapshotView;
use chain_common::{ChainError, Result};
use chrono::Local;
use clap::Parser;
use log::{error, info};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

/// Fetches `view` once and prints it.
fn print_view(fetcher: &SnapshotFetcher, view: SnapshotView) -> Result<()> {
    let stamp = Local::now().format("%H:%M:%S");
    match view {
        SnapshotView::Chart => match fetcher.chart()? {
            Some(chart) => println!("[{}] {}", stamp, table::render_chart(&chart)),
            None => println!("[{}] no underlying price yet", stamp),
        },
        SnapshotView::Model => {
            let model = fetcher.model()?;
            println!("[{}]\n{}", stamp, serde_json::to_string_pretty(&model)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| ChainError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    let fetcher = SnapshotFetcher::new(&args.server_ip, args.port);
    info!("Fetching the {} view from {}", args.view, fetcher.address());

    let Some(interval_ms) = args.interval_ms else {
        return print_view(&fetcher, args.view);
    };

    let interval = Duration::from_millis(interval_ms.max(1));
    while !shutdown.load(Ordering::Relaxed) {
        if let Err(e) = print_view(&fetcher, args.view) {
            error!("Fetch failed: {}", e);
        }
        thread::sleep(interval);
    }
    info!("Dashboard stopping...");
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
