//! Inbound-event context.
//!
//! Applies raw push messages from the transport to the engine one at a time, in
//! arrival order. A message that fails to decode or apply is logged and discarded;
//! it never stops the loop.
use crate::engine::{ChainEngine, EventOutcome};
use crossbeam_channel::{Receiver, select};
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Consumer of the inbound message stream.
pub struct InboundListener;

impl InboundListener {
    /// Spawn the listener on its own thread.
    pub fn start(
        engine: Arc<ChainEngine>,
        inbound: Receiver<String>,
        shutdown: Receiver<()>,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            let processed = Self::run(&engine, inbound, shutdown);
            info!("Inbound listener stopping after {} messages", processed);
        })
    }

    /// Apply messages until shutdown or until the transport closes its side.
    /// Returns the number of messages received.
    pub fn run(engine: &ChainEngine, inbound: Receiver<String>, shutdown: Receiver<()>) -> usize {
        let mut processed = 0;
        loop {
            select! {
                recv(shutdown) -> _ => break,
                recv(inbound) -> msg => match msg {
                    Ok(text) => {
                        processed += 1;
                        match engine.submit_raw(&text) {
                            Ok(EventOutcome::Dropped) => debug!("Dropped message: {}", text),
                            Ok(outcome) => debug!("Applied message: {:?}", outcome),
                            Err(e) => warn!("Discarding inbound message: {}", e),
                        }
                    }
                    Err(_) => break,
                },
            }
        }
        processed
    }
}
