use chain_common::ChainError;
use chain_common::net::SnapshotView;
use crate::engine::ChainEngine;
use log::{debug, error, info, warn};
use serde_json::json;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

/// How long a client may take to send its request.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP endpoint serving read-only views of the option chain.
///
/// Each connection carries one request: the view name (`model` or `chart`). The server
/// answers with the JSON body and closes the connection. Failures are handled per
/// connection, so a bad client never stops the listener.
pub struct SnapshotServer {
    /// The underlying TCP listening socket.
    pub(crate) socket: TcpListener,
}

impl SnapshotServer {
    /// Bind a new endpoint to the provided `bind_addr` (e.g., `0.0.0.0:8090`).
    pub fn new(bind_addr: &str) -> Result<Self, ChainError> {
        let socket = TcpListener::bind(bind_addr)?;
        Ok(Self { socket })
    }

    /// Address the endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ChainError> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocking loop that accepts connections and answers one view request on each.
    pub fn serve(self, engine: Arc<ChainEngine>) -> Result<(), ChainError> {
        info!("Snapshot endpoint is started on {}", self.socket.local_addr()?);

        for stream in self.socket.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(e) = handle_connection(&engine, stream) {
                        warn!("Snapshot request failed: {}", e);
                    }
                }
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
        Ok(())
    }
}

fn handle_connection(engine: &ChainEngine, mut stream: TcpStream) -> Result<(), ChainError> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let peer = stream.peer_addr()?;
    let mut buf = [0u8; 1024];
    let size = stream.read(&mut buf)?;
    let request = String::from_utf8_lossy(&buf[..size]);

    let body = match request.trim().parse::<SnapshotView>() {
        Ok(view) => {
            debug!("{} requested the {} view", peer, view);
            render(engine, view)?
        }
        Err(_) => serde_json::to_vec(&json!({
            "error": format!("unknown view {:?}", request.trim())
        }))?,
    };
    stream.write_all(&body)?;
    Ok(())
}

/// JSON body of `view`. The chart is `null` until the first underlying price.
pub fn render(engine: &ChainEngine, view: SnapshotView) -> Result<Vec<u8>, ChainError> {
    let body = match view {
        SnapshotView::Model => serde_json::to_vec_pretty(&engine.snapshot()?)?,
        SnapshotView::Chart => serde_json::to_vec_pretty(&engine.chart()?)?,
    };
    Ok(body)
}
