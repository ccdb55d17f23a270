//! Fetching views from the snapshot endpoint over TCP.
//!
//! One request per connection: the view name is written, the write side is closed and
//! the whole response is read until the server closes.
use chain_common::net::{SnapshotView, addr};
use chain_common::snapshot::{ChainSnapshot, ChartData};
use chain_common::{ChainError, Result};
use log::debug;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Client of the snapshot endpoint.
pub struct SnapshotFetcher {
    address: String,
}

impl SnapshotFetcher {
    pub fn new(server_ip: &str, port: u16) -> Self {
        let server_ip = server_ip.trim().replace('"', "");
        Self {
            address: addr(&server_ip, port),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Raw JSON of `view`. A server-side error body becomes `ChainError::Format`.
    pub fn fetch(&self, view: SnapshotView) -> Result<Value> {
        let mut stream = TcpStream::connect(&self.address)
            .map_err(|e| ChainError::Format(format!("Failed to connect to server: {}", e)))?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        debug!("Requesting {} view from {}", view, self.address);
        stream.write_all(format!("{}\n", view).as_bytes())?;
        stream.shutdown(Shutdown::Write)?;

        let mut body = String::new();
        stream.read_to_string(&mut body)?;
        let value: Value = serde_json::from_str(&body)?;
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(ChainError::Format(message.to_string()));
        }
        Ok(value)
    }

    /// Volatility chart; `None` until the server has an underlying price.
    pub fn chart(&self) -> Result<Option<ChartData>> {
        Ok(serde_json::from_value(self.fetch(SnapshotView::Chart)?)?)
    }

    /// Full model snapshot.
    pub fn model(&self) -> Result<ChainSnapshot> {
        Ok(serde_json::from_value(self.fetch(SnapshotView::Model)?)?)
    }
}
