// src/io/mod.rs
//
// Endpoint layer: the serial device and client sockets, unified by the
// message types the bridge hub consumes. Each endpoint runs as its own task
// and reports through one mpsc channel; writes toward the serial device go
// through a single transmit channel into the blocking serial pump.

pub mod client;
mod error;
pub mod registry;
pub mod serial;

pub use client::{spawn_client, ClientHandle};
pub use error::IoError;
pub use registry::ClientRegistry;
pub use serial::{list_serial_ports, open_serial_port, Parity, SerialConfig};

use std::sync::mpsc as std_mpsc;

/// Stable per-connection identifier. Monotonically assigned by the registry
/// and never reused for the process lifetime.
pub type ClientId = u64;

/// Bytes read from the serial device per iteration.
pub const SERIAL_READ_CHUNK: usize = 256;

/// Bytes read from a client socket per iteration.
pub const CLIENT_READ_CHUNK: usize = 1024;

// ============================================================================
// Bridge Events
// ============================================================================

/// Message from an endpoint task to the bridge hub.
#[derive(Debug)]
pub enum BridgeEvent {
    /// Chunk read from the serial device.
    SerialData(Vec<u8>),
    /// Serial stream ended (reason). The bridge cannot run without its
    /// device, so the hub shuts down.
    SerialEnded(String),
    /// Serial read or write failed (message). Fatal, no reconnect.
    SerialError(String),
    /// Chunk read from a client socket.
    ClientData(ClientId, Vec<u8>),
    /// Client reached end-of-stream or failed (reason); remove it.
    ClientClosed(ClientId, String),
}

// ============================================================================
// Transmit Types
// ============================================================================

/// Write request for the serial device, sent into the blocking pump.
pub struct TransmitRequest {
    /// Bytes to write verbatim (for client traffic: one complete line).
    pub data: Vec<u8>,
}

/// Sender type for transmit requests (sync-safe, drained by the pump
/// between reads).
pub type TransmitSender = std_mpsc::Sender<TransmitRequest>;
