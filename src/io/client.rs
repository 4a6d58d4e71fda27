// src/io/client.rs
//
// Client endpoint: one reader task and one best-effort writer task per
// connection. The reader reports chunks and disconnects to the hub; the
// writer drains a bounded outbound queue so one slow peer never stalls the
// broadcast path.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::linebuf::LineBuf;

use super::{BridgeEvent, ClientId, CLIENT_READ_CHUNK};

/// Outbound queue depth per client. Serial chunks beyond this are dropped
/// for that client (best-effort delivery toward a peer that stopped
/// draining its socket).
const OUTBOUND_QUEUE: usize = 64;

// ============================================================================
// Client Handle
// ============================================================================

/// Hub-side handle for a connected client.
///
/// Holds the pieces the hub mutates: the outbound queue and this client's
/// line reassembly buffer. The socket itself lives in the reader/writer
/// tasks; dropping the handle closes the outbound queue, which ends the
/// writer task and releases the write half.
pub struct ClientHandle {
    pub id: ClientId,
    pub addr: SocketAddr,
    pub linebuf: LineBuf,
    outbound: mpsc::Sender<Vec<u8>>,
}

impl ClientHandle {
    /// Queue bytes toward the client. Best-effort: a full queue or a gone
    /// writer drops the payload rather than blocking the hub. A truly dead
    /// peer is reaped when its next read fails.
    pub fn send(&self, data: Vec<u8>) {
        let _ = self.outbound.try_send(data);
    }

    #[cfg(test)]
    pub fn stub(id: ClientId) -> Self {
        let (outbound, _rx) = mpsc::channel(1);
        ClientHandle {
            id,
            addr: "127.0.0.1:0".parse().unwrap(),
            linebuf: LineBuf::new(),
            outbound,
        }
    }
}

/// Split an accepted connection into its reader and writer tasks and return
/// the hub-side handle.
pub fn spawn_client(
    id: ClientId,
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::Sender<BridgeEvent>,
) -> ClientHandle {
    let (read_half, write_half) = stream.into_split();
    let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_QUEUE);

    tokio::spawn(run_client_writer(write_half, out_rx));
    tokio::spawn(run_client_reader(id, read_half, events));

    ClientHandle {
        id,
        addr,
        linebuf: LineBuf::new(),
        outbound: out_tx,
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Read loop for one client. A zero-length read or any error is
/// end-of-stream: report it and exit, the hub removes the client.
async fn run_client_reader(
    id: ClientId,
    mut read_half: OwnedReadHalf,
    events: mpsc::Sender<BridgeEvent>,
) {
    let mut buf = [0u8; CLIENT_READ_CHUNK];

    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                let _ = events
                    .send(BridgeEvent::ClientClosed(id, "disconnected".to_string()))
                    .await;
                return;
            }
            Ok(n) => {
                if events
                    .send(BridgeEvent::ClientData(id, buf[..n].to_vec()))
                    .await
                    .is_err()
                {
                    // Hub shut down
                    return;
                }
            }
            Err(e) => {
                let _ = events
                    .send(BridgeEvent::ClientClosed(id, format!("read error: {}", e)))
                    .await;
                return;
            }
        }
    }
}

/// Write loop for one client. Ends when the outbound queue closes (client
/// removed) or a write fails; a failed write is a pending disconnect that
/// the reader confirms, so it is swallowed here.
async fn run_client_writer(mut write_half: OwnedWriteHalf, mut outbound: mpsc::Receiver<Vec<u8>>) {
    while let Some(data) = outbound.recv().await {
        if write_half.write_all(&data).await.is_err() {
            return;
        }
    }
}
