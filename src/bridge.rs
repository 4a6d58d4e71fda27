// src/bridge.rs
//
// The multiplex hub: accepts client connections and moves bytes between the
// serial pump and every connected client. One task owns all shared state
// (the client registry and per-client line buffers); endpoint tasks reach it
// only through the event channel, so events are handled strictly in arrival
// order - a serial chunk is echoed and broadcast before any later client
// line is forwarded.

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::sync::mpsc as std_mpsc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::io::{
    serial::run_serial_io, spawn_client, BridgeEvent, ClientRegistry, IoError, TransmitRequest,
};

/// Event channel depth between endpoint tasks and the hub.
const EVENT_QUEUE: usize = 1024;

/// A bound listening socket, ready to bridge a serial transport.
pub struct Bridge {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Bridge {
    /// Bind the listening socket. Failure here is fatal at startup.
    pub async fn bind(bind: &str, port: u16) -> Result<Self, IoError> {
        let addr = format!("{}:{}", bind, port);
        let listener = TcpListener::bind((bind, port))
            .await
            .map_err(|e| IoError::bind(&addr, e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| IoError::bind(&addr, e.to_string()))?;
        Ok(Bridge {
            listener,
            local_addr,
        })
    }

    /// The actually bound address (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the bridge until the serial stream ends or fails.
    ///
    /// `port` is the serial transport (a `Box<dyn SerialPort>` in
    /// production); it is moved onto a blocking task and driven by
    /// `run_serial_io`. Client failures never end the loop - they only
    /// remove that client. A serial failure is fatal and returned.
    pub async fn run<T>(self, port: T, device: String) -> Result<(), String>
    where
        T: Read + Write + Send + 'static,
    {
        let listener = self.listener;

        let (event_tx, mut event_rx) = mpsc::channel::<BridgeEvent>(EVENT_QUEUE);
        // Unbounded on purpose: the hub must never block toward the pump
        // while the pump may be blocking toward the hub. There is no
        // backpressure in this bridge; a flood of client lines is bounded
        // only by what the serial device drains.
        let (transmit_tx, transmit_rx) = std_mpsc::channel::<TransmitRequest>();

        let serial_task = {
            let tx = event_tx.clone();
            let device = device.clone();
            tokio::task::spawn_blocking(move || run_serial_io(port, device, transmit_rx, tx))
        };

        let mut registry = ClientRegistry::new();
        let mut result = Ok(());

        loop {
            tokio::select! {
                conn = listener.accept() => match conn {
                    Ok((stream, addr)) => {
                        let id = registry.allocate_id();
                        let handle = spawn_client(id, stream, addr, event_tx.clone());
                        registry.insert(handle);
                        tlog!("[bridge] Client {} connected from {} ({} online)", id, addr, registry.len());
                    }
                    Err(e) => {
                        // Transient accept failures (e.g. EMFILE) leave the
                        // listener usable; keep serving existing clients.
                        tlog!("[bridge] Accept failed: {}", e);
                    }
                },
                event = event_rx.recv() => match event {
                    Some(BridgeEvent::SerialData(data)) => {
                        echo_to_console(&data);
                        for client in registry.iter() {
                            client.send(data.clone());
                        }
                    }
                    Some(BridgeEvent::ClientData(id, data)) => {
                        if let Some(client) = registry.get_mut(id) {
                            let discarded = client.linebuf.extend(&data);
                            if discarded > 0 {
                                tlog!(
                                    "[bridge] Client {} sent {} bytes without a newline, discarded",
                                    id, discarded
                                );
                            }
                            while let Some(line) = client.linebuf.take_line() {
                                if transmit_tx.send(TransmitRequest { data: line }).is_err() {
                                    // Pump gone; its terminal event is on the way.
                                    break;
                                }
                            }
                        }
                    }
                    Some(BridgeEvent::ClientClosed(id, reason)) => {
                        if registry.remove(id) {
                            tlog!("[bridge] Client {} removed: {} ({} online)", id, reason, registry.len());
                        }
                    }
                    Some(BridgeEvent::SerialEnded(reason)) => {
                        tlog!("[bridge] Serial stream ended: {}", reason);
                        if reason != "stopped" {
                            result = Err(format!("serial stream ended: {}", reason));
                        }
                        break;
                    }
                    Some(BridgeEvent::SerialError(error)) => {
                        tlog!("[bridge] {}", error);
                        result = Err(error);
                        break;
                    }
                    None => break,
                },
            }
        }

        // Closing the transmit channel stops the pump on its next iteration.
        drop(transmit_tx);
        let _ = serial_task.await;
        result
    }
}

/// Echo serial output to the operator console, decoded permissively
/// (undecodable bytes are substituted, never a failure).
fn echo_to_console(data: &[u8]) {
    print!("{}", String::from_utf8_lossy(data));
    let _ = std::io::stdout().flush();
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    /// In-memory serial double. Reads pop scripted chunks (timing out like a
    /// quiet port when none are queued); writes land in a shared buffer.
    #[derive(Clone)]
    struct MockSerial {
        reads: Arc<Mutex<VecDeque<Vec<u8>>>>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl MockSerial {
        fn new() -> Self {
            MockSerial {
                reads: Arc::new(Mutex::new(VecDeque::new())),
                written: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn push_read(&self, data: &[u8]) {
            self.reads.lock().unwrap().push_back(data.to_vec());
        }

        fn written(&self) -> Vec<u8> {
            self.written.lock().unwrap().clone()
        }
    }

    impl Read for MockSerial {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some(chunk) = self.reads.lock().unwrap().pop_front() {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                return Ok(n);
            }
            std::thread::sleep(Duration::from_millis(5));
            Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
        }
    }

    impl Write for MockSerial {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    async fn start_bridge() -> (SocketAddr, MockSerial) {
        let bridge = Bridge::bind("127.0.0.1", 0).await.unwrap();
        let addr = bridge.local_addr();
        let mock = MockSerial::new();
        let port = mock.clone();
        tokio::spawn(async move {
            let _ = bridge.run(port, "mock".to_string()).await;
        });
        (addr, mock)
    }

    async fn wait_for_written(mock: &MockSerial, expected: &[u8]) {
        for _ in 0..500 {
            if mock.written() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "serial writes never reached expected state: got {:?}, wanted {:?}",
            mock.written(),
            expected
        );
    }

    #[tokio::test]
    async fn test_ping_pong_broadcast() {
        let (addr, mock) = start_bridge().await;

        let mut c1 = TcpStream::connect(addr).await.unwrap();
        let mut c2 = TcpStream::connect(addr).await.unwrap();

        // C1's line reaches the serial device exactly once.
        c1.write_all(b"ping\n").await.unwrap();
        wait_for_written(&mock, b"ping\n").await;

        // Confirm C2 is registered before the device responds: its own
        // forwarded line proves its accept was processed.
        c2.write_all(b"noop\n").await.unwrap();
        wait_for_written(&mock, b"ping\nnoop\n").await;

        // Device output is broadcast to both clients, verbatim, once each.
        mock.push_read(b"pong\n");

        let mut got1 = [0u8; 5];
        let mut got2 = [0u8; 5];
        tokio::time::timeout(Duration::from_secs(5), c1.read_exact(&mut got1))
            .await
            .expect("c1 timed out")
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), c2.read_exact(&mut got2))
            .await
            .expect("c2 timed out")
            .unwrap();
        assert_eq!(&got1, b"pong\n");
        assert_eq!(&got2, b"pong\n");

        // No duplicate delivery.
        let mut extra = [0u8; 1];
        let res = tokio::time::timeout(Duration::from_millis(100), c1.read(&mut extra)).await;
        assert!(res.is_err(), "c1 received unexpected extra bytes");
    }

    #[tokio::test]
    async fn test_line_split_across_sends_forwards_once() {
        let (addr, mock) = start_bridge().await;

        let mut c = TcpStream::connect(addr).await.unwrap();
        c.write_all(b"AT\r").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mock.written(), b"");

        c.write_all(b"\n").await.unwrap();
        wait_for_written(&mock, b"AT\r\n").await;
    }

    #[tokio::test]
    async fn test_unterminated_data_never_reaches_serial() {
        let (addr, mock) = start_bridge().await;

        let mut c = TcpStream::connect(addr).await.unwrap();
        c.write_all(b"partial with no newline").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mock.written(), b"");

        // Disconnecting mid-line discards the buffered data; the bridge
        // keeps serving.
        drop(c);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut c2 = TcpStream::connect(addr).await.unwrap();
        c2.write_all(b"alive\n").await.unwrap();
        wait_for_written(&mock, b"alive\n").await;
    }

    #[tokio::test]
    async fn test_broadcast_skips_nothing_on_multiple_chunks() {
        let (addr, mock) = start_bridge().await;

        let mut c = TcpStream::connect(addr).await.unwrap();
        // Prove registration first.
        c.write_all(b"hi\n").await.unwrap();
        wait_for_written(&mock, b"hi\n").await;

        mock.push_read(b"alpha ");
        mock.push_read(b"beta\n");

        let mut got = [0u8; 11];
        tokio::time::timeout(Duration::from_secs(5), c.read_exact(&mut got))
            .await
            .expect("client timed out")
            .unwrap();
        assert_eq!(&got, b"alpha beta\n");
    }
}
