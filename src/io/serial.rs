// src/io/serial.rs
//
// Serial endpoint: port configuration, the blocking read/write pump, and
// port enumeration. The pump owns the only handle to the device; everything
// else talks to it through channels.

use std::io::{Read, Write};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{DataBits, Parity as SpParity, SerialPort, StopBits};
use tokio::sync::mpsc;

use super::{BridgeEvent, IoError, TransmitRequest, SERIAL_READ_CHUNK};

/// Read timeout on the serial port. Keeps the blocking pump responsive to
/// transmit requests and shutdown while the device is quiet.
const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(100);

// ============================================================================
// Configuration
// ============================================================================

/// Parity setting for serial port configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl Default for Parity {
    fn default() -> Self {
        Parity::None
    }
}

impl std::str::FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Parity::None),
            "odd" => Ok(Parity::Odd),
            "even" => Ok(Parity::Even),
            other => Err(format!("Unknown parity '{}', expected none/odd/even", other)),
        }
    }
}

/// Serial device configuration.
#[derive(Clone, Debug)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl SerialConfig {
    fn serialport_data_bits(&self) -> DataBits {
        match self.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    fn serialport_stop_bits(&self) -> StopBits {
        match self.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }

    fn serialport_parity(&self) -> SpParity {
        match self.parity {
            Parity::None => SpParity::None,
            Parity::Odd => SpParity::Odd,
            Parity::Even => SpParity::Even,
        }
    }
}

/// Open the configured serial device.
///
/// Returns `IoError` for typed error handling; failure here is fatal for
/// the bridge (there is no partial startup state to clean up).
pub fn open_serial_port(config: &SerialConfig) -> Result<Box<dyn SerialPort>, IoError> {
    serialport::new(&config.port, config.baud_rate)
        .data_bits(config.serialport_data_bits())
        .stop_bits(config.serialport_stop_bits())
        .parity(config.serialport_parity())
        .timeout(SERIAL_READ_TIMEOUT)
        .open()
        .map_err(|e| IoError::open(&config.port, e.to_string()))
}

// ============================================================================
// Blocking Pump
// ============================================================================

/// Blocking serial pump. Run on a dedicated blocking task.
///
/// Each iteration drains pending transmit requests, then reads whatever
/// bytes are available (bounded by the port timeout) and forwards them to
/// the hub. Generic over the transport so tests can inject a double; the
/// real device is a `Box<dyn SerialPort>`, which reads with `TimedOut`
/// when quiet.
///
/// The pump exits when the transmit channel closes (hub shut down), on
/// end-of-stream, or on the first read/write error - serial failure mid-run
/// is fatal by design, there is no reconnect.
pub fn run_serial_io<T: Read + Write>(
    mut port: T,
    device: String,
    transmit_rx: std_mpsc::Receiver<TransmitRequest>,
    tx: mpsc::Sender<BridgeEvent>,
) {
    let mut buf = [0u8; SERIAL_READ_CHUNK];

    loop {
        // Drain pending writes first so forwarded client lines are not
        // starved by a chatty device.
        loop {
            match transmit_rx.try_recv() {
                Ok(req) => {
                    if let Err(e) = port.write_all(&req.data).and_then(|_| port.flush()) {
                        let err = IoError::write(&device, e.to_string());
                        let _ = tx.blocking_send(BridgeEvent::SerialError(err.to_string()));
                        return;
                    }
                }
                Err(std_mpsc::TryRecvError::Empty) => break,
                Err(std_mpsc::TryRecvError::Disconnected) => {
                    let _ = tx.blocking_send(BridgeEvent::SerialEnded("stopped".to_string()));
                    return;
                }
            }
        }

        match port.read(&mut buf) {
            Ok(0) => {
                // EOF - device closed/disconnected
                let _ = tx.blocking_send(BridgeEvent::SerialEnded("disconnected".to_string()));
                return;
            }
            Ok(n) => {
                if tx
                    .blocking_send(BridgeEvent::SerialData(buf[..n].to_vec()))
                    .is_err()
                {
                    // Hub gone, nothing left to serve.
                    return;
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                // Timeout is expected for serial reads
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                let err = IoError::read(&device, e.to_string());
                let _ = tx.blocking_send(BridgeEvent::SerialError(err.to_string()));
                return;
            }
        }
    }
}

// ============================================================================
// Port Enumeration
// ============================================================================

/// Information about an available serial port
#[derive(Clone, Debug)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// List available serial ports.
///
/// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
/// The cu (calling unit) devices are non-blocking and preferred for outgoing
/// connections; the tty devices block on open waiting for carrier detect.
pub fn list_serial_ports() -> Result<Vec<SerialPortInfo>, String> {
    let ports =
        serialport::available_ports().map_err(|e| format!("Failed to enumerate ports: {}", e))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => {
                    ("USB".to_string(), info.manufacturer, info.product)
                }
                serialport::SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None, None),
                serialport::SerialPortType::PciPort => ("PCI".to_string(), None, None),
                serialport::SerialPortType::Unknown => ("Unknown".to_string(), None, None),
            };
            SerialPortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
            }
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(data_bits: u8, stop_bits: u8, parity: Parity) -> SerialConfig {
        SerialConfig {
            port: "/dev/null".to_string(),
            baud_rate: 115200,
            data_bits,
            stop_bits,
            parity,
        }
    }

    #[test]
    fn test_parity_default() {
        assert_eq!(Parity::default(), Parity::None);
    }

    #[test]
    fn test_parity_from_str() {
        assert_eq!("none".parse::<Parity>(), Ok(Parity::None));
        assert_eq!("Odd".parse::<Parity>(), Ok(Parity::Odd));
        assert_eq!("EVEN".parse::<Parity>(), Ok(Parity::Even));
        assert!("mark".parse::<Parity>().is_err());
    }

    #[test]
    fn test_data_bits_conversion() {
        assert!(matches!(
            config_with(5, 1, Parity::None).serialport_data_bits(),
            DataBits::Five
        ));
        assert!(matches!(
            config_with(7, 1, Parity::None).serialport_data_bits(),
            DataBits::Seven
        ));
        // Anything else falls back to eight
        assert!(matches!(
            config_with(9, 1, Parity::None).serialport_data_bits(),
            DataBits::Eight
        ));
    }

    #[test]
    fn test_stop_bits_conversion() {
        assert!(matches!(
            config_with(8, 2, Parity::None).serialport_stop_bits(),
            StopBits::Two
        ));
        assert!(matches!(
            config_with(8, 0, Parity::None).serialport_stop_bits(),
            StopBits::One
        ));
    }

    #[test]
    fn test_parity_conversion() {
        assert!(matches!(
            config_with(8, 1, Parity::Odd).serialport_parity(),
            SpParity::Odd
        ));
        assert!(matches!(
            config_with(8, 1, Parity::Even).serialport_parity(),
            SpParity::Even
        ));
    }
}
