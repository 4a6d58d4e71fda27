// src/cli.rs
//
// Command-line entry point for the bridge daemon: argument parsing, settings
// resolution, startup, and shutdown on interrupt.

use clap::Parser;

use crate::bridge::Bridge;
use crate::io::{self, Parity, SerialConfig};
use crate::settings::{self, BridgeSettings};

/// Serial bridge - share a serial device through a socket.
///
/// Data sent from clients is line buffered; everything the device emits is
/// echoed to stdout and broadcast to every connected client. Flags override
/// values from the settings file.
#[derive(Parser, Debug)]
#[command(name = "serial-bridge", version)]
pub struct Args {
    /// The serial device to read from
    device: Option<String>,

    /// Baudrate of the serial device [default: 115200]
    #[arg(long)]
    baudrate: Option<u32>,

    /// Data bits: 5-8 [default: 8]
    #[arg(long)]
    data_bits: Option<u8>,

    /// Stop bits: 1 or 2 [default: 1]
    #[arg(long)]
    stop_bits: Option<u8>,

    /// Parity: none, odd or even [default: none]
    #[arg(long)]
    parity: Option<Parity>,

    /// Address to bind server socket to [default: localhost]
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen for connections on [default: 5555]
    #[arg(long)]
    port: Option<u16>,

    /// Read defaults from a TOML settings file
    #[arg(long, value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    /// Mirror log output to a file
    #[arg(long, value_name = "FILE")]
    log_file: Option<std::path::PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

/// Fold command-line flags over file settings.
fn resolve(args: &Args, file: BridgeSettings) -> BridgeSettings {
    BridgeSettings {
        device: args.device.clone().or(file.device),
        baudrate: args.baudrate.unwrap_or(file.baudrate),
        data_bits: args.data_bits.unwrap_or(file.data_bits),
        stop_bits: args.stop_bits.unwrap_or(file.stop_bits),
        parity: args.parity.clone().unwrap_or(file.parity),
        bind: args.bind.clone().unwrap_or(file.bind),
        port: args.port.unwrap_or(file.port),
        log_file: args.log_file.clone().or(file.log_file),
    }
}

fn print_port_listing() {
    match io::list_serial_ports() {
        Ok(ports) if ports.is_empty() => println!("No serial ports found."),
        Ok(ports) => {
            for p in ports {
                let detail = match (p.manufacturer, p.product) {
                    (Some(m), Some(pr)) => format!(" - {} {}", m, pr),
                    (_, Some(pr)) => format!(" - {}", pr),
                    (Some(m), None) => format!(" - {}", m),
                    _ => String::new(),
                };
                println!("{}  [{}]{}", p.port_name, p.port_type, detail);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
pub async fn run() {
    let args = Args::parse();

    if args.list_ports {
        print_port_listing();
        return;
    }

    let file_settings = match &args.config {
        Some(path) => match settings::load_settings(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },
        None => BridgeSettings::default(),
    };
    let resolved = resolve(&args, file_settings);

    let device = match resolved.device {
        Some(d) => d,
        None => {
            eprintln!("No serial device given. Pass it as an argument or set it in the settings file.");
            std::process::exit(1);
        }
    };

    if let Some(ref path) = resolved.log_file {
        if let Err(e) = crate::logging::init_file_logging(path) {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }

    let serial_config = SerialConfig {
        port: device.clone(),
        baud_rate: resolved.baudrate,
        data_bits: resolved.data_bits,
        stop_bits: resolved.stop_bits,
        parity: resolved.parity,
    };

    // Fatal startup errors: no partial state to clean up, just report and exit.
    let port = match io::open_serial_port(&serial_config) {
        Ok(p) => p,
        Err(e) => {
            tlog!("[bridge] {}", e);
            std::process::exit(1);
        }
    };

    let bridge = match Bridge::bind(&resolved.bind, resolved.port).await {
        Ok(b) => b,
        Err(e) => {
            tlog!("[bridge] {}", e);
            std::process::exit(1);
        }
    };

    tlog!(
        "[bridge] Serving {} at {} baud on {}",
        device,
        resolved.baudrate,
        bridge.local_addr()
    );

    tokio::select! {
        result = bridge.run(port, device) => {
            if let Err(e) = result {
                tlog!("[bridge] Terminated: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tlog!("[bridge] Interrupted, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_settings() {
        let args = Args::parse_from([
            "serial-bridge",
            "/dev/ttyACM0",
            "--baudrate",
            "57600",
            "--parity",
            "odd",
        ]);
        let file = BridgeSettings {
            device: Some("/dev/ttyUSB9".to_string()),
            baudrate: 9600,
            port: 7777,
            ..BridgeSettings::default()
        };
        let resolved = resolve(&args, file);
        assert_eq!(resolved.device.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(resolved.baudrate, 57600);
        assert_eq!(resolved.parity, Parity::Odd);
        // File value survives where no flag was given.
        assert_eq!(resolved.port, 7777);
    }

    #[test]
    fn test_defaults_without_flags_or_file() {
        let args = Args::parse_from(["serial-bridge", "/dev/ttyUSB0"]);
        let resolved = resolve(&args, BridgeSettings::default());
        assert_eq!(resolved.baudrate, 115200);
        assert_eq!(resolved.bind, "localhost");
        assert_eq!(resolved.port, 5555);
    }
}
