// tools/serial_client/main.rs
//
// Companion command-line client for the serial bridge. Connects to the
// bridge over TCP (or straight to a serial device), sends commands, and
// prints the response until the device prompt is seen or a timeout expires.

use std::io::{BufRead, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use clap::Parser;
use serialport::SerialPort;

/// Device prompt: a `>` immediately after a newline means the command
/// finished.
const PROMPT: u8 = b'>';

/// Timeout used when opportunistically draining buffered input.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

// ============================================================================
// Arguments
// ============================================================================

/// Serial client - send commands to a serial bridge or device.
///
/// Connects over TCP (--socket) or directly to a serial device (--serial),
/// sends the given command, and prints output until the prompt (`>`) is
/// received or the timeout expires. With no command, enters interactive
/// mode.
#[derive(Parser, Debug)]
#[command(name = "serial-client", version)]
struct Args {
    /// Host and port to connect to, separated by `:` (just `:port` for
    /// localhost)
    #[arg(long, value_name = "HOST:PORT", conflicts_with = "serial")]
    socket: Option<String>,

    /// The serial device to connect to
    #[arg(long, value_name = "DEVICE")]
    serial: Option<String>,

    /// Baudrate of the serial device
    #[arg(long, default_value_t = 115200)]
    baudrate: u32,

    /// Seconds to wait for the prompt after sending a command
    #[arg(long, default_value_t = 1.0)]
    timeout: f64,

    /// Command to run. Interactive mode is activated if no command is given.
    cmd: Vec<String>,
}

// ============================================================================
// Transport
// ============================================================================

/// Either side of the bridge looks the same from here: a byte stream with
/// timeout-bounded reads.
enum Transport {
    Tcp(TcpStream),
    Serial(Box<dyn SerialPort>),
}

impl Transport {
    /// Read available bytes, waiting at most `timeout`. Returns `Ok(0)`
    /// when nothing arrived in time.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
        match self {
            Transport::Tcp(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                match stream.read(buf) {
                    Ok(n) => Ok(n),
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        Ok(0)
                    }
                    Err(e) => Err(e),
                }
            }
            Transport::Serial(port) => {
                port.set_timeout(timeout)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                match port.read(buf) {
                    Ok(n) => Ok(n),
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            Transport::Tcp(stream) => stream.write_all(data),
            Transport::Serial(port) => port.write_all(data).and_then(|_| port.flush()),
        }
    }
}

fn split_host_and_port(host_colon_port: &str) -> Option<(String, u16)> {
    let (host, port) = host_colon_port.split_once(':')?;
    let port: u16 = port.parse().ok()?;
    let host = if host.is_empty() { "localhost" } else { host };
    Some((host.to_string(), port))
}

// ============================================================================
// Response Handling
// ============================================================================

/// Print response bytes until the prompt follows a newline, or `timeout`
/// expires. The prompt itself is not printed.
fn wait_for_response(transport: &mut Transport, timeout: Duration) -> std::io::Result<()> {
    let deadline = Instant::now() + timeout;
    let mut newline = false;
    let mut found_prompt = false;
    let mut byte = [0u8; 1];
    let stdout = std::io::stdout();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match transport.read_timeout(&mut byte, remaining.min(DRAIN_TIMEOUT))? {
            0 => continue,
            _ => {
                if byte[0] == PROMPT && newline {
                    found_prompt = true;
                    break;
                }
                newline = byte[0] == b'\n';
                let mut out = stdout.lock();
                out.write_all(&byte)?;
                out.flush()?;
            }
        }
    }

    if !found_prompt {
        if !newline {
            println!();
        }
        println!("Timeout before prompt was found. Perhaps increase timeout?");
    }
    Ok(())
}

/// Drain and print whatever the far side already buffered (output that
/// arrived between commands).
fn read_available_input(transport: &mut Transport) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    loop {
        let n = transport.read_timeout(&mut buf, DRAIN_TIMEOUT)?;
        if n == 0 {
            return Ok(());
        }
        let mut out = std::io::stdout().lock();
        out.write_all(&buf[..n])?;
        out.flush()?;
    }
}

fn send_command(transport: &mut Transport, cmd: &str, timeout: Duration) -> std::io::Result<()> {
    transport.write_all(format!("{}\n", cmd).as_bytes())?;
    wait_for_response(transport, timeout)
}

fn interactive(transport: &mut Transport, timeout: Duration) -> std::io::Result<()> {
    let stdin = std::io::stdin();
    loop {
        print!("{} ", PROMPT as char);
        std::io::stdout().flush()?;

        let mut cmd = String::new();
        if stdin.lock().read_line(&mut cmd)? == 0 {
            // EOF (ctrl+d)
            println!();
            return Ok(());
        }
        let cmd = cmd.trim_end_matches(['\r', '\n']);

        read_available_input(transport)?;
        send_command(transport, cmd, timeout)?;
    }
}

// ============================================================================
// Entry Point
// ============================================================================

fn main() {
    let args = Args::parse();
    let timeout = Duration::from_secs_f64(args.timeout);

    let mut transport = if let Some(ref socket) = args.socket {
        let (host, port) = match split_host_and_port(socket) {
            Some(t) => t,
            None => {
                eprintln!(
                    "Please specify target to connect to as '<host>:<port>', \
                     or just ':<port>' for localhost."
                );
                std::process::exit(1);
            }
        };
        match TcpStream::connect((host.as_str(), port)) {
            Ok(stream) => Transport::Tcp(stream),
            Err(e) => {
                eprintln!("Failed to connect to {}:{}: {}", host, port, e);
                std::process::exit(1);
            }
        }
    } else if let Some(ref device) = args.serial {
        match serialport::new(device, args.baudrate)
            .timeout(DRAIN_TIMEOUT)
            .open()
        {
            Ok(port) => Transport::Serial(port),
            Err(e) => {
                eprintln!("Failed to open {}: {}", device, e);
                std::process::exit(1);
            }
        }
    } else {
        eprintln!("Please specify either --socket or --serial.");
        std::process::exit(1);
    };

    let result = if args.cmd.is_empty() {
        println!("No command given. Entering interactive mode. Use ctrl+c or ctrl+d to exit.");
        interactive(&mut transport, timeout)
    } else {
        send_command(&mut transport, &args.cmd.join(" "), timeout)
    };

    if let Err(e) = result {
        eprintln!("Connection error: {}", e);
        std::process::exit(1);
    }
}
