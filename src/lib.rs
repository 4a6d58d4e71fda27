// src/lib.rs
//
// Serial bridge: one process owns a serial device, accepts TCP connections,
// and multiplexes bytes between them. Serial output is echoed to the console
// and broadcast to every client; client input is forwarded to the device one
// complete line at a time.

#[macro_use]
mod logging;

pub mod bridge;
pub mod cli;
pub mod io;
pub mod linebuf;
pub mod settings;

pub use bridge::Bridge;
pub use linebuf::LineBuf;
