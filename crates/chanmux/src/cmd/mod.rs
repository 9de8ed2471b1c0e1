use clap::{Args, Subcommand};
use std::path::PathBuf;

use chanmux_mux::MuxConfig;
use chanmux_transport::Endpoint;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod bench;
pub mod echo;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve an endpoint, echoing every channel's bytes back.
    Echo(EchoArgs),
    /// Open one session, send a payload and optionally read the echo.
    Send(SendArgs),
    /// Measure throughput against an echo server.
    Bench(BenchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Bench(args) => bench::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Multiplexer tuning shared by every command. Unset values use the defaults.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct MuxArgs {
    /// Outbound buffer size in bytes, shared by all channels.
    #[arg(long, value_name = "BYTES")]
    pub send_buffer_size: Option<usize>,
    /// Inbound buffer size in bytes, per channel.
    #[arg(long, value_name = "BYTES")]
    pub recv_buffer_size: Option<usize>,
    /// Largest payload per frame.
    #[arg(long, value_name = "BYTES")]
    pub frame_size: Option<u32>,
}

impl MuxArgs {
    pub fn config(&self) -> MuxConfig {
        MuxConfig {
            send_buffer_size: self.send_buffer_size.unwrap_or(0),
            recv_buffer_size: self.recv_buffer_size.unwrap_or(0),
            max_frame_size: self.frame_size.unwrap_or(0),
        }
        .normalized()
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Endpoint to bind (unix:<path>, tcp:<host:port>, <path> or <host:port>).
    pub endpoint: Endpoint,
    #[command(flatten)]
    pub mux: MuxArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to.
    pub endpoint: Endpoint,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Read back as many bytes as were sent and print them.
    #[arg(long)]
    pub wait: bool,
    #[command(flatten)]
    pub mux: MuxArgs,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Endpoint of an echo server.
    pub endpoint: Endpoint,
    /// Number of channels driven concurrently.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub channels: u16,
    /// Bytes pushed through each channel.
    #[arg(long, default_value_t = 1024 * 1024)]
    pub bytes: usize,
    #[command(flatten)]
    pub mux: MuxArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
