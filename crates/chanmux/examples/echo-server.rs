//! Minimal echo server: every channel gets its bytes back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send unix:/tmp/chanmux-echo-<pid>/echo.sock \
//!     --data hello --wait

use std::fs;
use std::io::{Read, Write};

use chanmux::peer::Server;
use chanmux::transport::Endpoint;
use chanmux::Channel;

fn echo(channel: &mut Channel) -> chanmux::peer::Result<()> {
    let mut buf = [0u8; 4096];
    let n = channel.read(&mut buf)?;
    eprintln!("channel {}: echoing {n} bytes", channel.id());
    channel.write_all(&buf[..n])?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("chanmux-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let endpoint = Endpoint::Unix(sock_dir.join("echo.sock"));

    let listener = endpoint.bind()?;
    eprintln!("Listening on {endpoint}");

    Server::new(echo).serve(&listener)?;
    Ok(())
}
