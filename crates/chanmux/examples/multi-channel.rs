//! Several channels over one socket pair, each with its own conversation.
//!
//! Run with:
//!   cargo run --example multi-channel

use std::os::unix::net::UnixStream;
use std::thread;

use chanmux::peer::{WireRead, WireWrite};
use chanmux::{Mux, MuxConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (a, b) = UnixStream::pair()?;
    let config = MuxConfig {
        max_frame_size: 64,
        ..MuxConfig::default()
    };
    let server = Mux::with_config(a, config)?;
    let client = Mux::with_config(b, config)?;

    let server_thread = thread::spawn(
        move || -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let mut handlers = Vec::new();
            for _ in 0..3 {
                let mut channel = server.accept()?;
                handlers.push(thread::spawn(move || {
                    let name = channel.read_string()?;
                    let reply = format!("[server] channel {} got {name:?}", channel.id());
                    channel.write_string(&reply)
                }));
            }
            for handler in handlers {
                handler.join().map_err(|_| "handler panicked")??;
            }
            // Keep the mux alive until every reply has gone out.
            server.flush()?;
            Ok(())
        },
    );

    let mut channels = Vec::new();
    for name in ["alpha", "beta", "gamma"] {
        let mut channel = client.open()?;
        channel.write_string(name)?;
        channels.push(channel);
    }

    for channel in &mut channels {
        println!("{}", channel.read_string()?);
    }

    server_thread
        .join()
        .map_err(|_| "server thread panicked")?
        .map_err(|err| err.to_string())?;
    Ok(())
}
