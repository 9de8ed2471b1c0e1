use std::io::{Read, Write};
use std::sync::mpsc;
use std::thread;

use chanmux_mux::Channel;
use chanmux_peer::Server;
use chanmux_transport::Endpoint;

use crate::cmd::EchoArgs;
use crate::exit::{io_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listening, OutputFormat};

const ECHO_CHUNK_SIZE: usize = 16 * 1024;

pub fn run(args: EchoArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = args
        .endpoint
        .bind()
        .map_err(|err| transport_error("bind failed", err))?;
    let endpoint = listener.local_endpoint();
    tracing::info!(endpoint = %endpoint, "echo server listening");
    print_listening(&endpoint, format);

    let (stop_tx, stop_rx) = mpsc::channel();
    install_ctrlc_handler(stop_tx)?;

    let server = Server::new(echo_once).with_config(args.mux.config());
    thread::Builder::new()
        .name("chanmux-serve".to_string())
        .spawn(move || {
            if let Err(err) = server.serve(&listener) {
                tracing::error!(error = %err, "server stopped");
            }
        })
        .map_err(|err| io_error("failed to start server", err))?;

    let _ = stop_rx.recv();
    tracing::info!("shutting down");
    remove_socket_file(&endpoint);
    Ok(SUCCESS)
}

/// Echo one read's worth of bytes back on the same channel.
fn echo_once(channel: &mut Channel) -> chanmux_peer::Result<()> {
    let mut buf = [0u8; ECHO_CHUNK_SIZE];
    let n = channel.read(&mut buf)?;
    tracing::debug!(channel_id = channel.id(), size = n, "echoing");
    channel.write_all(&buf[..n])?;
    Ok(())
}

fn install_ctrlc_handler(stop: mpsc::Sender<()>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        let _ = stop.send(());
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

// The listener lives on the serve thread, which is never joined, so its drop
// does not get a chance to clean up.
fn remove_socket_file(endpoint: &Endpoint) {
    #[cfg(unix)]
    if let Endpoint::Unix(path) = endpoint {
        let _ = std::fs::remove_file(path);
    }
    #[cfg(not(unix))]
    let _ = endpoint;
}
