use std::io::{Read, Write};

use chanmux_peer::Client;

use crate::cmd::SendArgs;
use crate::exit::{io_error, peer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_send, OutputFormat, SendReport};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = load_payload(&args)?;

    let client = Client::connect_with_config(&args.endpoint, args.mux.config())
        .map_err(|err| peer_error("connect failed", err))?;
    let mut session = client
        .session()
        .map_err(|err| peer_error("open session failed", err))?;
    let channel_id = session
        .channel()
        .map_err(|err| io_error("open session failed", err))?
        .id();

    session
        .write_all(&payload)
        .and_then(|()| session.flush())
        .map_err(|err| io_error("send failed", err))?;
    tracing::debug!(channel_id, size = payload.len(), "payload sent");

    let response = if args.wait {
        let mut echoed = vec![0u8; payload.len()];
        session
            .read_exact(&mut echoed)
            .map_err(|err| io_error("receive failed", err))?;
        Some(response_text(&echoed))
    } else {
        None
    };

    print_send(
        &SendReport {
            endpoint: args.endpoint.to_string(),
            channel_id,
            bytes_sent: payload.len(),
            response,
        },
        format,
    );
    Ok(SUCCESS)
}

fn load_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return std::fs::read(path)
            .map_err(|err| io_error(&format!("read {} failed", path.display()), err));
    }
    Err(CliError::new(USAGE, "one of --data or --file is required"))
}

fn response_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::MuxArgs;

    fn args(data: Option<&str>) -> SendArgs {
        SendArgs {
            endpoint: "127.0.0.1:1".parse().expect("endpoint should parse"),
            data: data.map(str::to_string),
            file: None,
            wait: false,
            mux: MuxArgs::default(),
        }
    }

    #[test]
    fn data_payload_is_used_verbatim() {
        assert_eq!(load_payload(&args(Some("hi"))).expect("payload"), b"hi");
    }

    #[test]
    fn missing_payload_is_usage_error() {
        let err = load_payload(&args(None)).expect_err("payload should be required");
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn binary_response_is_summarized() {
        assert_eq!(response_text(b"ok"), "ok");
        assert_eq!(response_text(&[0xFF, 0x00]), "<binary 2 bytes>");
    }
}
