use std::io::{Read, Write};
use std::thread;
use std::time::Instant;

use chanmux_peer::Client;

use crate::cmd::BenchArgs;
use crate::exit::{io_error, peer_error, CliError, CliResult, DATA_INVALID, INTERNAL, SUCCESS};
use crate::output::{millis, mib_per_sec, print_bench, ChannelBench, OutputFormat};

pub fn run(args: BenchArgs, format: OutputFormat) -> CliResult<i32> {
    let client = Client::connect_with_config(&args.endpoint, args.mux.config())
        .map_err(|err| peer_error("connect failed", err))?;

    let started = Instant::now();
    let workers: Vec<_> = (0..args.channels)
        .map(|index| {
            let client = client.clone();
            let bytes = args.bytes;
            thread::spawn(move || bench_channel(&client, index, bytes))
        })
        .collect();

    let mut results = Vec::with_capacity(workers.len());
    for worker in workers {
        let result = worker
            .join()
            .map_err(|_| CliError::new(INTERNAL, "bench worker panicked"))??;
        results.push(result);
    }
    let elapsed = started.elapsed();
    results.sort_by_key(|r| r.channel_id);

    print_bench(&args.endpoint, &results, elapsed, format);

    if results.iter().all(|r| r.verified) {
        Ok(SUCCESS)
    } else {
        Err(CliError::new(DATA_INVALID, "echoed bytes did not match what was sent"))
    }
}

/// Push `bytes` through one session while reading the echo concurrently.
fn bench_channel(client: &Client, index: u16, bytes: usize) -> CliResult<ChannelBench> {
    let session = client
        .session()
        .map_err(|err| peer_error("open session failed", err))?;
    let channel = session
        .channel()
        .map_err(|err| io_error("open session failed", err))?;
    let data = pattern(index, bytes);

    let started = Instant::now();
    let echoed = thread::scope(|scope| {
        let writer = scope.spawn(|| {
            let mut sink = channel;
            sink.write_all(&data)
        });

        let mut source = channel;
        let mut echoed = vec![0u8; bytes];
        let read = source.read_exact(&mut echoed);

        let written = writer
            .join()
            .map_err(|_| CliError::new(INTERNAL, "bench writer panicked"))?;
        written.map_err(|err| io_error("bench write failed", err))?;
        read.map_err(|err| io_error("bench read failed", err))?;
        Ok::<_, CliError>(echoed)
    })?;
    let elapsed = started.elapsed();

    tracing::debug!(channel_id = channel.id(), bytes, "bench channel done");
    Ok(ChannelBench {
        channel_id: channel.id(),
        bytes,
        elapsed_ms: millis(elapsed),
        mib_per_sec: mib_per_sec(bytes, elapsed),
        verified: echoed == data,
    })
}

/// Deterministic per-channel bytes, so a crossed stream shows up as a mismatch.
fn pattern(index: u16, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u64 * 31 + u64::from(index) * 7) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_differ_between_channels() {
        assert_eq!(pattern(0, 16).len(), 16);
        assert_ne!(pattern(0, 64), pattern(1, 64));
        assert_eq!(pattern(3, 64), pattern(3, 64));
    }
}
