use std::io::IsTerminal;
use std::time::Duration;

use chanmux_transport::Endpoint;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ListeningOutput<'a> {
    event: &'a str,
    endpoint: String,
}

/// Announce where the server is listening. Clients and tests read this line
/// to learn the actual endpoint (e.g. the port picked for `tcp:host:0`).
pub fn print_listening(endpoint: &Endpoint, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ListeningOutput {
                event: "listening",
                endpoint: endpoint.to_string(),
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("listening on {endpoint}");
        }
    }
}

#[derive(Serialize)]
pub struct SendReport {
    pub endpoint: String,
    pub channel_id: u16,
    pub bytes_sent: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

pub fn print_send(report: &SendReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(report)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ENDPOINT", "CHANNEL", "SENT", "RESPONSE"])
                .add_row(vec![
                    report.endpoint.clone(),
                    report.channel_id.to_string(),
                    report.bytes_sent.to_string(),
                    report.response.clone().unwrap_or_else(|| "-".to_string()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sent {} bytes to {} on channel {}",
                report.bytes_sent, report.endpoint, report.channel_id
            );
            if let Some(response) = &report.response {
                println!("response: {response}");
            }
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ChannelBench {
    pub channel_id: u16,
    pub bytes: usize,
    pub elapsed_ms: f64,
    pub mib_per_sec: f64,
    pub verified: bool,
}

#[derive(Serialize)]
struct BenchOutput<'a> {
    endpoint: String,
    channels: &'a [ChannelBench],
    total_bytes: usize,
    elapsed_ms: f64,
    mib_per_sec: f64,
}

pub fn print_bench(
    endpoint: &Endpoint,
    results: &[ChannelBench],
    elapsed: Duration,
    format: OutputFormat,
) {
    let total_bytes: usize = results.iter().map(|r| r.bytes).sum();
    let total_rate = mib_per_sec(total_bytes, elapsed);

    match format {
        OutputFormat::Json => {
            let out = BenchOutput {
                endpoint: endpoint.to_string(),
                channels: results,
                total_bytes,
                elapsed_ms: millis(elapsed),
                mib_per_sec: total_rate,
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "BYTES", "ELAPSED (ms)", "MiB/s", "VERIFIED"]);
            for r in results {
                table.add_row(vec![
                    r.channel_id.to_string(),
                    r.bytes.to_string(),
                    format!("{:.1}", r.elapsed_ms),
                    format!("{:.2}", r.mib_per_sec),
                    r.verified.to_string(),
                ]);
            }
            table.add_row(vec![
                "total".to_string(),
                total_bytes.to_string(),
                format!("{:.1}", millis(elapsed)),
                format!("{total_rate:.2}"),
                results.iter().all(|r| r.verified).to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for r in results {
                println!(
                    "channel={} bytes={} elapsed={:.1}ms rate={:.2}MiB/s verified={}",
                    r.channel_id, r.bytes, r.elapsed_ms, r.mib_per_sec, r.verified
                );
            }
            println!(
                "total bytes={total_bytes} elapsed={:.1}ms rate={total_rate:.2}MiB/s",
                millis(elapsed)
            );
        }
    }
}

pub fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

pub fn mib_per_sec(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    bytes as f64 / (1024.0 * 1024.0) / secs
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
