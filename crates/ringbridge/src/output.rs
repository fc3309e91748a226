use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ringbridge_io::{ChannelInfo, LedgerSnapshot, StreamId};
use ringbridge_relay::BridgeSummary;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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
struct DatagramOutput {
    stream_id: String,
    size: usize,
    payload: String,
    from: String,
    timestamp: String,
}

/// Print one collected datagram, already split into stream id and body.
pub fn print_datagram(stream_id: &StreamId, body: &[u8], from: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DatagramOutput {
                stream_id: stream_id.to_string(),
                size: body.len(),
                payload: payload_preview(body),
                from: from.to_string(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STREAM", "SIZE", "FROM", "PAYLOAD"])
                .add_row(vec![
                    stream_id.to_string(),
                    body.len().to_string(),
                    from.to_string(),
                    payload_preview(body),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "stream={} size={} from={} payload={}",
                stream_id,
                body.len(),
                from,
                payload_preview(body)
            );
        }
        OutputFormat::Raw => print_raw(body),
    }
}

#[derive(Serialize)]
struct StartupOutput<'a> {
    event: &'static str,
    listen: String,
    collector: &'a str,
    region: &'a str,
    channels: &'a [ChannelInfo],
}

/// Announce a started bridge and the channels of its region.
pub fn print_startup(
    listen: SocketAddr,
    collector: &str,
    region: &str,
    channels: &[ChannelInfo],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = StartupOutput {
                event: "started",
                listen: listen.to_string(),
                collector,
                region,
                channels,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            println!("listening on {listen}, sending to {collector}, region {region}");
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STREAM", "DIRECTION", "CAPACITY", "LINKED TO"]);
            for channel in channels {
                table.add_row(vec![
                    channel.stream_id.to_string(),
                    channel.direction.to_string(),
                    channel.capacity.to_string(),
                    channel
                        .linked_to
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("listen={listen} collector={collector} region={region}");
            for channel in channels {
                println!(
                    "  {} {} capacity={}",
                    channel.direction, channel.stream_id, channel.capacity
                );
            }
        }
    }
    let _ = std::io::stdout().flush();
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    event: &'static str,
    bridge: &'a BridgeSummary,
    buffers: &'a LedgerSnapshot,
}

/// Print the counters collected over a bridge run.
pub fn print_summary(summary: &BridgeSummary, ledger: &LedgerSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SummaryOutput {
                event: "stopped",
                bridge: summary,
                buffers: ledger,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in summary_rows(summary, ledger) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (name, value) in summary_rows(summary, ledger) {
                println!("{name}={value}");
            }
        }
    }
}

fn summary_rows(summary: &BridgeSummary, ledger: &LedgerSnapshot) -> Vec<(&'static str, u64)> {
    vec![
        ("connections_accepted", summary.connections_accepted),
        ("protocol_errors", summary.protocol_errors),
        ("frames_received", summary.frames_received),
        ("frames_dispatched", summary.frames_dispatched),
        ("frames_dropped", summary.frames_dropped()),
        ("datagrams_sent", summary.datagrams_sent),
        ("send_failures", summary.send_failures),
        ("buffers_released", summary.buffers_released),
        ("buffers_outstanding", ledger.outstanding()),
        ("buffers_leaked", ledger.leaked),
    ]
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_marks_binary_payloads() {
        assert_eq!(payload_preview(b"HELLO"), "HELLO");
        assert_eq!(payload_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
    }

    #[test]
    fn summary_rows_include_drop_total() {
        let summary = BridgeSummary {
            dropped_unknown_stream: 2,
            dropped_malformed: 1,
            ..BridgeSummary::default()
        };
        let rows = summary_rows(&summary, &LedgerSnapshot::default());
        assert!(rows.contains(&("frames_dropped", 3)));
    }
}
