use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use ringbridge_frame::TrailingBytes;
use ringbridge_io::StreamId;
use ringbridge_relay::ShutdownSignal;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod collect;
pub mod forward;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bridge over an in-process channel region.
    Run(RunArgs),
    /// Send one framed message to a bridge's ingress port.
    Forward(ForwardArgs),
    /// Receive and print datagrams sent by a bridge.
    Collect(CollectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Forward(args) => forward::run(args, format),
        Command::Collect(args) => collect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TrailingPolicy {
    /// Close the connection when bytes follow a complete frame.
    Reject,
    /// Keep surplus bytes as the start of the next frame.
    CarryOver,
}

impl From<TrailingPolicy> for TrailingBytes {
    fn from(policy: TrailingPolicy) -> Self {
        match policy {
            TrailingPolicy::Reject => TrailingBytes::Reject,
            TrailingPolicy::CarryOver => TrailingBytes::CarryOver,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON configuration file; flags and environment override its values.
    #[arg(long, value_name = "FILE", env = "RINGBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Ingress listen address (default 0.0.0.0:20787).
    #[arg(long, value_name = "ADDR", env = "RINGBRIDGE_LISTEN")]
    pub listen: Option<SocketAddr>,
    /// Collector datagram endpoint (default 127.0.0.1:20788).
    #[arg(long, value_name = "ADDR", env = "RINGBRIDGE_COLLECTOR")]
    pub collector: Option<SocketAddr>,
    /// Channel region name.
    #[arg(long, value_name = "NAME", env = "RINGBRIDGE_REGION")]
    pub region: Option<String>,
    /// Channel region size in bytes.
    #[arg(long, value_name = "BYTES", env = "RINGBRIDGE_REGION_SIZE")]
    pub region_size: Option<usize>,
    /// Handling of bytes past the end of a frame.
    #[arg(long, value_name = "POLICY", env = "RINGBRIDGE_TRAILING_BYTES")]
    pub trailing_bytes: Option<TrailingPolicy>,
    /// Egress poll interval (e.g. 1s, 200ms).
    #[arg(long, value_name = "DURATION")]
    pub egress_interval: Option<String>,
    /// Input streams to create (comma-separated UUIDs).
    #[arg(long, value_delimiter = ',', value_name = "UUID")]
    pub input: Vec<StreamId>,
    /// Output streams to create (comma-separated UUIDs).
    #[arg(long, value_delimiter = ',', value_name = "UUID")]
    pub output: Vec<StreamId>,
    /// Forward an input stream to an output stream (IN=OUT, repeatable).
    #[arg(long, value_name = "IN=OUT", value_parser = parse_link)]
    pub loopback: Vec<(StreamId, StreamId)>,
    /// Stop after this long instead of waiting for Ctrl+C.
    #[arg(long, value_name = "DURATION")]
    pub run_for: Option<String>,
}

#[derive(Args, Debug)]
pub struct ForwardArgs {
    /// Bridge ingress address.
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:20787")]
    pub addr: SocketAddr,
    /// Destination stream.
    #[arg(long, short = 's', value_name = "UUID")]
    pub stream_id: StreamId,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Largest frame the bridge accepts, header included.
    #[arg(long, default_value = "1024")]
    pub max_frame_size: usize,
    /// Connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Address to receive datagrams on.
    #[arg(long, value_name = "ADDR", default_value = "0.0.0.0:20788")]
    pub bind: SocketAddr,
    /// Only print these streams (comma-separated UUIDs).
    #[arg(long, value_delimiter = ',', value_name = "UUID")]
    pub streams: Option<Vec<StreamId>>,
    /// Exit after printing N datagrams.
    #[arg(long)]
    pub count: Option<usize>,
    /// Give up after this long without a datagram (e.g. 10s).
    #[arg(long, value_name = "DURATION")]
    pub idle_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_link(input: &str) -> Result<(StreamId, StreamId), String> {
    let (from, to) = input
        .split_once('=')
        .ok_or_else(|| format!("expected IN=OUT, got {input:?}"))?;
    let from = from.trim().parse::<StreamId>().map_err(|err| err.to_string())?;
    let to = to.trim().parse::<StreamId>().map_err(|err| err.to_string())?;
    Ok((from, to))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Trigger `stop` on Ctrl+C.
pub(crate) fn install_ctrlc_handler(stop: ShutdownSignal) -> CliResult<()> {
    ctrlc::set_handler(move || stop.trigger()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}
