use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ringbridge_io::{ChannelDirection, LocalIo, StreamId};
use ringbridge_relay::{BridgeConfig, BridgeSupervisor, ShutdownSignal};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, RunArgs};
use crate::exit::{relay_error, subsystem_error, CliResult, SUCCESS};
use crate::output::{print_startup, print_summary, OutputFormat};

const WAKE_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = resolve_config(&args)?;
    let run_for = args.run_for.as_deref().map(parse_duration).transpose()?;

    let io = Arc::new(
        LocalIo::initialize(config.io.clone())
            .map_err(|err| subsystem_error("region setup failed", err))?,
    );
    create_channels(&io, &args)?;

    let bridge = BridgeSupervisor::start(Arc::clone(&io), &config)
        .map_err(|err| relay_error("bridge start failed", err))?;
    print_startup(
        bridge.local_addr(),
        bridge.collector(),
        &config.io.region_name,
        &io.channels(),
        format,
    );

    let stop = ShutdownSignal::new();
    install_ctrlc_handler(stop.clone())?;

    let started = Instant::now();
    while !stop.wait_timeout(WAKE_INTERVAL) {
        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            info!("run time elapsed, stopping");
            break;
        }
    }

    let summary = bridge
        .shutdown()
        .map_err(|err| relay_error("bridge shutdown failed", err))?;
    print_summary(&summary, &io.ledger(), format);
    Ok(SUCCESS)
}

/// Defaults, then the config file, then flags and environment.
fn resolve_config(args: &RunArgs) -> CliResult<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::from_json_file(path)
            .map_err(|err| relay_error("config load failed", err))?,
        None => BridgeConfig::default(),
    };

    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(collector) = args.collector {
        config.collector_addr = collector;
    }
    if let Some(region) = &args.region {
        config.io.region_name = region.clone();
    }
    if let Some(size) = args.region_size {
        config.io.region_size = size;
    }
    if let Some(policy) = args.trailing_bytes {
        config.trailing_bytes = policy.into();
    }
    if let Some(interval) = &args.egress_interval {
        let interval = parse_duration(interval)?;
        config.egress_poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
    }

    config
        .validate()
        .map_err(|err| relay_error("invalid configuration", err))?;
    Ok(config)
}

fn create_channels(io: &LocalIo, args: &RunArgs) -> CliResult<()> {
    let inputs: BTreeSet<StreamId> = args
        .input
        .iter()
        .copied()
        .chain(args.loopback.iter().map(|(from, _)| *from))
        .collect();
    let outputs: BTreeSet<StreamId> = args
        .output
        .iter()
        .copied()
        .chain(args.loopback.iter().map(|(_, to)| *to))
        .collect();

    for id in inputs {
        io.create_channel(id, ChannelDirection::Input)
            .map_err(|err| subsystem_error("channel setup failed", err))?;
    }
    for id in outputs {
        io.create_channel(id, ChannelDirection::Output)
            .map_err(|err| subsystem_error("channel setup failed", err))?;
    }
    for (from, to) in &args.loopback {
        io.link(*from, *to)
            .map_err(|err| subsystem_error("loopback setup failed", err))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ringbridge_frame::TrailingBytes;

    use super::*;
    use crate::cmd::TrailingPolicy;

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            listen: None,
            collector: None,
            region: None,
            region_size: None,
            trailing_bytes: None,
            egress_interval: None,
            input: Vec::new(),
            output: Vec::new(),
            loopback: Vec::new(),
            run_for: None,
        }
    }

    #[test]
    fn flags_override_defaults() {
        let mut a = args();
        a.listen = Some("127.0.0.1:4000".parse().unwrap());
        a.region = Some("lab".to_string());
        a.trailing_bytes = Some(TrailingPolicy::CarryOver);
        a.egress_interval = Some("250ms".to_string());

        let config = resolve_config(&a).unwrap();
        assert_eq!(config.listen_addr.port(), 4000);
        assert_eq!(config.collector_addr.port(), 20788);
        assert_eq!(config.io.region_name, "lab");
        assert_eq!(config.trailing_bytes, TrailingBytes::CarryOver);
        assert_eq!(config.egress_poll_interval_ms, 250);
    }

    #[test]
    fn loopback_creates_both_ends() {
        let io = LocalIo::initialize(ringbridge_io::IoConfig::default()).unwrap();
        let from = StreamId::random();
        let to = StreamId::random();
        let mut a = args();
        a.input = vec![from];
        a.loopback = vec![(from, to)];

        create_channels(&io, &a).unwrap();
        let channels = io.channels();
        assert_eq!(channels.len(), 2);
        assert!(channels
            .iter()
            .any(|c| c.direction == ChannelDirection::Input && c.linked_to == Some(to)));
    }

    #[test]
    fn empty_region_name_is_rejected() {
        let mut a = args();
        a.region = Some(String::new());
        let config = resolve_config(&a).unwrap();
        let err = LocalIo::initialize(config.io).unwrap_err();
        assert_eq!(
            subsystem_error("region setup failed", err).code,
            crate::exit::CONFIG_INVALID
        );
    }
}
