use std::time::{Duration, Instant};

use ringbridge_io::{split_envelope, StreamId};
use ringbridge_relay::ShutdownSignal;
use ringbridge_transport::{UdpReceiver, MAX_DATAGRAM_SIZE};
use tracing::{debug, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, CollectArgs};
use crate::exit::{transport_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_datagram, OutputFormat};

const RECV_POLL: Duration = Duration::from_millis(200);

pub fn run(args: CollectArgs, format: OutputFormat) -> CliResult<i32> {
    let idle_timeout = args.idle_timeout.as_deref().map(parse_duration).transpose()?;

    let receiver =
        UdpReceiver::bind(args.bind).map_err(|err| transport_error("bind failed", err))?;
    receiver
        .set_read_timeout(Some(RECV_POLL))
        .map_err(|err| transport_error("bind failed", err))?;

    let stop = ShutdownSignal::new();
    install_ctrlc_handler(stop.clone())?;

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut printed = 0usize;
    let mut last_seen = Instant::now();

    while !stop.is_triggered() {
        let (len, from) = match receiver.recv(&mut buf) {
            Ok(Some(received)) => received,
            Ok(None) => {
                if let Some(limit) = idle_timeout {
                    if last_seen.elapsed() >= limit {
                        return Err(CliError::new(
                            TIMEOUT,
                            format!("no datagram received within {limit:?}"),
                        ));
                    }
                }
                continue;
            }
            Err(err) => return Err(transport_error("receive failed", err)),
        };
        last_seen = Instant::now();

        let (stream_id, body) = match split_envelope(&buf[..len]) {
            Ok(parts) => parts,
            Err(err) => {
                warn!(%from, len, error = %err, "ignoring datagram");
                continue;
            }
        };

        if !wanted(args.streams.as_deref(), &stream_id) {
            debug!(%stream_id, "filtered datagram");
            continue;
        }

        print_datagram(&stream_id, body, from, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    Ok(SUCCESS)
}

fn wanted(filter: Option<&[StreamId]>, stream_id: &StreamId) -> bool {
    filter.is_none_or(|streams| streams.contains(stream_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_filter_accepts_everything() {
        assert!(wanted(None, &StreamId::random()));
    }

    #[test]
    fn filter_matches_listed_streams_only() {
        let keep = StreamId::random();
        let filter = [keep];
        assert!(wanted(Some(&filter), &keep));
        assert!(!wanted(Some(&filter), &StreamId::random()));
    }
}
