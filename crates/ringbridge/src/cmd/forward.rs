use std::fs;

use ringbridge_frame::{FrameConfig, FrameWriter};
use ringbridge_io::{encode_envelope, ENVELOPE_HEADER_SIZE};
use ringbridge_transport::TcpIngressSocket;
use serde::Serialize;
use tracing::debug;

use crate::cmd::{parse_duration, ForwardArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct ForwardOutput {
    stream_id: String,
    payload_size: usize,
    frame_size: usize,
    addr: String,
}

pub fn run(args: ForwardArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let body = resolve_payload(&args)?;

    let mut envelope = Vec::with_capacity(ENVELOPE_HEADER_SIZE + body.len());
    encode_envelope(&args.stream_id, &body, &mut envelope);

    let config = FrameConfig {
        write_timeout: Some(timeout),
        ..FrameConfig::default()
    }
    .with_max_frame_size(args.max_frame_size);

    let stream = TcpIngressSocket::connect_timeout(args.addr, timeout)
        .map_err(|err| transport_error("connect failed", err))?;
    stream
        .set_nodelay(true)
        .map_err(|err| transport_error("connect failed", err))?;
    let mut writer = FrameWriter::with_config_stream(stream, config)
        .map_err(|err| frame_error("connect failed", err))?;
    writer
        .send(&envelope)
        .map_err(|err| frame_error("send failed", err))?;
    if let Err(err) = writer.get_ref().shutdown() {
        debug!(error = %err, "socket shutdown failed");
    }

    let out = ForwardOutput {
        stream_id: args.stream_id.to_string(),
        payload_size: envelope.len(),
        frame_size: envelope.len() + ringbridge_frame::HEADER_SIZE,
        addr: args.addr.to_string(),
    };
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "sent {} bytes to stream {} at {}",
            out.frame_size, out.stream_id, out.addr
        ),
        OutputFormat::Raw => {}
    }
    Ok(SUCCESS)
}

fn resolve_payload(args: &ForwardArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use ringbridge_io::StreamId;

    use super::*;

    fn args() -> ForwardArgs {
        ForwardArgs {
            addr: "127.0.0.1:20787".parse().unwrap(),
            stream_id: StreamId::random(),
            json: None,
            data: None,
            file: None,
            max_frame_size: 1024,
            timeout: "1s".to_string(),
        }
    }

    #[test]
    fn invalid_json_is_usage_error() {
        let mut a = args();
        a.json = Some("{not json".to_string());
        let err = resolve_payload(&a).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn data_is_sent_verbatim() {
        let mut a = args();
        a.data = Some("HELLO".to_string());
        assert_eq!(resolve_payload(&a).unwrap(), b"HELLO");
    }

    #[test]
    fn missing_payload_is_empty() {
        assert!(resolve_payload(&args()).unwrap().is_empty());
    }
}
