mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "ringbridge",
    version,
    about = "Bridge a length-prefixed TCP stream to shared-memory rings and a UDP collector"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";
    const B: &str = "6ba7b811-9dad-11d1-80b4-00c04fd430c8";

    #[test]
    fn parses_forward_subcommand() {
        let cli = Cli::try_parse_from([
            "ringbridge",
            "forward",
            "--stream-id",
            A,
            "--data",
            "hello",
        ])
        .expect("forward args should parse");

        assert!(matches!(cli.command, Command::Forward(_)));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "ringbridge",
            "forward",
            "--stream-id",
            A,
            "--json",
            "{\"x\":1}",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_malformed_stream_id() {
        let err = Cli::try_parse_from(["ringbridge", "forward", "--stream-id", "nope"])
            .expect_err("bad uuid should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_run_with_loopbacks() {
        let cli = Cli::try_parse_from([
            "ringbridge",
            "run",
            "--listen",
            "127.0.0.1:0",
            "--trailing-bytes",
            "carry-over",
            "--loopback",
            &format!("{A}={B}"),
            "--output",
            &format!("{A},{B}"),
        ])
        .expect("run args should parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.loopback.len(), 1);
        assert_eq!(args.output.len(), 2);
        assert_eq!(args.trailing_bytes, Some(cmd::TrailingPolicy::CarryOver));
    }

    #[test]
    fn parses_collect_subcommand() {
        let cli = Cli::try_parse_from(["ringbridge", "collect", "--count", "2"])
            .expect("collect args should parse");
        assert!(matches!(cli.command, Command::Collect(_)));
    }
}
