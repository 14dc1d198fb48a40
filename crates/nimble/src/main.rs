mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "nimble", version, about = "Nimble actuator serial protocol CLI")]
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

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "nimble",
            "send",
            "--port",
            "/dev/ttyUSB0",
            "--activated",
            "--position",
            "-200",
            "--repeat",
            "50",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.port.port.as_deref(), Some("/dev/ttyUSB0"));
                assert!(args.fields.activated);
                assert_eq!(args.fields.position, -200);
                assert_eq!(args.fields.force, 1023);
                assert_eq!(args.repeat, 50);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_role() {
        let err = Cli::try_parse_from(["nimble", "listen", "--role", "controller"])
            .expect_err("unknown role should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn listen_rejects_zero_count() {
        let err = Cli::try_parse_from(["nimble", "listen", "--count", "0"])
            .expect_err("zero count should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = Cli::try_parse_from(["nimble", "listen", "--count", "3"])
            .expect("positive count should parse");
        match cli.command {
            Command::Listen(args) => assert_eq!(args.count, Some(3)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn decode_requires_bytes() {
        let err = Cli::try_parse_from(["nimble", "decode"]).expect_err("missing hex should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_wave_with_global_format() {
        let cli = Cli::try_parse_from([
            "nimble",
            "wave",
            "--amplitude",
            "400",
            "--duration",
            "5s",
            "--wait",
            "spin",
            "--format",
            "json",
        ])
        .expect("wave args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Wave(_)));
    }
}
