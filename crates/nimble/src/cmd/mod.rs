use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use nimble_frame::{NodeType, PendantCommand, RangePolicy};
use nimble_session::{SessionConfig, WaitStrategy};
use nimble_transport::LinkConfig;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod listen;
pub mod ports;
pub mod send;
pub mod version;
pub mod wave;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports.
    Ports(PortsArgs),
    /// Print frames received from the device.
    Listen(ListenArgs),
    /// Send a pendant command.
    Send(SendArgs),
    /// Drive the actuator with a two-harmonic test waveform.
    Wave(WaveArgs),
    /// Encode a frame and print it (no device needed).
    Encode(EncodeArgs),
    /// Find and decode frames in a hex byte string (no device needed).
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args),
        Command::Wave(args) => wave::run(args),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct PortArgs {
    /// Serial port of the device. Guessed when omitted.
    #[arg(long, short = 'p', env = "NIMBLE_PORT")]
    pub port: Option<String>,
    /// Line rate in bit/s.
    #[arg(long, default_value_t = nimble_transport::DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

impl PortArgs {
    pub fn session_config(&self, range_policy: RangePolicy) -> SessionConfig {
        SessionConfig {
            link: LinkConfig {
                baud_rate: self.baud,
                ..LinkConfig::default()
            },
            range_policy,
            ..SessionConfig::default()
        }
    }
}

/// Flag and value fields of a pendant command.
#[derive(Args, Debug)]
pub struct CommandFields {
    /// Set the activated flag.
    #[arg(long)]
    pub activated: bool,
    /// Open the air outlet valve.
    #[arg(long)]
    pub air_out: bool,
    /// Open the air inlet valve.
    #[arg(long)]
    pub air_in: bool,
    /// Enable the air spring.
    #[arg(long)]
    pub air_spring: bool,
    #[arg(long)]
    pub set_exten: bool,
    /// Position, -1023..=1023.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub position: i16,
    /// Force limit, -1023..=1023.
    #[arg(long, default_value_t = 1023, allow_negative_numbers = true)]
    pub force: i16,
}

impl CommandFields {
    pub fn to_command(&self) -> PendantCommand {
        PendantCommand {
            activated: self.activated,
            air_out: self.air_out,
            air_in: self.air_in,
            air_spring: self.air_spring,
            set_exten: self.set_exten,
            position: self.position,
            force: self.force,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum PolicyArg {
    /// Refuse out-of-range values.
    #[default]
    Reject,
    /// Clamp to -1023..=1023.
    Saturate,
    /// Keep the low 10 bits.
    Mask,
}

impl From<PolicyArg> for RangePolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Reject => RangePolicy::Reject,
            PolicyArg::Saturate => RangePolicy::Saturate,
            PolicyArg::Mask => RangePolicy::Mask,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Actuator,
    Pendant,
}

impl From<RoleArg> for NodeType {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Actuator => NodeType::Actuator,
            RoleArg::Pendant => NodeType::Pendant,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum WaitArg {
    /// Busy-spin (most precise, one core at 100%).
    Spin,
    /// Poll and yield between polls.
    Yield,
    /// Sleep, then spin for the last half millisecond.
    #[default]
    SleepSpin,
}

impl From<WaitArg> for WaitStrategy {
    fn from(value: WaitArg) -> Self {
        match value {
            WaitArg::Spin => WaitStrategy::Spin,
            WaitArg::Yield => WaitStrategy::SpinYield,
            WaitArg::SleepSpin => WaitStrategy::default(),
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Only print frames from this node.
    #[arg(long)]
    pub role: Option<RoleArg>,
    /// Exit after printing N frames.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,
    /// Maximum wait for each frame (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Log timeouts and keep listening instead of exiting.
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    #[command(flatten)]
    pub fields: CommandFields,
    /// Send the command N times at the frame period.
    #[arg(long, default_value_t = 1)]
    pub repeat: u64,
    /// Time between repeats (e.g. 2ms).
    #[arg(long, default_value = "2ms")]
    pub period: String,
    /// How to wait between repeats.
    #[arg(long, value_enum, default_value_t = WaitArg::default())]
    pub wait: WaitArg,
    /// Handling of out-of-range position or force.
    #[arg(long, value_enum, default_value_t = PolicyArg::default())]
    pub policy: PolicyArg,
}

#[derive(Args, Debug)]
pub struct WaveArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Amplitude of the base harmonic.
    #[arg(long, default_value_t = 500.0)]
    pub amplitude: f64,
    /// Frequency of the base harmonic in Hz.
    #[arg(long, default_value_t = 2.0)]
    pub frequency: f64,
    /// Amplitude of the extra harmonic.
    #[arg(long, default_value_t = 300.0)]
    pub amplitude2: f64,
    /// Frequency of the extra harmonic in Hz.
    #[arg(long, default_value_t = 10.0)]
    pub frequency2: f64,
    /// Force limit sent with every frame.
    #[arg(long, default_value_t = 1023)]
    pub force: i16,
    /// Stop after this long (e.g. 30s). Runs until Ctrl-C when omitted.
    #[arg(long)]
    pub duration: Option<String>,
    /// Frame period (e.g. 2ms).
    #[arg(long, default_value = "2ms")]
    pub period: String,
    /// How to wait between frames.
    #[arg(long, value_enum, default_value_t = WaitArg::default())]
    pub wait: WaitArg,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Node the frame claims to come from.
    #[arg(long, value_enum, default_value_t = RoleArg::Pendant)]
    pub role: RoleArg,
    #[command(flatten)]
    pub fields: CommandFields,
    /// Actuator sensor fault flag (actuator role only).
    #[arg(long)]
    pub sensor_fault: bool,
    /// Actuator temperature limit flag (actuator role only).
    #[arg(long)]
    pub temp_limit: bool,
    /// Handling of out-of-range position or force.
    #[arg(long, value_enum, default_value_t = PolicyArg::default())]
    pub policy: PolicyArg,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Bytes as hex, e.g. "81 2c 01 ff 03 b0 01" or "812c01ff03b001".
    #[arg(required = true, num_args = 1..)]
    pub hex: Vec<String>,
    /// Treat the input as exactly one frame and report why it is rejected.
    #[arg(long)]
    pub exact: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

/// Clear `running` on Ctrl-C.
pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
