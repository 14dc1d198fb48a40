use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nimble_frame::{PendantCommand, RangePolicy, MAGNITUDE_MAX};
use nimble_session::{open_with_config, Pacer, PacerConfig, SessionError};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, WaveArgs};
use crate::exit::{frame_error, session_error, CliError, CliResult, SUCCESS, USAGE};

/// Combined amplitude of both harmonics is scaled down to this.
pub const AMPLITUDE_LIMIT: f64 = 1000.0;

const FEEDBACK_TIMEOUT: Duration = Duration::from_millis(100);

/// Sum of two sine harmonics, in position units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waveform {
    amplitude: f64,
    frequency: f64,
    amplitude2: f64,
    frequency2: f64,
}

impl Waveform {
    pub fn new(
        amplitude: f64,
        frequency: f64,
        amplitude2: f64,
        frequency2: f64,
    ) -> CliResult<Self> {
        let values = [amplitude, frequency, amplitude2, frequency2];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(CliError::new(
                USAGE,
                "amplitudes and frequencies must be finite and non-negative",
            ));
        }
        let total = amplitude + amplitude2;
        let scale = if total > AMPLITUDE_LIMIT {
            warn!(total, limit = AMPLITUDE_LIMIT, "combined amplitude scaled down");
            AMPLITUDE_LIMIT / total
        } else {
            1.0
        };
        Ok(Self {
            amplitude: amplitude * scale,
            frequency,
            amplitude2: amplitude2 * scale,
            frequency2,
        })
    }

    /// Position at `t` seconds after start.
    pub fn position_at(&self, t: f64) -> i16 {
        let value = self.amplitude * (TAU * self.frequency * t).sin()
            + self.amplitude2 * (TAU * self.frequency2 * t).sin();
        let max = f64::from(MAGNITUDE_MAX);
        value.round().clamp(-max, max) as i16
    }
}

pub fn run(args: WaveArgs) -> CliResult<i32> {
    let waveform = Waveform::new(
        args.amplitude,
        args.frequency,
        args.amplitude2,
        args.frequency2,
    )?;
    let period = parse_duration(&args.period)?;
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;
    let policy = RangePolicy::default();
    policy
        .limit("force", args.force)
        .map_err(|err| frame_error("invalid force", err))?;

    let config = args.port.session_config(policy);
    let session = open_with_config(args.port.port.as_deref(), config)
        .map_err(|err| session_error("open failed", err))?;
    let cache = session.cache();
    let (mut reader, mut writer) = session.split();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let feedback = {
        let running = running.clone();
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match reader.receive(FEEDBACK_TIMEOUT) {
                    Ok(state) => debug!(
                        position = state.position(),
                        force = state.force(),
                        "feedback"
                    ),
                    Err(SessionError::Timeout(_)) => continue,
                    Err(err) => {
                        warn!(error = %err, "feedback reader stopped");
                        break;
                    }
                }
            }
        })
    };

    let mut pacer = Pacer::new(PacerConfig {
        period,
        wait: args.wait.into(),
    });
    info!(?period, ?duration, "waveform started");

    let mut result = Ok(SUCCESS);
    while running.load(Ordering::SeqCst) {
        if duration.is_some_and(|limit| pacer.elapsed() >= limit) {
            break;
        }
        let tick = pacer.wait_for_tick();
        let t = (tick - 1) as f64 * period.as_secs_f64();
        let cmd = PendantCommand {
            activated: true,
            position: waveform.position_at(t),
            force: args.force,
            ..PendantCommand::default()
        };
        if let Err(err) = writer.send(&cmd) {
            result = Err(session_error("send failed", err));
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
    if feedback.join().is_err() {
        warn!("feedback reader panicked");
    }

    let last = cache.actuator();
    info!(
        frames = writer.frames_sent(),
        overruns = pacer.overruns(),
        last_position = last.map(|s| s.position),
        "waveform stopped"
    );
    result
}
