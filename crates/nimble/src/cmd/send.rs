use nimble_frame::RangePolicy;
use nimble_session::{open_with_config, Pacer, PacerConfig};
use tracing::info;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{frame_error, session_error, CliResult, SUCCESS};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let policy = RangePolicy::from(args.policy);
    let period = parse_duration(&args.period)?;

    // Out-of-range values fail before the port is touched.
    let cmd = policy
        .apply(&args.fields.to_command())
        .map_err(|err| frame_error("invalid command", err))?;

    let config = args.port.session_config(policy);
    let mut session = open_with_config(args.port.port.as_deref(), config)
        .map_err(|err| session_error("open failed", err))?;

    let mut pacer = Pacer::new(PacerConfig {
        period,
        wait: args.wait.into(),
    });

    for sent in 0..args.repeat.max(1) {
        if sent > 0 {
            pacer.wait_for_tick();
        }
        session
            .send(&cmd)
            .map_err(|err| session_error("send failed", err))?;
    }

    info!(
        frames = args.repeat.max(1),
        overruns = pacer.overruns(),
        "command sent"
    );
    Ok(SUCCESS)
}
