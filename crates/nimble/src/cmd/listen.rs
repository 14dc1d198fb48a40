use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nimble_frame::{NodeType, RangePolicy};
use nimble_session::{open_with_config, SessionError};
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, ListenArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_state, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let role = args.role.map(NodeType::from);

    let mut config = args.port.session_config(RangePolicy::default());
    config.receive_timeout = timeout;
    let mut session = open_with_config(args.port.port.as_deref(), config)
        .map_err(|err| session_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0u64;

    while running.load(Ordering::SeqCst) {
        let state = match session.receive(timeout) {
            Ok(state) => state,
            Err(SessionError::Timeout(waited)) if args.keep_going => {
                warn!(?waited, "no frame received");
                continue;
            }
            Err(err) => return Err(session_error("receive failed", err)),
        };

        if let Some(role) = role {
            if state.node_type() != role {
                continue;
            }
        }

        print_state(&state, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    let stats = session.reader_stats();
    info!(
        frames = stats.frames,
        discarded = stats.bytes_discarded,
        printed,
        "listen finished"
    );
    if let Some(last) = session.last_known().latest() {
        info!(
            node = last.node_type().name(),
            position = last.position(),
            force = last.force(),
            "last state"
        );
    }
    Ok(SUCCESS)
}
