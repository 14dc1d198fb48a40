//! Print the actuator's reported position and force twice a second.
//!
//! Run with:
//!   cargo run --example telemetry-monitor -- /dev/ttyUSB0
//!
//! The port argument is optional; without it the first non-Bluetooth
//! serial port is used.

use std::time::{Duration, Instant};

use nimble::session::{open, SessionError};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::args().nth(1);
    let mut session = open(port.as_deref())?;
    let cache = session.cache();

    let mut last_report = Instant::now();
    loop {
        match session.receive(Duration::from_millis(100)) {
            Ok(_) => {}
            Err(SessionError::Timeout(_)) => eprintln!("no data"),
            Err(e) => {
                eprintln!("link lost: {e}");
                break;
            }
        }

        if last_report.elapsed() >= Duration::from_millis(500) {
            last_report = Instant::now();
            let snapshot = cache.snapshot();
            match snapshot.actuator {
                Some(seen) => println!(
                    "position={:>5} force={:>5} fault={} temp_limit={} age={:?} frames={}",
                    seen.state.position,
                    seen.state.force,
                    seen.state.sensor_fault,
                    seen.state.temp_limit,
                    seen.at.elapsed(),
                    snapshot.frames
                ),
                None => println!("waiting for actuator"),
            }
        }
    }

    let stats = session.reader_stats();
    eprintln!(
        "{} frames, {} bytes discarded while resyncing",
        stats.frames, stats.bytes_discarded
    );
    Ok(())
}
