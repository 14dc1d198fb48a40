use std::io;

use nimble_transport::SerialLink;
use tracing::info;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::Session;

/// Open a session on `port`, or on the discovered device port when `None`.
pub fn open(port: Option<&str>) -> Result<Session<SerialLink, SerialLink>> {
    open_with_config(port, SessionConfig::default())
}

/// Open a session with explicit configuration.
///
/// Failure to find or open the port is returned immediately; there is no
/// retry.
pub fn open_with_config(
    port: Option<&str>,
    config: SessionConfig,
) -> Result<Session<SerialLink, SerialLink>> {
    let writer = match port {
        Some(name) => SerialLink::open(name, &config.link)?,
        None => SerialLink::open_discovered(&config.link)?,
    };
    let reader = writer.try_clone()?;
    info!(port = writer.name(), "session opened");

    let mut session = Session::new(reader, writer, config);
    session.set_read_limit(Box::new(|link: &mut SerialLink, remaining| {
        link.limit_read_timeout(remaining).map_err(io::Error::other)
    }));
    Ok(session)
}
