use std::time::Duration;

use nimble_frame::RangePolicy;
use nimble_transport::LinkConfig;

/// Default time `receive_default` waits for a frame.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Controls session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serial link settings used by [`open`](crate::connector::open).
    pub link: LinkConfig,
    /// Timeout used by [`Session::receive_default`](crate::Session::receive_default).
    pub receive_timeout: Duration,
    /// Handling of out-of-range position and force in outgoing commands.
    pub range_policy: RangePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            range_policy: RangePolicy::Reject,
        }
    }
}
