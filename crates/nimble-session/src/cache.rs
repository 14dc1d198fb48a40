use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use nimble_frame::{ActuatorState, DecodedState, PendantCommand};

/// A state and the moment it was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observed<T> {
    pub state: T,
    pub at: Instant,
}

/// The last state seen from each node.
///
/// The two roles are tracked independently. A pendant frame never touches
/// the actuator slot and the other way round, so actuator fault flags are
/// never mixed with pendant valve flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub actuator: Option<Observed<ActuatorState>>,
    pub pendant: Option<Observed<PendantCommand>>,
    /// Frames recorded since the cache was created.
    pub frames: u64,
}

impl Snapshot {
    /// The most recently decoded state of either role.
    pub fn latest(&self) -> Option<DecodedState> {
        match (self.actuator, self.pendant) {
            (Some(a), Some(p)) if p.at > a.at => Some(DecodedState::Pendant(p.state)),
            (Some(a), _) => Some(DecodedState::Actuator(a.state)),
            (None, Some(p)) => Some(DecodedState::Pendant(p.state)),
            (None, None) => None,
        }
    }
}

/// Shared last-known state, one writer and any number of readers.
///
/// Readers receive a full copy of the snapshot, so they never see a
/// half-updated state.
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    inner: Arc<RwLock<Snapshot>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decoded frame in the slot of its role.
    pub fn record(&self, state: DecodedState) {
        let at = Instant::now();
        let mut snapshot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match state {
            DecodedState::Actuator(state) => snapshot.actuator = Some(Observed { state, at }),
            DecodedState::Pendant(state) => snapshot.pendant = Some(Observed { state, at }),
        }
        snapshot.frames += 1;
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn actuator(&self) -> Option<ActuatorState> {
        self.snapshot().actuator.map(|o| o.state)
    }

    pub fn pendant(&self) -> Option<PendantCommand> {
        self.snapshot().pendant.map(|o| o.state)
    }
}
