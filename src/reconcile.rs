//! Keeps a button image in line with a client-side boolean.
//!
//! A [`Reconciler`] owns the last observed value of one toggle. Polling reads
//! the remote value and pushes it to the host; toggling flips (or forces) the
//! remote value. Fatal connection errors reset the image to inactive.

use crate::host::{state_for, Host};
use crate::settings::ActionSettings;
use log::{debug, warn};
use std::sync::{Arc, Mutex, PoisonError};
use ts3_query::{QueryDriver, QueryError, Session};

/// Last value seen by the poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObservedState {
    #[default]
    Unknown,
    Known(bool),
}

/// A boolean the client exposes through ClientQuery
pub trait ToggleFeature: Send + Sync {
    type Settings: ActionSettings;

    fn name(&self) -> &'static str;

    fn fetch(
        &self,
        session: &mut Session,
        client_id: u32,
        settings: &Self::Settings,
    ) -> Result<bool, QueryError>;

    fn apply(
        &self,
        session: &mut Session,
        target: bool,
        settings: &Self::Settings,
    ) -> Result<(), QueryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Remote value differs from the cache
    Changed(bool),
    /// Same value; the image was re-asserted
    Unchanged(bool),
    /// Command rejected or client id unavailable; nothing shown
    Skipped,
    /// No session could be set up
    Offline,
    /// Connection failed mid-exchange; image forced to inactive
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Applied(bool),
    Failed,
    Offline,
    Reset,
}

enum Fetched {
    Value(bool),
    NoClientId,
}

pub struct Reconciler {
    driver: Arc<QueryDriver>,
    host: Arc<dyn Host>,
    observed: Mutex<ObservedState>,
}

impl Reconciler {
    pub fn new(driver: Arc<QueryDriver>, host: Arc<dyn Host>) -> Self {
        Self {
            driver,
            host,
            observed: Mutex::new(ObservedState::Unknown),
        }
    }

    pub fn observed(&self) -> ObservedState {
        *self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the remote value and push it to the host.
    ///
    /// Safe to call every tick: an unchanged value only re-asserts the image.
    pub fn poll<F: ToggleFeature>(&self, feature: &F, settings: &F::Settings) -> PollOutcome {
        let fetched = self.driver.run(|session| {
            let client_id = match session.who_am_i() {
                Ok(id) => id,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("🔍 {}: whoami failed: {}", feature.name(), e);
                    return Ok(Fetched::NoClientId);
                }
            };
            feature
                .fetch(session, client_id, settings)
                .map(Fetched::Value)
        });

        match fetched {
            Ok(Fetched::Value(value)) => {
                let changed = {
                    let mut observed = self.observed.lock().unwrap_or_else(PoisonError::into_inner);
                    let changed = *observed != ObservedState::Known(value);
                    *observed = ObservedState::Known(value);
                    changed
                };
                self.host.set_state(state_for(value));
                if changed {
                    debug!("🔄 {} is now {}", feature.name(), value);
                    PollOutcome::Changed(value)
                } else {
                    PollOutcome::Unchanged(value)
                }
            }
            Ok(Fetched::NoClientId) => {
                // Client id unknown: start over on the next tick
                self.driver.disconnect();
                PollOutcome::Skipped
            }
            Err(e) => self.on_poll_error(feature.name(), e),
        }
    }

    /// Flip the remote value, or force it to `desired` when the host knows
    /// which state it wants.
    ///
    /// A plain flip always reads the remote value first, under the same lock
    /// as the write. The cache is left to the poll cycle.
    pub fn toggle<F: ToggleFeature>(
        &self,
        feature: &F,
        settings: &F::Settings,
        desired: Option<bool>,
    ) -> ToggleOutcome {
        let result = self.driver.run(|session| {
            let target = match desired {
                Some(target) => target,
                None => {
                    let client_id = session.who_am_i()?;
                    !feature.fetch(session, client_id, settings)?
                }
            };
            feature.apply(session, target, settings)?;
            Ok(target)
        });

        match result {
            Ok(target) => {
                debug!("🎛️ {} set to {}", feature.name(), target);
                self.host.set_state(state_for(target));
                ToggleOutcome::Applied(target)
            }
            Err(e) if e.is_setup() => {
                debug!("🔌 {}: no ClientQuery session: {}", feature.name(), e);
                ToggleOutcome::Offline
            }
            Err(e) if e.is_fatal() => {
                warn!("⚠️ {}: connection failed during toggle: {}", feature.name(), e);
                self.reset();
                ToggleOutcome::Reset
            }
            Err(e) => {
                warn!("⚠️ {}: toggle failed: {}", feature.name(), e);
                ToggleOutcome::Failed
            }
        }
    }

    fn on_poll_error(&self, name: &str, error: QueryError) -> PollOutcome {
        if error.is_setup() {
            debug!("🔌 {}: no ClientQuery session: {}", name, error);
            PollOutcome::Offline
        } else if error.is_fatal() {
            warn!("⚠️ {}: connection failed during poll: {}", name, error);
            self.reset();
            PollOutcome::Reset
        } else {
            debug!("🔍 {}: poll skipped: {}", name, error);
            PollOutcome::Skipped
        }
    }

    fn reset(&self) {
        *self.observed.lock().unwrap_or_else(PoisonError::into_inner) = ObservedState::Unknown;
        self.host.set_state(0);
    }
}
