use crate::protocol::QueryError;
use crate::session::{QueryConfig, Session};
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretBox};
use std::sync::{Mutex, MutexGuard};

struct DriverState {
    session: Option<Session>,
    api_key: SecretBox<String>,
}

/// Owns the one ClientQuery session shared by everything built on top of it.
///
/// Every operation runs under a single lock, so a poll tick and a key press
/// never interleave their command and response lines on the socket.
pub struct QueryDriver {
    config: QueryConfig,
    state: Mutex<DriverState>,
}

impl QueryDriver {
    pub fn new(config: QueryConfig, api_key: SecretBox<String>) -> Self {
        Self {
            config,
            state: Mutex::new(DriverState {
                session: None,
                api_key,
            }),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Run `op` on an authenticated session, establishing one if needed.
    ///
    /// Fatal errors from setup or from `op` drop the session; the next call
    /// starts over with connect, banner check and auth.
    pub fn run<T, F>(&self, op: F) -> Result<T, QueryError>
    where
        F: FnOnce(&mut Session) -> Result<T, QueryError>,
    {
        let mut state = self.lock();

        let mut session = match state.session.take() {
            Some(session) if session.is_alive() => session,
            stale => {
                if stale.is_some() {
                    debug!("🔌 Discarding dead ClientQuery session");
                }
                match Session::setup(&self.config, &state.api_key) {
                    Ok(session) => session,
                    Err(e) => {
                        match e {
                            QueryError::Unavailable { .. } => debug!("📴 {}", e),
                            _ => warn!("❌ ClientQuery setup failed: {}", e),
                        }
                        return Err(e);
                    }
                }
            }
        };

        let result = op(&mut session);
        match &result {
            Err(e) if e.is_fatal() || !session.is_alive() => {
                warn!("🔌 Dropping ClientQuery session: {}", e);
            }
            _ => state.session = Some(session),
        }
        result
    }

    /// Close the session; the next operation reconnects
    pub fn disconnect(&self) {
        let mut state = self.lock();
        if state.session.take().is_some() {
            info!("🔌 Disconnected from ClientQuery");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().session.as_ref().is_some_and(Session::is_alive)
    }

    /// Replace the API key. A different key drops the current session.
    pub fn set_api_key(&self, api_key: SecretBox<String>) {
        let mut state = self.lock();
        if state.api_key.expose_secret() != api_key.expose_secret() {
            debug!("🔑 API key changed, session will be re-established");
            state.session = None;
        }
        state.api_key = api_key;
    }

    fn lock(&self) -> MutexGuard<'_, DriverState> {
        // A panic inside an operation leaves the session in an unknown state
        self.state.lock().unwrap_or_else(|poisoned| {
            let mut state = poisoned.into_inner();
            state.session = None;
            state
        })
    }
}

impl std::fmt::Debug for QueryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDriver")
            .field("address", &self.config.address)
            .finish_non_exhaustive()
    }
}
