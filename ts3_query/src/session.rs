use crate::protocol::{QueryError, Response, Status};
use crate::transport::{LineConnection, Timeouts};
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretBox};
use std::thread;
use std::time::Duration;

/// Default ClientQuery endpoint exposed by the TeamSpeak 3 client
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:25639";

/// First banner line must contain this
pub const DEFAULT_BANNER_MARKER: &str = "TS3 Client";

/// Bounded resend policy for commands that come back without `msg=ok`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(25),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub address: String,
    pub timeouts: Timeouts,
    pub retry: RetryPolicy,
    pub banner_marker: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            timeouts: Timeouts::default(),
            retry: RetryPolicy::default(),
            banner_marker: DEFAULT_BANNER_MARKER.to_string(),
        }
    }
}

impl QueryConfig {
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}

/// An authenticated ClientQuery connection
pub struct Session {
    connection: LineConnection,
    retry: RetryPolicy,
}

impl Session {
    /// Connect, check the welcome banner and authenticate.
    ///
    /// A banner mismatch means some other service is listening on the port,
    /// so it is not retried. A rejected API key drops the socket.
    pub fn setup(config: &QueryConfig, api_key: &SecretBox<String>) -> Result<Self, QueryError> {
        let mut connection = LineConnection::connect(&config.address, config.timeouts)?;

        let banner = connection.read_line()?;
        if !banner.contains(&config.banner_marker) {
            warn!("⚠️ Unexpected welcome banner from {}: {:?}", config.address, banner);
            return Err(QueryError::UnexpectedBanner(banner));
        }

        let mut session = Session {
            connection,
            retry: config.retry,
        };

        let command = format!("auth apikey={}", api_key.expose_secret());
        let response = session.exchange_once(&command)?;
        if !response.is_ok() {
            let status = response.failure_status();
            warn!("🔑 ClientQuery rejected the API key: {}", status);
            return Err(QueryError::AuthRejected(status));
        }

        info!("✅ Authenticated with ClientQuery at {}", config.address);
        Ok(session)
    }

    pub fn is_alive(&self) -> bool {
        self.connection.is_alive()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// One write followed by one read, no retry
    pub fn exchange_once(&mut self, command: &str) -> Result<Response, QueryError> {
        self.connection.write_line(command)?;
        self.connection.read_response()
    }

    /// Send `command` until it succeeds or the retry budget is spent.
    ///
    /// Only successful responses are returned. I/O failures abort at once.
    pub fn exchange(&mut self, command: &str) -> Result<Response, QueryError> {
        let attempts = self.retry.attempts.max(1);
        let mut last_status = None;

        for attempt in 1..=attempts {
            let response = self.exchange_once(command)?;
            if response.is_ok() {
                return Ok(response);
            }

            let status = response.failure_status();
            debug!(
                "🔁 `{}` attempt {}/{} failed: {}",
                log_safe(command),
                attempt,
                attempts,
                status
            );
            last_status = Some(status);

            if attempt < attempts && !self.retry.delay.is_zero() {
                thread::sleep(self.retry.delay);
            }
        }

        Err(QueryError::Rejected {
            command: log_safe(command),
            attempts,
            status: last_status.unwrap_or_else(|| Status {
                id: u32::MAX,
                message: "no response".to_string(),
            }),
        })
    }

    /// Select the current server connection handler
    pub fn select_server(&mut self) -> Result<(), QueryError> {
        self.exchange("use")?;
        Ok(())
    }

    /// Client id of this client on the selected server
    pub fn who_am_i(&mut self) -> Result<u32, QueryError> {
        self.select_server()?;
        let response = self.exchange("whoami")?;
        response.parse_field("clid")
    }

    pub fn current_handler(&mut self) -> Result<u32, QueryError> {
        let response = self.exchange("currentschandlerid")?;
        response.parse_field("schandlerid")
    }

    /// All server connection handler ids, in server order
    pub fn handlers(&mut self) -> Result<Vec<u32>, QueryError> {
        let response = self.exchange("serverconnectionhandlerlist")?;
        response
            .records()
            .iter()
            .filter_map(|record| record.get("schandlerid"))
            .map(|id| {
                id.parse().map_err(|_| QueryError::InvalidField {
                    field: "schandlerid".to_string(),
                    value: id.to_string(),
                })
            })
            .collect()
    }

    pub fn use_handler(&mut self, handler: u32) -> Result<(), QueryError> {
        self.exchange(&format!("use schandlerid={}", handler))?;
        Ok(())
    }

    /// Run `op` against every connection handler in turn.
    ///
    /// Stops at the first error or at the first `Some` returned by `op`.
    /// The handler selected before the walk is selected again afterwards
    /// unless the connection itself broke.
    pub fn for_each_handler<T, F>(&mut self, mut op: F) -> Result<Option<T>, QueryError>
    where
        F: FnMut(&mut Session, u32) -> Result<Option<T>, QueryError>,
    {
        let original = self.current_handler()?;
        let handlers = self.handlers()?;
        debug!("🗂️ Walking {} connection handlers", handlers.len());

        let result = self.walk_handlers(&handlers, &mut op);

        match &result {
            Err(e) if e.is_fatal() => {}
            _ => {
                if let Err(e) = self.use_handler(original) {
                    warn!("⚠️ Could not reselect connection handler {}: {}", original, e);
                    if e.is_fatal() {
                        return Err(e);
                    }
                }
            }
        }

        result
    }

    fn walk_handlers<T, F>(&mut self, handlers: &[u32], op: &mut F) -> Result<Option<T>, QueryError>
    where
        F: FnMut(&mut Session, u32) -> Result<Option<T>, QueryError>,
    {
        for &handler in handlers {
            self.use_handler(handler)?;
            if let Some(found) = op(self, handler)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

/// Commands are logged and reported without the API key
fn log_safe(command: &str) -> String {
    if command.starts_with("auth ") {
        "auth apikey=<redacted>".to_string()
    } else {
        command.to_string()
    }
}
