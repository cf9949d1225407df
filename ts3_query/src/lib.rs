//! # ts3_query
//!
//! Blocking driver for the TeamSpeak 3 ClientQuery plugin: a line based
//! request/response protocol served by the TeamSpeak client on
//! `127.0.0.1:25639`.
//!
//! This crate provides:
//! - Line transport over a loopback TCP socket
//! - Response parsing and value escaping
//! - An authenticated session with bounded command retry
//! - A lock-guarded driver that reconnects after connection failures
//! - Typed operations for mute, away, nickname and channel switching
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use secrecy::SecretBox;
//! use ts3_query::{MuteKind, QueryConfig, QueryDriver};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let api_key = SecretBox::new(Box::new("ABCD-1234-EFGH-5678-IJKL-9012".to_string()));
//! let driver = QueryDriver::new(QueryConfig::default(), api_key);
//!
//! let muted = driver.run(|session| {
//!     let client_id = session.who_am_i()?;
//!     session.get_mute_status(MuteKind::Input, client_id)
//! })?;
//! println!("Microphone muted: {}", muted);
//! # Ok(())
//! # }
//! ```

pub mod accessors;
pub mod driver;
pub mod protocol;
pub mod session;
pub mod test_utils;
pub mod transport;

// Re-export commonly used types
pub use accessors::{Channel, MuteKind};
pub use driver::QueryDriver;
pub use protocol::{escape, is_success, unescape, QueryError, Record, Response, Status};
pub use session::{QueryConfig, RetryPolicy, Session, DEFAULT_ADDRESS};
pub use transport::{LineConnection, Timeouts};
