//! TeamSpeak 3 buttons over ClientQuery.
//!
//! Each button is an [`Action`]: mute toggles and the away toggle poll the
//! client every tick and mirror its state on the button image, while the
//! nickname and channel buttons fire a single command on press.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ts3_deck::{MuteAction, MuteFeature, MuteSettings, ConsoleHost};
//! use ts3_query::{MuteKind, QueryConfig};
//!
//! let settings = MuteSettings { api_key: "XXXX-XXXX-XXXX-XXXX-XXXX-XXXX".into() };
//! let action = MuteAction::new(
//!     MuteFeature::new(MuteKind::Input),
//!     settings,
//!     QueryConfig::default(),
//!     Arc::new(ConsoleHost::default()),
//! );
//! action.poll();
//! action.press(None);
//! ```

pub mod actions;
pub mod config;
pub mod error;
pub mod features;
pub mod host;
pub mod reconcile;
pub mod runtime;
pub mod settings;

pub use actions::{Action, AwayAction, ChannelSwitchAction, MuteAction, NicknameAction, ToggleAction};
pub use config::{load_config, ConfigError, DeckConfig};
pub use error::{DeckError, Result};
pub use features::{AwayFeature, MuteFeature};
pub use host::{ConsoleHost, Host};
pub use reconcile::{ObservedState, PollOutcome, Reconciler, ToggleFeature, ToggleOutcome};
pub use runtime::{ActionRuntime, HostEvent, DEFAULT_TICK_INTERVAL};
pub use settings::{ActionSettings, AwaySettings, ChannelSettings, MuteSettings, NicknameSettings};
