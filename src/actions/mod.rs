//! Button actions and the state they share with the host.

mod channel;
mod nickname;
mod toggle;

pub use channel::ChannelSwitchAction;
pub use nickname::NicknameAction;
pub use toggle::{AwayAction, MuteAction, ToggleAction};

use crate::host::Host;
use crate::settings::{parse_settings, to_json, ActionSettings};
use log::{debug, warn};
use secrecy::SecretBox;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use ts3_query::{QueryConfig, QueryDriver};

/// Events a button receives from its host
pub trait Action: Send + Sync {
    /// `desired_state` is set when the host already knows the target
    fn key_pressed(&self, desired_state: Option<bool>);
    fn on_tick(&self);
    fn received_settings(&self, settings: Value);
    fn dispose(&self);
}

/// Driver, host handle and settings every action carries
pub(crate) struct ActionCore<S: ActionSettings> {
    driver: Arc<QueryDriver>,
    host: Arc<dyn Host>,
    settings: Mutex<S>,
}

impl<S: ActionSettings> ActionCore<S> {
    /// Persist the (possibly defaulted) settings right away so the host
    /// always holds a complete object
    pub(crate) fn new(settings: S, query: QueryConfig, host: Arc<dyn Host>) -> Self {
        let driver = Arc::new(QueryDriver::new(query, api_key_secret(&settings)));
        host.set_settings(to_json(&settings));
        Self {
            driver,
            host,
            settings: Mutex::new(settings),
        }
    }

    pub(crate) fn driver(&self) -> &Arc<QueryDriver> {
        &self.driver
    }

    pub(crate) fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub(crate) fn settings(&self) -> S {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace settings from the host; malformed input keeps the old ones
    pub(crate) fn update(&self, raw: &Value) {
        let updated: S = match parse_settings(raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("⚠️ Ignoring settings update: {}", e);
                return;
            }
        };

        {
            let mut current = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
            if current.api_key() != updated.api_key() {
                self.driver.set_api_key(api_key_secret(&updated));
            }
            *current = updated.clone();
        }
        debug!("💾 Settings updated");
        self.host.set_settings(to_json(&updated));
    }

    pub(crate) fn dispose(&self) {
        self.driver.disconnect();
    }
}

fn api_key_secret<S: ActionSettings>(settings: &S) -> SecretBox<String> {
    SecretBox::new(Box::new(settings.api_key().trim().to_string()))
}
