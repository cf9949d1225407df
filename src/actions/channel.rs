use super::{Action, ActionCore};
use crate::error::Result;
use crate::host::Host;
use crate::settings::{parse_settings, ChannelSettings};
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;
use ts3_query::{QueryConfig, QueryDriver};

/// Moves the user into the configured channel on press.
///
/// `channelName` matches a channel whose name contains it, or a channel id.
pub struct ChannelSwitchAction {
    core: ActionCore<ChannelSettings>,
}

impl ChannelSwitchAction {
    pub fn new(settings: ChannelSettings, query: QueryConfig, host: Arc<dyn Host>) -> Self {
        Self {
            core: ActionCore::new(settings, query, host),
        }
    }

    pub fn from_json(raw: &Value, query: QueryConfig, host: Arc<dyn Host>) -> Result<Self> {
        Ok(Self::new(parse_settings(raw)?, query, host))
    }

    /// Returns the id of the channel joined
    pub fn press(&self) -> Result<u32> {
        let target = self.core.settings().channel_name;
        let channel_id = self.core.driver().run(|session| {
            let client_id = session.who_am_i()?;
            session.switch_channel(&target, client_id)
        })?;
        Ok(channel_id)
    }

    pub fn settings(&self) -> ChannelSettings {
        self.core.settings()
    }

    pub fn driver(&self) -> &QueryDriver {
        self.core.driver()
    }
}

impl Action for ChannelSwitchAction {
    fn key_pressed(&self, _desired_state: Option<bool>) {
        info!("⌨️ Channel key pressed");
        match self.press() {
            Ok(channel_id) => info!("✅ Moved to channel {}", channel_id),
            Err(e) => warn!("⚠️ Channel switch failed: {}", e),
        }
    }

    fn on_tick(&self) {}

    fn received_settings(&self, settings: Value) {
        self.core.update(&settings);
    }

    fn dispose(&self) {
        self.core.dispose();
    }
}
