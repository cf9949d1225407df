use super::{Action, ActionCore};
use crate::error::Result;
use crate::host::Host;
use crate::settings::{parse_settings, NicknameSettings};
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;
use ts3_query::{QueryConfig, QueryDriver};

/// Sets the configured nickname on press
pub struct NicknameAction {
    core: ActionCore<NicknameSettings>,
}

impl NicknameAction {
    pub fn new(settings: NicknameSettings, query: QueryConfig, host: Arc<dyn Host>) -> Self {
        Self {
            core: ActionCore::new(settings, query, host),
        }
    }

    pub fn from_json(raw: &Value, query: QueryConfig, host: Arc<dyn Host>) -> Result<Self> {
        Ok(Self::new(parse_settings(raw)?, query, host))
    }

    pub fn press(&self) -> Result<()> {
        let nickname = self.core.settings().nick_name;
        self.core.driver().run(|session| {
            session.select_server()?;
            session.change_nickname(&nickname)
        })?;
        Ok(())
    }

    pub fn settings(&self) -> NicknameSettings {
        self.core.settings()
    }

    pub fn driver(&self) -> &QueryDriver {
        self.core.driver()
    }
}

impl Action for NicknameAction {
    fn key_pressed(&self, _desired_state: Option<bool>) {
        info!("⌨️ Nickname key pressed");
        match self.press() {
            Ok(()) => info!("✅ Nickname changed"),
            Err(e) => warn!("⚠️ Nickname change failed: {}", e),
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
