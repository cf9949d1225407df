//! Per-button settings as the host persists them (camelCase JSON).

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Common shape of every action's settings
pub trait ActionSettings:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    fn api_key(&self) -> &str;
}

/// Parse host settings; a missing or empty object yields the defaults
pub fn parse_settings<S: ActionSettings>(raw: &Value) -> Result<S> {
    match raw {
        Value::Null => Ok(S::default()),
        Value::Object(map) if map.is_empty() => Ok(S::default()),
        other => Ok(serde_json::from_value(other.clone())?),
    }
}

pub fn to_json<S: ActionSettings>(settings: &S) -> Value {
    serde_json::to_value(settings).unwrap_or(Value::Null)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MuteSettings {
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AwaySettings {
    pub api_key: String,
    pub away_status_message: String,
    pub mute_while_away: bool,
    pub all_servers: bool,
}

impl Default for AwaySettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            away_status_message: String::new(),
            mute_while_away: true,
            all_servers: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NicknameSettings {
    pub api_key: String,
    pub nick_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    pub api_key: String,
    pub channel_name: String,
}

impl ActionSettings for MuteSettings {
    fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl ActionSettings for AwaySettings {
    fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl ActionSettings for NicknameSettings {
    fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl ActionSettings for ChannelSettings {
    fn api_key(&self) -> &str {
        &self.api_key
    }
}
