//! Typed ClientQuery operations built on [`Session::exchange`].

use crate::protocol::{escape, QueryError, Record};
use crate::session::Session;
use log::{debug, info};
use std::fmt;

/// Which mute flag of the local client to read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuteKind {
    /// Microphone muted, visible to the server
    Input,
    /// Speakers muted
    Output,
    /// Microphone deactivated on this client only
    InputLocal,
}

impl MuteKind {
    pub fn variable(self) -> &'static str {
        match self {
            MuteKind::Input => "client_input_muted",
            MuteKind::Output => "client_output_muted",
            MuteKind::InputLocal => "client_input_deactivated",
        }
    }
}

impl fmt::Display for MuteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MuteKind::Input => "input mute",
            MuteKind::Output => "output mute",
            MuteKind::InputLocal => "local input mute",
        };
        f.write_str(name)
    }
}

/// A channel entry from `channellist`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: u32,
    /// Name as sent by the server, still escaped
    pub escaped_name: String,
}

impl Channel {
    fn from_record(record: &Record) -> Option<Self> {
        Some(Channel {
            id: record.get("cid")?.parse().ok()?,
            escaped_name: record.get("channel_name").unwrap_or_default().to_string(),
        })
    }

    /// Name matches on the escaped forms; ids must match exactly
    pub fn matches(&self, target: &str) -> bool {
        let target = target.trim();
        if target.is_empty() {
            return false;
        }
        self.escaped_name.contains(&escape(target)) || self.id.to_string() == target
    }
}

fn bit(value: bool) -> u8 {
    u8::from(value)
}

impl Session {
    fn client_flag(&mut self, client_id: u32, variable: &str) -> Result<bool, QueryError> {
        let response = self.exchange(&format!("clientvariable clid={} {}", client_id, variable))?;
        response.flag(variable)
    }

    fn update_self(&mut self, variable: &str, value: &str) -> Result<(), QueryError> {
        self.exchange(&format!("clientupdate {}={}", variable, value))?;
        Ok(())
    }

    pub fn get_mute_status(&mut self, kind: MuteKind, client_id: u32) -> Result<bool, QueryError> {
        self.client_flag(client_id, kind.variable())
    }

    pub fn set_mute_status(&mut self, kind: MuteKind, muted: bool) -> Result<(), QueryError> {
        debug!("🎙️ Setting {} to {}", kind, muted);
        self.update_self(kind.variable(), &bit(muted).to_string())
    }

    pub fn get_away_status(&mut self, client_id: u32) -> Result<bool, QueryError> {
        self.client_flag(client_id, "client_away")
    }

    pub fn set_away_status(&mut self, away: bool) -> Result<(), QueryError> {
        self.update_self("client_away", &bit(away).to_string())
    }

    pub fn set_away_message(&mut self, message: &str) -> Result<(), QueryError> {
        self.update_self("client_away_message", &escape(message))
    }

    /// Away across every connection handler.
    ///
    /// Not away on any handler means not away overall; the walk stops at the
    /// first such handler.
    pub fn get_global_away_status(&mut self, client_id: u32) -> Result<bool, QueryError> {
        let mut seen = 0usize;
        let present = self.for_each_handler(|session, handler| {
            seen += 1;
            let away = session.get_away_status(client_id)?;
            debug!("💤 Handler {} away={}", handler, away);
            Ok((!away).then_some(()))
        })?;

        if seen == 0 {
            return self.get_away_status(client_id);
        }
        Ok(present.is_none())
    }

    /// Set away on every connection handler; any handler failing fails the whole call
    pub fn set_global_away_status(&mut self, away: bool) -> Result<(), QueryError> {
        let mut seen = 0usize;
        self.for_each_handler(|session, _| {
            seen += 1;
            session.set_away_status(away).map(|_| None::<()>)
        })?;

        if seen == 0 {
            return self.set_away_status(away);
        }
        Ok(())
    }

    pub fn set_global_away_message(&mut self, message: &str) -> Result<(), QueryError> {
        let mut seen = 0usize;
        self.for_each_handler(|session, _| {
            seen += 1;
            session.set_away_message(message).map(|_| None::<()>)
        })?;

        if seen == 0 {
            return self.set_away_message(message);
        }
        Ok(())
    }

    /// Rename the local client
    pub fn change_nickname(&mut self, nickname: &str) -> Result<(), QueryError> {
        if nickname.trim().is_empty() {
            return Err(QueryError::InvalidInput("nickname is empty".to_string()));
        }
        self.update_self("client_nickname", &escape(nickname))?;
        info!("🏷️ Nickname changed to {:?}", nickname);
        Ok(())
    }

    /// Channels in server order
    pub fn channel_list(&mut self) -> Result<Vec<Channel>, QueryError> {
        let response = self.exchange("channellist")?;
        Ok(response
            .records()
            .iter()
            .filter_map(Channel::from_record)
            .collect())
    }

    /// First channel whose name contains `target` or whose id equals it
    pub fn find_channel(&mut self, target: &str) -> Result<Channel, QueryError> {
        if target.trim().is_empty() {
            return Err(QueryError::InvalidInput("channel is empty".to_string()));
        }
        self.channel_list()?
            .into_iter()
            .find(|channel| channel.matches(target))
            .ok_or_else(|| QueryError::NoMatch(target.to_string()))
    }

    /// Move `client_id` into the channel matching `target`
    pub fn switch_channel(&mut self, target: &str, client_id: u32) -> Result<u32, QueryError> {
        let channel = self.find_channel(target)?;
        self.exchange(&format!("clientmove cid={} clid={}", channel.id, client_id))?;
        info!("🚪 Moved to channel {} ({})", channel.id, target);
        Ok(channel.id)
    }
}
