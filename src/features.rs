use crate::reconcile::ToggleFeature;
use crate::settings::{AwaySettings, MuteSettings};
use log::warn;
use ts3_query::{MuteKind, QueryError, Session};

/// Microphone, speaker or local-only microphone mute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteFeature {
    kind: MuteKind,
}

impl MuteFeature {
    pub fn new(kind: MuteKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> MuteKind {
        self.kind
    }
}

impl ToggleFeature for MuteFeature {
    type Settings = MuteSettings;

    fn name(&self) -> &'static str {
        match self.kind {
            MuteKind::Input => "input mute",
            MuteKind::Output => "output mute",
            MuteKind::InputLocal => "local input mute",
        }
    }

    fn fetch(&self, session: &mut Session, client_id: u32, _: &MuteSettings) -> Result<bool, QueryError> {
        session.get_mute_status(self.kind, client_id)
    }

    fn apply(&self, session: &mut Session, target: bool, _: &MuteSettings) -> Result<(), QueryError> {
        session.set_mute_status(self.kind, target)
    }
}

/// Away status, optionally muting input and output and setting a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AwayFeature;

impl ToggleFeature for AwayFeature {
    type Settings = AwaySettings;

    fn name(&self) -> &'static str {
        "away"
    }

    fn fetch(&self, session: &mut Session, client_id: u32, settings: &AwaySettings) -> Result<bool, QueryError> {
        if settings.all_servers {
            session.get_global_away_status(client_id)
        } else {
            session.get_away_status(client_id)
        }
    }

    fn apply(&self, session: &mut Session, away: bool, settings: &AwaySettings) -> Result<(), QueryError> {
        if settings.mute_while_away {
            for kind in [MuteKind::Input, MuteKind::Output] {
                tolerate(session.set_mute_status(kind, away), "mute while away")?;
            }
        }

        if settings.all_servers {
            session.set_global_away_status(away)?;
        } else {
            session.set_away_status(away)?;
        }

        let message = settings.away_status_message.trim();
        if away && !message.is_empty() {
            let result = if settings.all_servers {
                session.set_global_away_message(message)
            } else {
                session.set_away_message(message)
            };
            tolerate(result, "away message")?;
        }
        Ok(())
    }
}

/// Side effects that must not block the away flag itself
fn tolerate(result: Result<(), QueryError>, what: &str) -> Result<(), QueryError> {
    match result {
        Err(e) if !e.is_fatal() => {
            warn!("⚠️ Could not apply {}: {}", what, e);
            Ok(())
        }
        other => other,
    }
}
