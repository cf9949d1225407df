use log::debug;
use serde_json::Value;
use std::sync::atomic::{AtomicU8, Ordering};

/// The button host: a Stream Deck, a console, a test recorder.
///
/// Both calls are fire-and-forget. State `0` is the inactive image, `1` the
/// active one.
pub trait Host: Send + Sync {
    fn set_state(&self, state: u8);
    fn set_settings(&self, settings: Value);
}

/// Image state for a boolean toggle
pub fn state_for(active: bool) -> u8 {
    u8::from(active)
}

/// Prints image changes to stdout; used by the command line front end
#[derive(Debug)]
pub struct ConsoleHost {
    last_state: AtomicU8,
}

impl Default for ConsoleHost {
    fn default() -> Self {
        Self {
            last_state: AtomicU8::new(u8::MAX),
        }
    }
}

impl Host for ConsoleHost {
    fn set_state(&self, state: u8) {
        if self.last_state.swap(state, Ordering::SeqCst) != state {
            println!("🔘 {}", if state == 1 { "ON" } else { "OFF" });
        }
    }

    fn set_settings(&self, settings: Value) {
        // Values may hold the API key
        let keys: Vec<&str> = settings
            .as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default();
        debug!("💾 Settings persisted: {:?}", keys);
    }
}
