use crate::actions::Action;
use crossbeam_channel::{never, select, tick, Receiver};
use log::{debug, info};
use serde_json::Value;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default poll period for toggle buttons
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    KeyPressed { desired_state: Option<bool> },
    Tick,
    SettingsChanged(Value),
    Dispose,
}

/// Feeds host events and periodic ticks into one action.
///
/// Ticks run on the event loop; key presses run on their own threads so a
/// slow exchange never delays the next tick. The driver lock keeps the two
/// from interleaving on the socket.
pub struct ActionRuntime {
    action: Arc<dyn Action>,
    tick_interval: Option<Duration>,
}

impl ActionRuntime {
    /// `tick_interval` of `None` leaves ticking to the host's `Tick` events
    pub fn new(action: Arc<dyn Action>, tick_interval: Option<Duration>) -> Self {
        Self {
            action,
            tick_interval,
        }
    }

    /// Process events until `Dispose` or until the sender goes away
    pub fn run(&self, events: Receiver<HostEvent>) {
        let ticker = match self.tick_interval {
            Some(interval) => tick(interval),
            None => never(),
        };
        let mut presses: Vec<JoinHandle<()>> = Vec::new();

        info!("🚀 Action runtime started");
        loop {
            select! {
                recv(events) -> event => match event {
                    Ok(HostEvent::KeyPressed { desired_state }) => {
                        presses.retain(|handle| !handle.is_finished());
                        let action = Arc::clone(&self.action);
                        presses.push(thread::spawn(move || action.key_pressed(desired_state)));
                    }
                    Ok(HostEvent::Tick) => self.action.on_tick(),
                    Ok(HostEvent::SettingsChanged(settings)) => self.action.received_settings(settings),
                    Ok(HostEvent::Dispose) => break,
                    Err(_) => {
                        debug!("Host event channel closed");
                        break;
                    }
                },
                recv(ticker) -> _ => self.action.on_tick(),
            }
        }

        for handle in presses {
            // A panicking press has already been reported by the panic hook
            let _ = handle.join();
        }
        self.action.dispose();
        info!("🛑 Action runtime stopped");
    }
}
