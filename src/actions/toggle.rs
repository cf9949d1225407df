use super::{Action, ActionCore};
use crate::error::Result;
use crate::features::{AwayFeature, MuteFeature};
use crate::host::Host;
use crate::reconcile::{ObservedState, PollOutcome, Reconciler, ToggleFeature, ToggleOutcome};
use crate::settings::parse_settings;
use log::info;
use serde_json::Value;
use std::sync::Arc;
use ts3_query::{QueryConfig, QueryDriver};

pub type MuteAction = ToggleAction<MuteFeature>;
pub type AwayAction = ToggleAction<AwayFeature>;

/// A two-state button mirroring one client-side boolean
pub struct ToggleAction<F: ToggleFeature> {
    feature: F,
    core: ActionCore<F::Settings>,
    reconciler: Reconciler,
}

impl<F: ToggleFeature> ToggleAction<F> {
    pub fn new(feature: F, settings: F::Settings, query: QueryConfig, host: Arc<dyn Host>) -> Self {
        let core = ActionCore::new(settings, query, host);
        let reconciler = Reconciler::new(Arc::clone(core.driver()), Arc::clone(core.host()));
        Self {
            feature,
            core,
            reconciler,
        }
    }

    /// Build from the settings object the host stored for this button
    pub fn from_json(feature: F, raw: &Value, query: QueryConfig, host: Arc<dyn Host>) -> Result<Self> {
        Ok(Self::new(feature, parse_settings(raw)?, query, host))
    }

    pub fn press(&self, desired_state: Option<bool>) -> ToggleOutcome {
        let settings = self.core.settings();
        self.reconciler.toggle(&self.feature, &settings, desired_state)
    }

    pub fn poll(&self) -> PollOutcome {
        let settings = self.core.settings();
        self.reconciler.poll(&self.feature, &settings)
    }

    pub fn observed(&self) -> ObservedState {
        self.reconciler.observed()
    }

    pub fn settings(&self) -> F::Settings {
        self.core.settings()
    }

    pub fn driver(&self) -> &QueryDriver {
        self.core.driver()
    }
}

impl<F: ToggleFeature> Action for ToggleAction<F> {
    fn key_pressed(&self, desired_state: Option<bool>) {
        info!("⌨️ {} key pressed", self.feature.name());
        self.press(desired_state);
    }

    fn on_tick(&self) {
        self.poll();
    }

    fn received_settings(&self, settings: Value) {
        self.core.update(&settings);
    }

    fn dispose(&self) {
        self.core.dispose();
    }
}
