use super::ComponentState;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Lifecycle state per named component, shared with spawned tasks
#[derive(Clone, Default)]
pub struct ComponentStates {
    states: Arc<Mutex<BTreeMap<&'static str, ComponentState>>>,
}

impl ComponentStates {
    /// Start tracking `components`, all `Stopped`
    pub async fn register(&self, components: &[&'static str]) {
        let mut states = self.states.lock().await;
        for component in components {
            states.entry(component).or_insert(ComponentState::Stopped);
        }
    }

    pub async fn set(&self, component: &'static str, state: ComponentState) {
        debug!("Component '{}' state changed to: {:?}", component, state);
        self.states.lock().await.insert(component, state);
    }

    pub async fn get(&self, component: &str) -> Option<ComponentState> {
        self.states.lock().await.get(component).cloned()
    }

    /// Components currently in `state`
    pub async fn in_state(&self, state: ComponentState) -> Vec<&'static str> {
        self.states
            .lock()
            .await
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(name, _)| *name)
            .collect()
    }
}
