mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::{OnvifcamOrchestrator, ShutdownTrigger};
pub use state::ComponentStates;
pub use types::{ComponentState, ShutdownReason};
