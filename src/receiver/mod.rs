mod handlers;
mod server;

pub use handlers::{handle_notification, NotificationOutcome};
pub use server::EventServer;
