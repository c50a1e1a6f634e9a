mod client;
mod envelope;
mod notification;

pub use client::{EventService, SubscriptionClient};
pub use envelope::{
    format_soap_time, new_message_id, render_renew, render_subscribe, render_unsubscribe,
};
pub use notification::{classify, Notification};
