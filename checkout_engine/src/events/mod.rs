//! Typed checkout outcome events.
//!
//! The coordinator never shows notifications or navigates. It publishes events, and whoever owns the front end
//! subscribes with [`EventHooks`].
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
