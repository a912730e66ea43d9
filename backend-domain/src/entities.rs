// Domain entities

pub mod chat_event;
pub mod config;
pub mod envelope;
pub mod room;

pub use chat_event::*;
pub use config::*;
pub use envelope::*;
pub use room::*;
