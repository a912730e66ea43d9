// Domain value objects
pub mod bus_channel;
pub mod event_kind;
pub mod identifiers;

pub use bus_channel::*;
pub use event_kind::*;
pub use identifiers::*;
