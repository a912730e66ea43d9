pub mod connection_gateway;
pub mod fanout_bridge;
pub mod membership_hooks;

pub use connection_gateway::*;
pub use fanout_bridge::*;
pub use membership_hooks::*;
