pub mod message_handlers;
pub mod ops_handlers;
pub mod room_handlers;
pub mod socket_handlers;

pub use message_handlers::*;
pub use ops_handlers::*;
pub use room_handlers::*;
pub use socket_handlers::*;
