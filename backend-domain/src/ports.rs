// Port traits (interfaces)
// Define what the domain needs from the shared bus and store

pub mod bus;
pub mod services;
pub mod store;

pub use bus::*;
pub use services::*;
pub use store::*;
