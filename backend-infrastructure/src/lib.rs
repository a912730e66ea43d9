pub mod backends;
pub mod bus;
pub mod config;
pub mod services;
pub mod store;

pub use backends::*;
pub use bus::*;
pub use config::*;
pub use services::*;
pub use store::*;
