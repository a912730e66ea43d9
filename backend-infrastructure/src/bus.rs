pub mod memory_bus;
pub mod redis_bus;

pub use memory_bus::*;
pub use redis_bus::*;
