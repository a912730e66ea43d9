pub mod admission;
pub mod expiry_watcher;
pub mod lifecycle;

pub use admission::*;
pub use expiry_watcher::*;
pub use lifecycle::*;
