pub mod admission;
pub mod cookies;

pub use admission::*;
pub use cookies::*;
