// Domain services
pub mod schema;

pub use schema::*;
