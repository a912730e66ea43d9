// Backend Application Layer

pub mod commands;
pub mod error;
pub mod metrics;
pub mod queries;
pub mod realtime;
pub mod rooms;
pub mod state;

pub use error::AppError;
pub use metrics::Metrics;
pub use state::AppState;
