pub mod context;
pub mod lifecycle;
pub mod logging;

pub use context::AppContext;
pub use lifecycle::{run_standalone, spawn_relay, RelayHandle};

pub async fn run() -> anyhow::Result<()> {
    let context = AppContext::load().await?;
    run_standalone(context).await
}
