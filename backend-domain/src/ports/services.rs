use async_trait::async_trait;

#[async_trait]
pub trait HealthCheckService: Send + Sync {
    async fn check_bus(&self) -> anyhow::Result<bool>;
    async fn check_store(&self) -> anyhow::Result<bool>;
}
