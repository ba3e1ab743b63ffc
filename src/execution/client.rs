use crate::core::types::{ExecutionCredentials, OrderReceipt, SimulatedOrder};
use anyhow::Result;
use async_trait::async_trait;

/// Order sink. Implementations never sign; a live CLOB client would add signing on its side.
#[async_trait]
pub trait ExecutionClient: Send + Sync + 'static {
    async fn submit_order(
        &self,
        order: &SimulatedOrder,
        credentials: &ExecutionCredentials,
    ) -> Result<OrderReceipt>;
}
