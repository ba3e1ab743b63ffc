use crate::core::types::{ExecutionCredentials, OrderReceipt, SimulatedOrder};
use crate::execution::client::ExecutionClient;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::info;

const DEFAULT_HISTORY: usize = 256;

/// Acknowledges every order as simulated and keeps the most recent ones.
pub struct SimExecutionClient {
    orders: Mutex<VecDeque<SimulatedOrder>>,
    history: usize,
}

impl Default for SimExecutionClient {
    fn default() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }
}

impl SimExecutionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: usize) -> Self {
        Self {
            orders: Mutex::new(VecDeque::with_capacity(history.min(DEFAULT_HISTORY))),
            history,
        }
    }

    /// Oldest first.
    pub async fn submitted(&self) -> Vec<SimulatedOrder> {
        self.orders.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl ExecutionClient for SimExecutionClient {
    async fn submit_order(
        &self,
        order: &SimulatedOrder,
        credentials: &ExecutionCredentials,
    ) -> Result<OrderReceipt> {
        anyhow::ensure!(credentials.is_complete(), "incomplete execution credentials");
        info!(
            client_order_id = %order.client_order_id,
            token_id = %order.token_id,
            side = order.side.as_str(),
            price = %order.price,
            size = %order.size,
            "simulated order accepted"
        );

        if self.history > 0 {
            let mut orders = self.orders.lock().await;
            if orders.len() == self.history {
                orders.pop_front();
            }
            orders.push_back(order.clone());
        }
        metrics::counter!("orders_submitted_total", "mode" => "simulated").increment(1);

        Ok(OrderReceipt {
            client_order_id: order.client_order_id.clone(),
            status: "success".to_string(),
            simulated: true,
            ts_ms: Utc::now().timestamp_millis(),
        })
    }
}
