use crate::domain::ports::OpponentGate;
use crate::utils::error::{AgentError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Waits for the operator to press Enter after the opponent has moved.
#[derive(Debug, Default)]
pub struct StdinGate;

#[async_trait]
impl OpponentGate for StdinGate {
    async fn wait_for_opponent(&self) -> Result<()> {
        println!("⏸️  Press Enter once the opponent has moved...");
        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            return Err(AgentError::ConfigError {
                message: "stdin closed; manual opponent detection needs a terminal".to_string(),
            });
        }
        Ok(())
    }
}

/// Assumes the opponent answers within a fixed delay.
#[derive(Debug, Clone)]
pub struct DelayGate {
    delay: Duration,
}

impl DelayGate {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl OpponentGate for DelayGate {
    async fn wait_for_opponent(&self) -> Result<()> {
        tracing::debug!(delay = ?self.delay, "waiting for opponent");
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
