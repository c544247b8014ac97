use crate::core::oracle::OracleError;
use crate::domain::model::{ActionRequest, Actuation, JournalEntry, RawLabels, SearchBudget};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Source of board screenshots.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> Result<Vec<u8>>;
}

/// Reads piece labels off a screenshot.
#[async_trait]
pub trait VisionOracle: Send + Sync {
    async fn read_board(&self, frame: &[u8]) -> Result<RawLabels>;
}

/// Best-move provider. Receives a 6-field board-state string and answers
/// with a coordinate move string (`e2e4`, `e7e8q`).
#[async_trait]
pub trait MoveOracle: Send + Sync {
    async fn best_move(&self, fen: &str, budget: &SearchBudget) -> std::result::Result<String, OracleError>;
}

/// Performs pointer actions on the device.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn perform(&self, request: &ActionRequest) -> Result<Actuation>;
}

/// Blocks until the opponent has moved.
#[async_trait]
pub trait OpponentGate: Send + Sync {
    async fn wait_for_opponent(&self) -> Result<()>;
}

pub trait MoveJournal: Send + Sync {
    fn record(&self, entry: &JournalEntry) -> Result<()>;
}

#[async_trait]
impl<T: MoveOracle + ?Sized> MoveOracle for std::sync::Arc<T> {
    async fn best_move(&self, fen: &str, budget: &SearchBudget) -> std::result::Result<String, OracleError> {
        (**self).best_move(fen, budget).await
    }
}
