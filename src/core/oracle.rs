use crate::core::tracker::GameState;
use crate::domain::model::{Move, SearchBudget};
use crate::domain::ports::MoveOracle;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("oracle proposed {reply:?}, which is not legal in {fen}")]
    IllegalMove { reply: String, fen: String },

    #[error("move oracle unavailable: {0}")]
    Unavailable(String),

    #[error("move oracle gave no answer within {0:?}")]
    Timeout(Duration),
}

/// Puts a timeout and an independent legality check around a [`MoveOracle`].
pub struct MoveOracleAdapter {
    oracle: Box<dyn MoveOracle>,
    wait: Duration,
}

impl MoveOracleAdapter {
    pub fn new(oracle: Box<dyn MoveOracle>, wait: Duration) -> Self {
        Self { oracle, wait }
    }

    /// Asks the oracle for a move in the authoritative position.
    ///
    /// The reply must parse as a coordinate move and be in the legal-move
    /// set generated from `state`; otherwise the result is
    /// [`OracleError::IllegalMove`]. The state is never touched.
    pub async fn get_move(&self, state: &GameState, budget: &SearchBudget) -> Result<Move, OracleError> {
        let fen = state.position().to_fen();
        tracing::debug!(%fen, skill = budget.skill, depth = ?budget.depth, "querying move oracle");

        let reply = match tokio::time::timeout(self.wait, self.oracle.best_move(&fen, budget)).await {
            Ok(reply) => reply?,
            Err(_) => return Err(OracleError::Timeout(self.wait)),
        };
        let reply = reply.trim().to_string();
        let illegal = || OracleError::IllegalMove {
            reply: reply.clone(),
            fen: fen.clone(),
        };

        let mv: Move = reply.parse().map_err(|_| illegal())?;
        let legal = state
            .legal_moves()
            .map_err(|e| OracleError::Unavailable(format!("cannot generate legal moves: {e}")))?;
        if !legal.contains(&mv) {
            tracing::warn!(%reply, %fen, "oracle move rejected by legality check");
            return Err(illegal());
        }

        tracing::info!(%mv, "oracle move accepted");
        Ok(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::position::PositionSnapshot;
    use crate::core::tracker::GameStateTracker;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl MoveOracle for Fixed {
        async fn best_move(&self, _fen: &str, _budget: &SearchBudget) -> Result<String, OracleError> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    #[async_trait]
    impl MoveOracle for Down {
        async fn best_move(&self, _fen: &str, _budget: &SearchBudget) -> Result<String, OracleError> {
            Err(OracleError::Unavailable("engine exited".to_string()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl MoveOracle for Stalled {
        async fn best_move(&self, _fen: &str, _budget: &SearchBudget) -> Result<String, OracleError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("e2e4".to_string())
        }
    }

    fn state() -> GameState {
        GameStateTracker::default()
            .initialize(PositionSnapshot::starting())
            .unwrap()
    }

    fn adapter(oracle: impl MoveOracle + 'static) -> MoveOracleAdapter {
        MoveOracleAdapter::new(Box::new(oracle), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_legal_move_accepted() {
        let mv = adapter(Fixed("g1f3\n"))
            .get_move(&state(), &SearchBudget::default())
            .await
            .unwrap();
        assert_eq!(mv.to_string(), "g1f3");
    }

    #[tokio::test]
    async fn test_illegal_move_rejected() {
        let state = state();
        let before = state.clone();
        for reply in ["e2e5", "e7e5", "(none)", "garbage"] {
            let err = adapter(Fixed(reply))
                .get_move(&state, &SearchBudget::default())
                .await
                .unwrap_err();
            assert!(matches!(err, OracleError::IllegalMove { .. }), "{reply}");
        }
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_unavailable_passes_through() {
        let err = adapter(Down)
            .get_move(&state(), &SearchBudget::default())
            .await
            .unwrap_err();
        assert_eq!(err, OracleError::Unavailable("engine exited".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_oracle_times_out() {
        let err = adapter(Stalled)
            .get_move(&state(), &SearchBudget::default())
            .await
            .unwrap_err();
        assert_eq!(err, OracleError::Timeout(Duration::from_millis(50)));
    }
}
