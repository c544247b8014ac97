pub mod decoder;
pub mod mapper;
pub mod oracle;
pub mod orchestrator;
pub mod position;
pub mod rules;
pub mod scheduler;
pub mod tracker;

pub use decoder::{decode, DecodeError};
pub use oracle::{MoveOracleAdapter, OracleError};
pub use orchestrator::{Diagnostic, LoopExit, LoopPorts, LoopSettings, LoopState, OrchestrationLoop};
pub use position::PositionSnapshot;
pub use scheduler::{ActionScheduler, HumanizerProfile};
pub use tracker::{GameState, GameStateTracker, InitError, ReconcileOutcome};
