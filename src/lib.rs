pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{Cli, Command};

pub use config::AgentConfig;
pub use core::{
    decode, GameState, GameStateTracker, LoopExit, OrchestrationLoop, PositionSnapshot,
    ReconcileOutcome,
};
pub use domain::model::{BoardRegion, Move, Orientation, Square};
pub use utils::error::{AgentError, Result};
