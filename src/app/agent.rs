use crate::adapters::{
    CommandActuator, CsvJournal, DelayGate, DryRunActuator, EngineOptions, FileFrameSource,
    HttpVisionOracle, StdinGate, UciEngine,
};
use crate::config::{AgentConfig, OpponentDetection};
use crate::core::{
    ActionScheduler, GameStateTracker, LoopExit, LoopPorts, LoopSettings, MoveOracleAdapter,
    OrchestrationLoop,
};
use crate::domain::ports::{Actuator, MoveJournal, OpponentGate};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub monitor: bool,
    pub max_moves: Option<usize>,
}

/// A ready-to-play session: the loop plus the engine process it owns.
pub struct Session {
    agent: OrchestrationLoop,
    engine: Arc<UciEngine>,
}

impl Session {
    /// Starts the engine and wires every collaborator from `config`.
    pub async fn build(config: &AgentConfig, options: &RunOptions) -> Result<Self> {
        let board = *config.board_region()?;
        let tracker = GameStateTracker::new(config.recovery.reconcile_tolerance);
        let state = tracker.initialize(config.start_position()?)?;

        let engine = Arc::new(
            UciEngine::spawn(
                &config.engine.path,
                &config.engine.args,
                &EngineOptions {
                    threads: config.engine.threads,
                    hash_mb: config.engine.hash_mb,
                },
            )
            .await?,
        );
        let oracle = MoveOracleAdapter::new(Box::new(engine.clone()), config.engine_timeout());

        let mut vision = HttpVisionOracle::new(&config.vision.endpoint, config.vision.api_token.clone())
            .with_timeout(config.vision_timeout());
        if let Some(prompt) = &config.vision.prompt {
            vision = vision.with_prompt(prompt);
        }

        let actuator: Box<dyn Actuator> = match (&config.move_execution.command, options.dry_run) {
            (Some(command), false) => Box::new(CommandActuator::new(
                command,
                config.move_execution.command_args.clone(),
            )),
            (None, false) => {
                tracing::warn!("no move_execution.command configured, moves will only be logged");
                Box::new(DryRunActuator)
            }
            (_, true) => Box::new(DryRunActuator),
        };

        let gate: Box<dyn OpponentGate> = match config.game_loop.opponent_move_detection {
            OpponentDetection::Manual => Box::new(StdinGate),
            OpponentDetection::Delay => Box::new(DelayGate::new(Duration::from_secs(
                config.game_loop.opponent_delay_secs,
            ))),
        };

        let journal: Option<Box<dyn MoveJournal>> = match &config.logging.journal_path {
            Some(path) => Some(Box::new(CsvJournal::open(path)?)),
            None => None,
        };

        let ports = LoopPorts {
            frames: Box::new(FileFrameSource::new(&config.vision.frame_path)),
            vision: Box::new(vision),
            actuator,
            gate,
            journal,
        };

        let settings = LoopSettings {
            play_as: config.play_as(&board),
            budget: config.search_budget(),
            max_capture_retries: config.recovery.max_capture_retries,
            oracle_retries: config.recovery.oracle_retries,
            oracle_backoff: Duration::from_millis(config.recovery.oracle_backoff_ms),
            recapture_delay: Duration::from_millis(config.recovery.recapture_delay_ms),
            capture_timeout: Duration::from_secs(config.recovery.capture_timeout_secs),
            // the adapter applies its own per-request timeout
            vision_timeout: config.vision_timeout() * 3,
            actuation_timeout: config.actuation_timeout(),
            opponent_timeout: None,
            max_moves: options.max_moves.or(config.game_loop.max_moves),
        };
        tracing::info!(
            play_as = %settings.play_as,
            skill = settings.budget.skill,
            max_moves = ?settings.max_moves,
            "session configured"
        );

        let scheduler = ActionScheduler::new(
            config.humanizer_profile(),
            config.move_execution.method,
            &board,
        );
        let mut agent = OrchestrationLoop::new(tracker, state, oracle, scheduler, board, ports, settings);
        if options.monitor {
            tracing::info!("🔍 System monitoring enabled");
            agent = agent.with_monitor(SystemMonitor::new(true));
        }

        Ok(Self { agent, engine })
    }

    /// Plays until a terminal state or until `abort` resolves, then stops
    /// the engine.
    pub async fn run_until<A: Future<Output = ()>>(mut self, abort: A) -> (LoopExit, OrchestrationLoop) {
        let exit = self.agent.run_until(abort).await;
        self.engine.shutdown().await;
        (exit, self.agent)
    }
}
