//! Turn-by-turn state machine driving capture, reconciliation, move choice
//! and actuation.
//!
//! One [`OrchestrationLoop`] owns the session's [`GameState`]; nothing else
//! writes it. Every external call is bounded by a timeout, and a failed
//! call is a transition, never a pending future.

use crate::core::decoder;
use crate::core::mapper;
use crate::core::oracle::{MoveOracleAdapter, OracleError};
use crate::core::position::PositionSnapshot;
use crate::core::scheduler::ActionScheduler;
use crate::core::tracker::{GameState, GameStateTracker, Mismatch, ReconcileOutcome};
use crate::domain::model::{
    ActionRequest, Actuation, BoardRegion, Color, DevicePoint, GameStatus, JournalEntry, Move,
    MoveSource, SearchBudget, Square,
};
use crate::domain::ports::{Actuator, FrameSource, MoveJournal, OpponentGate, VisionOracle};
use crate::utils::error::AgentError;
use crate::utils::monitor::SystemMonitor;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Observable position of the loop in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingCapture,
    Decoding,
    Reconciling,
    Confirmed,
    Inconsistent,
    SelectingMove,
    Mapping,
    Scheduling,
    AwaitingConfirmation,
    AwaitingOpponent,
    NeedsManualIntervention,
    GameOver,
    /// Move limit reached or aborted.
    Stopped,
}

enum Phase {
    AwaitingCapture,
    Decoding(Vec<u8>),
    Reconciling(PositionSnapshot),
    Confirmed,
    Inconsistent(Failure),
    SelectingMove,
    Mapping(Move),
    Scheduling(Move, DevicePoint, DevicePoint),
    AwaitingConfirmation(Move, ActionRequest),
    AwaitingOpponent,
    Finished(LoopExit),
}

impl Phase {
    fn state(&self) -> LoopState {
        match self {
            Phase::AwaitingCapture => LoopState::AwaitingCapture,
            Phase::Decoding(_) => LoopState::Decoding,
            Phase::Reconciling(_) => LoopState::Reconciling,
            Phase::Confirmed => LoopState::Confirmed,
            Phase::Inconsistent(_) => LoopState::Inconsistent,
            Phase::SelectingMove => LoopState::SelectingMove,
            Phase::Mapping(_) => LoopState::Mapping,
            Phase::Scheduling(..) => LoopState::Scheduling,
            Phase::AwaitingConfirmation(..) => LoopState::AwaitingConfirmation,
            Phase::AwaitingOpponent => LoopState::AwaitingOpponent,
            Phase::Finished(LoopExit::NeedsManualIntervention(_)) => LoopState::NeedsManualIntervention,
            Phase::Finished(LoopExit::GameOver(_)) => LoopState::GameOver,
            Phase::Finished(_) => LoopState::Stopped,
        }
    }
}

/// Why a perception or actuation cycle failed.
#[derive(Debug, Clone)]
struct Failure {
    reason: String,
    mismatch: Option<Mismatch>,
}

impl Failure {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            mismatch: None,
        }
    }
}

/// Structured report emitted before halting automated play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub reason: String,
    pub expected: Option<String>,
    pub observed: Option<String>,
    pub differing: Vec<Square>,
    pub attempts: u32,
    pub last_confirmed_fen: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} attempt(s)", self.reason, self.attempts)?;
        if let (Some(expected), Some(observed)) = (&self.expected, &self.observed) {
            write!(f, "; expected {} observed {}", expected, observed)?;
        }
        if !self.differing.is_empty() {
            let squares: Vec<String> = self.differing.iter().map(|s| s.to_string()).collect();
            write!(f, "; differing [{}]", squares.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    GameOver(GameStatus),
    NeedsManualIntervention(Diagnostic),
    MoveLimitReached(usize),
    Aborted,
}

impl From<Diagnostic> for AgentError {
    fn from(diagnostic: Diagnostic) -> Self {
        AgentError::ManualInterventionError {
            message: diagnostic.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub play_as: Color,
    pub budget: SearchBudget,
    pub max_capture_retries: u32,
    pub oracle_retries: u32,
    pub oracle_backoff: Duration,
    pub recapture_delay: Duration,
    pub capture_timeout: Duration,
    pub vision_timeout: Duration,
    pub actuation_timeout: Duration,
    /// `None` waits for the opponent without limit.
    pub opponent_timeout: Option<Duration>,
    pub max_moves: Option<usize>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            play_as: Color::White,
            budget: SearchBudget::default(),
            max_capture_retries: 3,
            oracle_retries: 2,
            oracle_backoff: Duration::from_millis(500),
            recapture_delay: Duration::from_millis(500),
            capture_timeout: Duration::from_secs(5),
            vision_timeout: Duration::from_secs(60),
            actuation_timeout: Duration::from_secs(10),
            opponent_timeout: None,
            max_moves: None,
        }
    }
}

/// External collaborators the loop drives.
pub struct LoopPorts {
    pub frames: Box<dyn FrameSource>,
    pub vision: Box<dyn VisionOracle>,
    pub actuator: Box<dyn Actuator>,
    pub gate: Box<dyn OpponentGate>,
    pub journal: Option<Box<dyn MoveJournal>>,
}

async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> Result<T, AgentError>
where
    F: Future<Output = Result<T, AgentError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::TimeoutError {
            operation: operation.to_string(),
            after: limit,
        }),
    }
}

pub struct OrchestrationLoop {
    tracker: GameStateTracker,
    state: GameState,
    oracle: MoveOracleAdapter,
    scheduler: ActionScheduler,
    board: BoardRegion,
    ports: LoopPorts,
    settings: LoopSettings,
    monitor: Option<SystemMonitor>,
    phase: Phase,
    pending: Option<Move>,
    /// Set once the opponent gate opened and cleared when a board commits.
    awaiting_reply: bool,
    attempts: u32,
    moves_played: usize,
}

impl OrchestrationLoop {
    pub fn new(
        tracker: GameStateTracker,
        state: GameState,
        oracle: MoveOracleAdapter,
        scheduler: ActionScheduler,
        board: BoardRegion,
        ports: LoopPorts,
        settings: LoopSettings,
    ) -> Self {
        Self {
            tracker,
            state,
            oracle,
            scheduler,
            board,
            ports,
            settings,
            monitor: None,
            phase: Phase::AwaitingCapture,
            pending: None,
            awaiting_reply: false,
            attempts: 0,
            moves_played: 0,
        }
    }

    pub fn with_monitor(mut self, monitor: SystemMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Last confirmed game state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn current(&self) -> LoopState {
        self.phase.state()
    }

    pub fn moves_played(&self) -> usize {
        self.moves_played
    }

    pub fn monitor(&self) -> Option<&SystemMonitor> {
        self.monitor.as_ref()
    }

    /// Runs turns until a terminal state.
    pub async fn run(&mut self) -> LoopExit {
        loop {
            if let Some(exit) = self.step().await {
                return exit;
            }
        }
    }

    /// Like [`run`](Self::run), but gives up as soon as `abort` resolves.
    /// The game state stays at its last confirmed value.
    pub async fn run_until<A: Future<Output = ()>>(&mut self, abort: A) -> LoopExit {
        tokio::pin!(abort);
        let exit = tokio::select! {
            biased;
            _ = &mut abort => LoopExit::Aborted,
            exit = self.run() => exit,
        };
        if exit == LoopExit::Aborted {
            tracing::warn!(fen = %self.state.position(), "aborted; last confirmed position kept");
        }
        exit
    }

    /// Performs one transition. Returns the exit once a terminal state is
    /// reached; further calls keep returning it.
    pub async fn step(&mut self) -> Option<LoopExit> {
        let phase = std::mem::replace(&mut self.phase, Phase::AwaitingCapture);
        let next = match phase {
            Phase::AwaitingCapture => self.capture().await,
            Phase::Decoding(frame) => self.decode(frame).await,
            Phase::Reconciling(observed) => self.reconcile(observed),
            Phase::Confirmed => self.after_confirmation(),
            Phase::Inconsistent(failure) => self.recover(failure).await,
            Phase::SelectingMove => self.select_move().await,
            Phase::Mapping(mv) => {
                let (origin, destination) = mapper::to_regions(&mv, &self.board);
                tracing::debug!(%mv, ?origin, ?destination, "move mapped to device points");
                Phase::Scheduling(mv, origin, destination)
            }
            Phase::Scheduling(mv, origin, destination) => {
                let request = self.scheduler.schedule(origin, destination);
                Phase::AwaitingConfirmation(mv, request)
            }
            Phase::AwaitingConfirmation(mv, request) => self.actuate(mv, request).await,
            Phase::AwaitingOpponent => self.await_opponent().await,
            Phase::Finished(exit) => Phase::Finished(exit),
        };
        self.phase = next;
        match &self.phase {
            Phase::Finished(exit) => Some(exit.clone()),
            _ => None,
        }
    }

    async fn capture(&mut self) -> Phase {
        match bounded("frame capture", self.settings.capture_timeout, self.ports.frames.capture()).await {
            Ok(frame) => Phase::Decoding(frame),
            Err(e) => Phase::Inconsistent(Failure::new(format!("capture failed: {e}"))),
        }
    }

    async fn decode(&mut self, frame: Vec<u8>) -> Phase {
        let labels = match bounded(
            "vision oracle",
            self.settings.vision_timeout,
            self.ports.vision.read_board(&frame),
        )
        .await
        {
            Ok(labels) => labels,
            Err(e) => return Phase::Inconsistent(Failure::new(format!("vision failed: {e}"))),
        };
        match decoder::decode(&labels) {
            Ok(snapshot) => Phase::Reconciling(snapshot),
            Err(e) => Phase::Inconsistent(Failure::new(e.to_string())),
        }
    }

    fn reconcile(&mut self, observed: PositionSnapshot) -> Phase {
        let before = self.state.position().clone();
        let history_len = self.state.history().len();
        let expected = self.pending;
        let outcome = if self.awaiting_reply && expected.is_none() {
            self.tracker.reconcile_reply(&mut self.state, &observed)
        } else {
            self.tracker.reconcile(&mut self.state, &observed, expected.as_ref())
        };
        tracing::info!(
            ?outcome,
            expected = ?expected.map(|m| m.to_string()),
            awaiting_reply = self.awaiting_reply,
            "reconciled"
        );

        match outcome {
            ReconcileOutcome::Inconsistent(mismatch) => Phase::Inconsistent(Failure {
                reason: mismatch.reason.clone(),
                mismatch: Some(mismatch),
            }),
            ReconcileOutcome::Unchanged => {
                self.pending = None;
                self.attempts += 1;
                if self.attempts >= self.settings.max_capture_retries {
                    return self.escalate(Failure::new("issued move never appeared on the board"));
                }
                tracing::warn!(attempt = self.attempts, "move did not land, selecting again");
                Phase::SelectingMove
            }
            ReconcileOutcome::Confirmed(_)
            | ReconcileOutcome::ReinterpretedAsOpponentMove(_)
            | ReconcileOutcome::Resynchronized => {
                if expected.is_some() && self.state.history().get(history_len) == expected.as_ref() {
                    self.moves_played += 1;
                }
                self.journal(&before, history_len, expected);
                if let Some(monitor) = &self.monitor {
                    for ply in history_len + 1..=self.state.history().len() {
                        monitor.record_ply(ply);
                    }
                }
                self.pending = None;
                self.awaiting_reply = false;
                self.attempts = 0;
                Phase::Confirmed
            }
        }
    }

    fn journal(&self, before: &PositionSnapshot, history_len: usize, expected: Option<Move>) {
        let Some(journal) = &self.ports.journal else {
            return;
        };
        let mut position = before.clone();
        for (offset, mv) in self.state.history()[history_len..].iter().enumerate() {
            let mover = position.side_to_move;
            position = position.apply_move(mv);
            let source = if offset == 0 && expected == Some(*mv) {
                MoveSource::Engine
            } else {
                MoveSource::Observed
            };
            let entry = JournalEntry {
                ply: history_len + offset + 1,
                mover,
                mv: *mv,
                source,
                fen: position.to_fen(),
            };
            if let Err(e) = journal.record(&entry) {
                tracing::warn!(error = %e, "failed to write move journal");
            }
        }
    }

    fn after_confirmation(&mut self) -> Phase {
        match self.state.status() {
            Ok(status) if status.is_over() => {
                tracing::info!(%status, fen = %self.state.position(), "game over");
                return Phase::Finished(LoopExit::GameOver(status));
            }
            Ok(_) => {}
            Err(e) => return self.escalate(Failure::new(e.to_string())),
        }
        if let Some(limit) = self.settings.max_moves {
            if self.moves_played >= limit {
                tracing::info!(limit, "move limit reached");
                return Phase::Finished(LoopExit::MoveLimitReached(self.moves_played));
            }
        }
        if self.state.side_to_move() == self.settings.play_as {
            Phase::SelectingMove
        } else {
            Phase::AwaitingOpponent
        }
    }

    async fn recover(&mut self, failure: Failure) -> Phase {
        self.attempts += 1;
        if self.attempts >= self.settings.max_capture_retries {
            return self.escalate(failure);
        }
        tracing::warn!(
            attempt = self.attempts,
            max = self.settings.max_capture_retries,
            reason = %failure.reason,
            "inconsistent observation, capturing again"
        );
        tokio::time::sleep(self.settings.recapture_delay).await;
        Phase::AwaitingCapture
    }

    async fn select_move(&mut self) -> Phase {
        let mut attempt = 0;
        loop {
            match self.oracle.get_move(&self.state, &self.settings.budget).await {
                Ok(mv) => return Phase::Mapping(mv),
                Err(e @ OracleError::IllegalMove { .. }) => {
                    return self.escalate(Failure::new(e.to_string()));
                }
                Err(e) if attempt < self.settings.oracle_retries => {
                    attempt += 1;
                    let backoff = self.settings.oracle_backoff * attempt;
                    tracing::warn!(error = %e, attempt, ?backoff, "move oracle failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return self.escalate(Failure::new(e.to_string())),
            }
        }
    }

    async fn actuate(&mut self, mv: Move, request: ActionRequest) -> Phase {
        self.pending = Some(mv);
        tokio::time::sleep(request.pre_delay()).await;
        tracing::info!(%mv, origin = ?request.origin, destination = ?request.destination, "issuing move");
        match bounded(
            "actuator",
            self.settings.actuation_timeout,
            self.ports.actuator.perform(&request),
        )
        .await
        {
            Ok(Actuation::Landed) | Ok(Actuation::Unverified) => Phase::AwaitingCapture,
            Ok(Actuation::Missed) => {
                Phase::Inconsistent(Failure::new(format!("actuator reports {mv} missed its target")))
            }
            Err(e) => Phase::Inconsistent(Failure::new(format!("actuation failed: {e}"))),
        }
    }

    async fn await_opponent(&mut self) -> Phase {
        tracing::info!(side = %self.state.side_to_move(), "waiting for opponent");
        let result = match self.settings.opponent_timeout {
            Some(limit) => bounded("opponent gate", limit, self.ports.gate.wait_for_opponent()).await,
            None => self.ports.gate.wait_for_opponent().await,
        };
        match result {
            Ok(()) => {
                self.awaiting_reply = true;
                Phase::AwaitingCapture
            }
            Err(e) => Phase::Inconsistent(Failure::new(format!("opponent gate failed: {e}"))),
        }
    }

    fn escalate(&mut self, failure: Failure) -> Phase {
        let (expected, observed, differing) = match failure.mismatch {
            Some(m) => (Some(m.expected), Some(m.observed), m.differing),
            None => (None, None, Vec::new()),
        };
        let diagnostic = Diagnostic {
            reason: failure.reason,
            expected,
            observed,
            differing,
            attempts: self.attempts,
            last_confirmed_fen: self.state.position().to_fen(),
        };
        tracing::error!(
            reason = %diagnostic.reason,
            expected = ?diagnostic.expected,
            observed = ?diagnostic.observed,
            differing = ?diagnostic.differing.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            attempts = diagnostic.attempts,
            last_confirmed = %diagnostic.last_confirmed_fen,
            "automated play halted, manual intervention needed"
        );
        Phase::Finished(LoopExit::NeedsManualIntervention(diagnostic))
    }
}
