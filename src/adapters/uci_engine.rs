//! UCI engine subprocess as a [`MoveOracle`].

use crate::core::oracle::OracleError;
use crate::domain::model::SearchBudget;
use crate::domain::ports::MoveOracle;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
}

/// Line protocol over any reader/writer pair.
pub struct UciSession<R, W> {
    lines: Lines<R>,
    writer: W,
    skill: Option<u8>,
    searching: bool,
}

fn unavailable(e: impl std::fmt::Display) -> OracleError {
    OracleError::Unavailable(e.to_string())
}

impl<R, W> UciSession<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: reader.lines(),
            writer,
            skill: None,
            searching: false,
        }
    }

    async fn send(&mut self, command: &str) -> Result<(), OracleError> {
        tracing::trace!(command, "uci >");
        self.writer
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(unavailable)?;
        self.writer.flush().await.map_err(unavailable)
    }

    /// Reads until a line starting with `token`, returning that line.
    async fn wait_for(&mut self, token: &str) -> Result<String, OracleError> {
        loop {
            match self.lines.next_line().await.map_err(unavailable)? {
                Some(line) => {
                    tracing::trace!(line = %line, "uci <");
                    if line.trim_start().starts_with(token) {
                        return Ok(line);
                    }
                }
                None => return Err(OracleError::Unavailable(format!(
                    "engine closed its output while waiting for {token}"
                ))),
            }
        }
    }

    pub async fn handshake(&mut self, options: &EngineOptions) -> Result<(), OracleError> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;
        if let Some(threads) = options.threads {
            self.send(&format!("setoption name Threads value {threads}")).await?;
        }
        if let Some(hash) = options.hash_mb {
            self.send(&format!("setoption name Hash value {hash}")).await?;
        }
        self.send("isready").await?;
        self.wait_for("readyok").await?;
        Ok(())
    }

    pub async fn best_move(&mut self, fen: &str, budget: &SearchBudget) -> Result<String, OracleError> {
        // A previous request was cancelled mid-search; drain its answer.
        if self.searching {
            self.send("stop").await?;
            self.wait_for("bestmove").await?;
            self.searching = false;
        }
        if self.skill != Some(budget.skill) {
            self.send(&format!("setoption name Skill Level value {}", budget.skill.min(20)))
                .await?;
            self.skill = Some(budget.skill);
        }

        self.send(&format!("position fen {fen}")).await?;
        let mut go = String::from("go");
        if let Some(depth) = budget.depth {
            go.push_str(&format!(" depth {depth}"));
        }
        if let Some(limit) = budget.time_limit {
            go.push_str(&format!(" movetime {}", limit.as_millis()));
        }
        if budget.depth.is_none() && budget.time_limit.is_none() {
            go.push_str(" movetime 1000");
        }
        self.send(&go).await?;
        self.searching = true;

        let line = self.wait_for("bestmove").await?;
        self.searching = false;
        line.split_whitespace()
            .nth(1)
            .map(str::to_string)
            .ok_or_else(|| OracleError::Unavailable(format!("malformed engine reply: {line}")))
    }

    pub async fn quit(&mut self) -> Result<(), OracleError> {
        self.send("quit").await
    }
}

/// A spawned engine process. The process is killed when this is dropped.
pub struct UciEngine {
    session: Mutex<UciSession<BufReader<ChildStdout>, ChildStdin>>,
    child: Mutex<Child>,
}

impl UciEngine {
    pub async fn spawn(program: &str, args: &[String], options: &EngineOptions) -> Result<Self, OracleError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleError::Unavailable(format!("cannot start {program}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| unavailable("engine stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| unavailable("engine stdout not captured"))?;

        let mut session = UciSession::new(BufReader::new(stdout), stdin);
        session.handshake(options).await?;
        tracing::info!(program, "🧠 engine ready");

        Ok(Self {
            session: Mutex::new(session),
            child: Mutex::new(child),
        })
    }

    /// Asks the engine to exit and waits briefly before killing it.
    pub async fn shutdown(&self) {
        if let Err(e) = self.session.lock().await.quit().await {
            tracing::debug!(error = %e, "engine quit command failed");
        }
        let mut child = self.child.lock().await;
        match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "engine exited"),
            _ => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill engine");
                }
            }
        }
    }
}

#[async_trait]
impl MoveOracle for UciEngine {
    async fn best_move(&self, fen: &str, budget: &SearchBudget) -> Result<String, OracleError> {
        self.session.lock().await.best_move(fen, budget).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_handshake_then_search() {
        let reader = Builder::new()
            .read(b"id name Fake\nid author nobody\nuciok\n")
            .read(b"readyok\n")
            .read(b"info depth 1 score cp 20\nbestmove e2e4 ponder e7e5\n")
            .build();
        let writer = Builder::new()
            .write(b"uci\n")
            .write(b"setoption name Threads value 2\n")
            .write(b"isready\n")
            .write(b"setoption name Skill Level value 20\n")
            .write(b"position fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1\n")
            .write(b"go depth 15 movetime 1000\n")
            .build();
        let mut session = UciSession::new(BufReader::new(reader), writer);

        session
            .handshake(&EngineOptions {
                threads: Some(2),
                hash_mb: None,
            })
            .await
            .unwrap();
        let reply = session
            .best_move(crate::core::position::STARTING_FEN, &SearchBudget::default())
            .await
            .unwrap();

        assert_eq!(reply, "e2e4");
    }

    #[tokio::test]
    async fn test_closed_output_is_unavailable() {
        let reader = Builder::new().read(b"id name Fake\n").build();
        let writer = Builder::new().write(b"uci\n").build();
        let mut session = UciSession::new(BufReader::new(reader), writer);

        let err = session.handshake(&EngineOptions::default()).await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_engine_binary() {
        let result = UciEngine::spawn("/nonexistent/engine-binary", &[], &EngineOptions::default()).await;
        assert!(matches!(result, Err(OracleError::Unavailable(_))));
    }
}
