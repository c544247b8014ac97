use crate::domain::model::{JournalEntry, MoveSource};
use crate::domain::ports::MoveJournal;
use crate::utils::error::{AgentError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Serialize)]
struct JournalRow<'a> {
    recorded_at: DateTime<Utc>,
    ply: usize,
    mover: &'a str,
    #[serde(rename = "move")]
    mv: String,
    source: &'a str,
    fen: &'a str,
}

/// Appends committed plies to a CSV file, one row each.
pub struct CsvJournal {
    path: PathBuf,
    writer: Mutex<csv::Writer<std::fs::File>>,
}

impl CsvJournal {
    /// Opens `path` for appending; the header is written only for a new or
    /// empty file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let fresh = file.metadata()?.len() == 0;
        let writer = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(file);
        tracing::info!("📁 Move journal: {}", path.display());
        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl MoveJournal for CsvJournal {
    fn record(&self, entry: &JournalEntry) -> Result<()> {
        let row = JournalRow {
            recorded_at: Utc::now(),
            ply: entry.ply,
            mover: entry.mover.as_str(),
            mv: entry.mv.to_string(),
            source: match entry.source {
                MoveSource::Engine => "engine",
                MoveSource::Observed => "observed",
            },
            fen: &entry.fen,
        };
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| AgentError::IoError(std::io::Error::other("move journal lock poisoned")))?;
        writer.serialize(&row)?;
        writer.flush()?;
        Ok(())
    }
}
