use crate::core::position::PositionSnapshot;
use crate::core::scheduler::HumanizerProfile;
use crate::domain::model::{BoardRegion, Color, MoveMethod, SearchBudget};
use crate::utils::error::{AgentError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Written by `setup`; required by `run`.
    pub board_region: Option<BoardRegion>,
    pub engine: EngineConfig,
    pub vision: VisionConfig,
    #[serde(default)]
    pub humanizer: HumanizerConfig,
    #[serde(default)]
    pub move_execution: MoveExecutionConfig,
    #[serde(default)]
    pub game_loop: GameLoopConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// 0..=20, passed as the UCI `Skill Level` option.
    pub skill_level: Option<u8>,
    pub depth: Option<u32>,
    pub time_limit_secs: Option<f64>,
    pub response_timeout_secs: Option<u64>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    pub endpoint: String,
    pub api_token: Option<String>,
    /// Overrides the built-in board-reading prompt.
    pub prompt: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Screenshot file the external capture tool keeps up to date.
    pub frame_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanizerConfig {
    pub enabled: bool,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub jitter_pixels: u32,
    pub hover_probability: f64,
    /// 1..=10
    pub skill_level: u8,
}

impl Default for HumanizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay_secs: 1.0,
            max_delay_secs: 3.5,
            jitter_pixels: 3,
            hover_probability: 0.3,
            skill_level: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveExecutionConfig {
    pub method: MoveMethod,
    /// External helper that performs pointer actions. Without it moves are
    /// only logged.
    pub command: Option<String>,
    pub command_args: Vec<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpponentDetection {
    #[default]
    Manual,
    Delay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLoopConfig {
    pub opponent_move_detection: OpponentDetection,
    pub opponent_delay_secs: u64,
    pub max_moves: Option<usize>,
    pub start_fen: Option<String>,
    /// Defaults to the color at the bottom of the board.
    pub play_as: Option<Color>,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            opponent_move_detection: OpponentDetection::Manual,
            opponent_delay_secs: 5,
            max_moves: None,
            start_fen: None,
            play_as: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub max_capture_retries: u32,
    pub oracle_retries: u32,
    pub oracle_backoff_ms: u64,
    pub recapture_delay_ms: u64,
    pub capture_timeout_secs: u64,
    /// Squares a reinterpreting move may touch directly: 2 reinterprets
    /// single-move deltas, 0 or 1 turns reinterpretation off.
    pub reconcile_tolerance: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_capture_retries: 3,
            oracle_retries: 2,
            oracle_backoff_ms: 500,
            recapture_delay_ms: 500,
            capture_timeout_secs: 5,
            reconcile_tolerance: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    pub journal_path: Option<String>,
}

impl AgentConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AgentError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(region) = &self.board_region {
            validation::validate_positive_number("board_region.width", region.width as usize, 8)?;
            validation::validate_positive_number("board_region.height", region.height as usize, 8)?;
        }

        validation::validate_non_empty_string("engine.path", &self.engine.path)?;
        if let Some(skill) = self.engine.skill_level {
            validation::validate_range("engine.skill_level", skill, 0, 20)?;
        }
        if let Some(depth) = self.engine.depth {
            validation::validate_positive_number("engine.depth", depth as usize, 1)?;
        }
        if let Some(limit) = self.engine.time_limit_secs {
            validation::validate_range("engine.time_limit_secs", limit, 0.01, 600.0)?;
        }

        validation::validate_url("vision.endpoint", &self.vision.endpoint)?;
        validation::validate_path("vision.frame_path", &self.vision.frame_path)?;
        validation::validate_file_extension(
            "vision.frame_path",
            &self.vision.frame_path,
            &["png", "jpg", "jpeg", "bmp"],
        )?;

        let h = &self.humanizer;
        validation::validate_range("humanizer.min_delay_secs", h.min_delay_secs, 0.0, 60.0)?;
        validation::validate_range("humanizer.max_delay_secs", h.max_delay_secs, 0.0, 60.0)?;
        validation::validate_ordered(
            "humanizer.min_delay_secs",
            h.min_delay_secs,
            "humanizer.max_delay_secs",
            h.max_delay_secs,
        )?;
        validation::validate_range("humanizer.hover_probability", h.hover_probability, 0.0, 1.0)?;
        validation::validate_range("humanizer.skill_level", h.skill_level, 1, 10)?;

        if let Some(command) = &self.move_execution.command {
            validation::validate_non_empty_string("move_execution.command", command)?;
        }

        if let Some(fen) = &self.game_loop.start_fen {
            PositionSnapshot::from_fen(fen).map_err(|e| AgentError::InvalidConfigValueError {
                field: "game_loop.start_fen".to_string(),
                value: fen.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(max_moves) = self.game_loop.max_moves {
            validation::validate_positive_number("game_loop.max_moves", max_moves, 1)?;
        }

        validation::validate_positive_number(
            "recovery.max_capture_retries",
            self.recovery.max_capture_retries as usize,
            1,
        )?;
        validation::validate_range(
            "recovery.reconcile_tolerance",
            self.recovery.reconcile_tolerance,
            0,
            2,
        )?;
        if let Some(path) = &self.logging.journal_path {
            validation::validate_path("logging.journal_path", path)?;
        }
        Ok(())
    }

    pub fn board_region(&self) -> Result<&BoardRegion> {
        validation::validate_required_field("board_region", &self.board_region)
    }

    pub fn play_as(&self, board: &BoardRegion) -> Color {
        self.game_loop
            .play_as
            .unwrap_or_else(|| board.orientation.bottom_color())
    }

    pub fn search_budget(&self) -> SearchBudget {
        let defaults = SearchBudget::default();
        SearchBudget {
            skill: self.engine.skill_level.unwrap_or(defaults.skill),
            depth: self.engine.depth.or(defaults.depth),
            time_limit: self
                .engine
                .time_limit_secs
                .map(Duration::from_secs_f64)
                .or(defaults.time_limit),
        }
    }

    /// Upper bound on one engine reply.
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.response_timeout_secs.unwrap_or(10))
    }

    pub fn vision_timeout(&self) -> Duration {
        Duration::from_secs(self.vision.timeout_secs.unwrap_or(60))
    }

    pub fn actuation_timeout(&self) -> Duration {
        Duration::from_secs(self.move_execution.timeout_secs.unwrap_or(10))
    }

    pub fn humanizer_profile(&self) -> HumanizerProfile {
        let h = &self.humanizer;
        if !h.enabled {
            return HumanizerProfile::instant();
        }
        HumanizerProfile {
            min_delay: Duration::from_secs_f64(h.min_delay_secs),
            max_delay: Duration::from_secs_f64(h.max_delay_secs),
            skill_level: h.skill_level,
            jitter_pixels: h.jitter_pixels,
            hover_probability: h.hover_probability,
            ..HumanizerProfile::default()
        }
    }

    pub fn start_position(&self) -> Result<PositionSnapshot> {
        match &self.game_loop.start_fen {
            Some(fen) => Ok(PositionSnapshot::from_fen(fen)?),
            None => Ok(PositionSnapshot::starting()),
        }
    }
}

impl Validate for AgentConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// 替換環境變數 (例如 ${API_KEY})；未設定的變數保持原樣
fn substitute_env_vars(content: &str) -> Result<String> {
    use regex::Regex;
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AgentError::ConfigError {
        message: format!("env substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

/// Stores `region` as the `[board_region]` table of the TOML file at
/// `path`, keeping every other key. The file is created if missing.
pub fn write_board_region<P: AsRef<Path>>(path: P, region: &BoardRegion) -> Result<()> {
    let path = path.as_ref();
    let mut table: toml::Table = if path.exists() {
        toml::from_str(&std::fs::read_to_string(path)?)?
    } else {
        toml::Table::new()
    };
    let value = toml::Value::try_from(region).map_err(|e| AgentError::ConfigError {
        message: format!("cannot encode board region: {}", e),
    })?;
    table.insert("board_region".to_string(), value);
    let rendered = toml::to_string_pretty(&table).map_err(|e| AgentError::ConfigError {
        message: format!("cannot render config: {}", e),
    })?;
    std::fs::write(path, rendered)?;
    tracing::info!(path = %path.display(), "board region saved");
    Ok(())
}
