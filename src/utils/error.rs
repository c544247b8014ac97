use crate::core::decoder::DecodeError;
use crate::core::oracle::OracleError;
use crate::core::position::FenError;
use crate::core::rules::RulesError;
use crate::core::tracker::InitError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Board decoding failed: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("Game initialization failed: {0}")]
    InitError(#[from] InitError),

    #[error("Rules error: {0}")]
    RulesError(#[from] RulesError),

    #[error("Move oracle error: {0}")]
    OracleError(#[from] OracleError),

    #[error("Invalid board-state string: {0}")]
    FenError(#[from] FenError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed: {message}")]
    ConfigValidationError { message: String },

    #[error("Vision oracle error: {message}")]
    VisionError { message: String },

    #[error("Actuation error: {message}")]
    ActuationError { message: String },

    #[error("{operation} timed out after {after:?}")]
    TimeoutError { operation: String, after: Duration },

    #[error("Manual intervention required: {message}")]
    ManualInterventionError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Perception,
    Engine,
    Actuation,
    Game,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code: 1 for startup problems, 2 when play stopped for a
    /// human to look, 3 for system failures.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl AgentError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AgentError::ConfigError { .. }
            | AgentError::MissingConfigError { .. }
            | AgentError::InvalidConfigValueError { .. }
            | AgentError::ConfigValidationError { .. }
            | AgentError::TomlError(_) => ErrorCategory::Configuration,
            AgentError::DecodeError(_) | AgentError::VisionError { .. } => ErrorCategory::Perception,
            AgentError::OracleError(_) => ErrorCategory::Engine,
            AgentError::ActuationError { .. } => ErrorCategory::Actuation,
            AgentError::InitError(_)
            | AgentError::RulesError(_)
            | AgentError::FenError(_)
            | AgentError::ManualInterventionError { .. } => ErrorCategory::Game,
            AgentError::ApiError(_)
            | AgentError::CsvError(_)
            | AgentError::IoError(_)
            | AgentError::SerializationError(_)
            | AgentError::TimeoutError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AgentError::ManualInterventionError { .. } => ErrorSeverity::Medium,
            AgentError::DecodeError(_)
            | AgentError::VisionError { .. }
            | AgentError::ActuationError { .. }
            | AgentError::TimeoutError { .. }
            | AgentError::ApiError(_) => ErrorSeverity::Medium,
            AgentError::IoError(_) | AgentError::CsvError(_) | AgentError::SerializationError(_) => {
                ErrorSeverity::Critical
            }
            AgentError::OracleError(OracleError::Unavailable(_)) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check agent.toml (run `chess-agent setup` to capture the board region again)".to_string()
            }
            ErrorCategory::Perception => {
                "Make sure the whole board is visible and unobstructed, then retry".to_string()
            }
            ErrorCategory::Engine => match self {
                AgentError::OracleError(OracleError::IllegalMove { .. }) => {
                    "The engine and the tracked game disagree; verify the board and restart from the current position".to_string()
                }
                _ => "Check engine.path and that the engine starts from a shell".to_string(),
            },
            ErrorCategory::Actuation => {
                "Check the actuator command and that the board window has focus".to_string()
            }
            ErrorCategory::Game => {
                "Compare the logged expected and observed boards, fix the board by hand, and restart with game_loop.start_fen".to_string()
            }
            ErrorCategory::System => "Check file permissions, disk space and network access".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AgentError::ManualInterventionError { message } => {
                format!("Automated play stopped and needs a human: {}", message)
            }
            AgentError::MissingConfigError { field } => {
                format!("Required setting `{}` is missing", field)
            }
            AgentError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting `{}` is invalid: {}", field, reason)
            }
            AgentError::OracleError(e) => format!("Chess engine problem: {}", e),
            AgentError::DecodeError(e) => format!("Could not read the board: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_severity() {
        let config = AgentError::MissingConfigError {
            field: "engine.path".to_string(),
        };
        assert_eq!(config.category(), ErrorCategory::Configuration);
        assert_eq!(config.severity().exit_code(), 1);

        let manual = AgentError::ManualInterventionError {
            message: "retries exhausted".to_string(),
        };
        assert_eq!(manual.severity().exit_code(), 2);

        let io = AgentError::IoError(std::io::Error::other("disk"));
        assert_eq!(io.severity().exit_code(), 3);
    }

    #[test]
    fn test_user_friendly_message_mentions_field() {
        let err = AgentError::InvalidConfigValueError {
            field: "humanizer.hover_probability".to_string(),
            value: "1.5".to_string(),
            reason: "Value must be between 0 and 1".to_string(),
        };
        assert!(err.user_friendly_message().contains("humanizer.hover_probability"));
    }
}
