// Adapters layer: concrete implementations of the domain ports (engine
// process, vision HTTP endpoint, screenshot file, pointer helper, journal).

pub mod actuator;
pub mod frame;
pub mod gate;
pub mod journal;
pub mod uci_engine;
pub mod vision_http;

pub use actuator::{CommandActuator, DryRunActuator};
pub use frame::FileFrameSource;
pub use gate::{DelayGate, StdinGate};
pub use journal::CsvJournal;
pub use uci_engine::{EngineOptions, UciEngine};
pub use vision_http::HttpVisionOracle;
