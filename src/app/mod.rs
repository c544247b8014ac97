// Application wiring: builds a playing session from configuration.

pub mod agent;

pub use agent::{RunOptions, Session};
