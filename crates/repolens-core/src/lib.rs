//! Configuration, component wiring and the question-answering entry point.

pub mod bootstrap;
pub mod config;
pub mod qa;
pub mod secret;

pub use config::Config;
pub use qa::{QaOutcome, QaResponse, QaService};
