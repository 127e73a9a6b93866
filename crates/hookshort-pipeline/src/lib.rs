//! Hook extraction and short-video pipeline.
//!
//! Wires the media backends from `hookshort-media` into a staged pipeline:
//! validation, hook extraction, composition and effects. Errors carry the
//! stage they came from; runs are logged with a per-run id.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;

pub use config::ConfigError;
pub use error::{ErrorKind, PipelineError, PipelineResult, Stage};
pub use logging::StageLogger;
pub use orchestrator::{default_output_path, Pipeline, ProcessOutcome, ProcessRequest};
