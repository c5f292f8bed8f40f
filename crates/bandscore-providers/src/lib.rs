//! bandscore-providers: collaborator backends.
//!
//! Implements the `bandscore-core` collaborator traits against an HTTP
//! inference server, an OpenAI-compatible chat API (grammar correction),
//! and recorded fixtures for offline scoring, plus the configuration that
//! wires them into an [`Evaluator`](bandscore_core::engine::Evaluator).

pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod openai;
pub mod recorded;

pub use config::{build_evaluator, create_corrector, load_config, BackendConfig, BandscoreConfig};
pub use error::ProviderError;
