//! # quizwire-server
//!
//! The Quizwire session server: WebSocket connection handling, frame
//! dispatch, configuration, and metrics around the core session layer.

pub mod config;
pub mod handlers;
pub mod metrics;

pub use config::Config;
pub use handlers::{app, run_server, AppState};
