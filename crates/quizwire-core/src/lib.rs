//! # quizwire-core
//!
//! Session registry, broadcast routing, and store bridging for the
//! Quizwire realtime quiz backend.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Session** - One live quiz group: membership plus fan-out channel
//! - **SessionRegistry** - Quiz-name → session and connection → membership maps
//! - **SessionEvent** - Reveal-flag changes relayed through a group
//! - **QuizStore / StateBridge** - The external document store and the
//!   translation layer in front of it
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌─────────────┐
//! │  Connection │────▶│  SessionRegistry │────▶│   Session   │
//! └─────────────┘     └──────────────────┘     └─────────────┘
//!        │
//!        ▼
//! ┌─────────────┐     ┌─────────────┐
//! │ StateBridge │────▶│  QuizStore  │
//! └─────────────┘     └─────────────┘
//! ```

pub mod bridge;
pub mod event;
pub mod registry;
pub mod session;
pub mod store;

pub use bridge::StateBridge;
pub use event::SessionEvent;
pub use registry::{Membership, RegistryConfig, RegistryError, SessionRegistry};
pub use session::Session;
pub use store::{MemoryStore, QuizDoc, QuizStatus, QuizStore, ScoreRecord, StoreError, StoreSeed};
