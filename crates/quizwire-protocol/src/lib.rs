//! # quizwire-protocol
//!
//! Wire protocol definitions for the Quizwire session server.
//!
//! This crate defines the binary protocol spoken between quiz viewers and
//! the server, including frame types and the length-prefixed MessagePack
//! codec. The wire `type` tags mirror the event names the deployed clients
//! already emit.
//!
//! ## Frame Types
//!
//! - `joinQuiz` / `quizNotFound` - Quiz group enrollment
//! - `Set` - Reveal-flag changes, relayed in both directions
//! - `array` / `arraydata` - Score list request and reply
//! - `error`, `ping` / `pong`, `connected` - Transport housekeeping
//!
//! ## Example
//!
//! ```rust
//! use quizwire_protocol::{Frame, codec};
//!
//! let frame = Frame::join_quiz("Math101");
//!
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, ProtocolError};
pub use frames::{Frame, FrameKind, PROTOCOL_VERSION};
