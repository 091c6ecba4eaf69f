//! Frame types for the Quizwire protocol.
//!
//! Frames are the fundamental unit of communication between quiz viewers
//! and the server. Each frame is serialized using MessagePack. The wire
//! `type` tags (`joinQuiz`, `Set`, `array`, `arraydata`, `quizNotFound`)
//! are fixed by deployed clients and must not change.

use serde::{Deserialize, Serialize};

/// Current protocol version, reported in the `connected` handshake.
pub const PROTOCOL_VERSION: u8 = 1;

/// Frame type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum FrameKind {
    JoinQuiz = 0x01,
    SetReveal = 0x02,
    ScoreRequest = 0x03,
    ScoreList = 0x04,
    QuizNotFound = 0x05,
    Error = 0x06,
    Ping = 0x07,
    Pong = 0x08,
    Connected = 0x09,
}

impl From<FrameKind> for u8 {
    fn from(kind: FrameKind) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match value {
            0x01 => Ok(FrameKind::JoinQuiz),
            0x02 => Ok(FrameKind::SetReveal),
            0x03 => Ok(FrameKind::ScoreRequest),
            0x04 => Ok(FrameKind::ScoreList),
            0x05 => Ok(FrameKind::QuizNotFound),
            0x06 => Ok(FrameKind::Error),
            0x07 => Ok(FrameKind::Ping),
            0x08 => Ok(FrameKind::Pong),
            0x09 => Ok(FrameKind::Connected),
            _ => Err("Invalid frame kind"),
        }
    }
}

/// A protocol frame.
///
/// Client-originated frames are `joinQuiz`, `Set`, `array`, and `ping`.
/// Everything else flows server to client. `Set` is the one frame relayed
/// in both directions: a viewer toggles the reveal flag and every other
/// member of the same quiz group observes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Enroll this connection in a quiz group by quiz name.
    #[serde(rename = "joinQuiz")]
    JoinQuiz {
        /// Human-chosen quiz name, unique in the store.
        quiz: String,
    },

    /// Set the reveal flag: relayed to peers and persisted on the quiz document.
    #[serde(rename = "Set")]
    SetReveal {
        /// New reveal state.
        value: bool,
    },

    /// Request the current score list for the joined quiz.
    #[serde(rename = "array")]
    ScoreRequest,

    /// Score list reply, sent only to the requester.
    #[serde(rename = "arraydata")]
    ScoreList {
        /// One `"<user_id>: <score>"` line per participant, in user-id order.
        scores: Vec<String>,
    },

    /// Join failed: no quiz document with the attempted name.
    #[serde(rename = "quizNotFound")]
    QuizNotFound {
        /// The quiz name that missed.
        quiz: String,
    },

    /// Error response for malformed or unexpected frames.
    #[serde(rename = "error")]
    Error {
        /// Error code.
        code: u16,
        /// Human-readable error message.
        message: String,
    },

    /// Keepalive ping.
    #[serde(rename = "ping")]
    Ping {
        /// Optional timestamp.
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Keepalive pong.
    #[serde(rename = "pong")]
    Pong {
        /// Echoed timestamp from ping.
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Connection established response, sent once after upgrade.
    #[serde(rename = "connected")]
    Connected {
        /// Unique connection identifier.
        connection_id: String,
        /// Protocol version the server speaks.
        version: u8,
        /// Recommended heartbeat interval in milliseconds.
        heartbeat: u32,
    },
}

impl Frame {
    /// Get the frame kind.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::JoinQuiz { .. } => FrameKind::JoinQuiz,
            Frame::SetReveal { .. } => FrameKind::SetReveal,
            Frame::ScoreRequest => FrameKind::ScoreRequest,
            Frame::ScoreList { .. } => FrameKind::ScoreList,
            Frame::QuizNotFound { .. } => FrameKind::QuizNotFound,
            Frame::Error { .. } => FrameKind::Error,
            Frame::Ping { .. } => FrameKind::Ping,
            Frame::Pong { .. } => FrameKind::Pong,
            Frame::Connected { .. } => FrameKind::Connected,
        }
    }

    /// Create a new `joinQuiz` frame.
    #[must_use]
    pub fn join_quiz(quiz: impl Into<String>) -> Self {
        Frame::JoinQuiz { quiz: quiz.into() }
    }

    /// Create a new `Set` frame.
    #[must_use]
    pub fn set_reveal(value: bool) -> Self {
        Frame::SetReveal { value }
    }

    /// Create a new `array` frame.
    #[must_use]
    pub fn score_request() -> Self {
        Frame::ScoreRequest
    }

    /// Create a new `arraydata` frame.
    #[must_use]
    pub fn score_list(scores: Vec<String>) -> Self {
        Frame::ScoreList { scores }
    }

    /// Create a new `quizNotFound` frame.
    #[must_use]
    pub fn quiz_not_found(quiz: impl Into<String>) -> Self {
        Frame::QuizNotFound { quiz: quiz.into() }
    }

    /// Create a new `error` frame.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Frame::Error {
            code,
            message: message.into(),
        }
    }

    /// Create a new `ping` frame.
    #[must_use]
    pub fn ping() -> Self {
        Frame::Ping { timestamp: None }
    }

    /// Create a new `pong` frame.
    #[must_use]
    pub fn pong(timestamp: Option<u64>) -> Self {
        Frame::Pong { timestamp }
    }

    /// Create a new `connected` frame.
    #[must_use]
    pub fn connected(connection_id: impl Into<String>, version: u8, heartbeat: u32) -> Self {
        Frame::Connected {
            connection_id: connection_id.into(),
            version,
            heartbeat,
        }
    }
}
