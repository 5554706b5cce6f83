// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the gateway.
//!
//! Only [`GatewayError`] ever reaches a caller of the public entry points.
//! Per-message failures ([`TranslateError`]) are logged, counted and turned into a
//! dropped [`Disposition`](crate::engine::Disposition) at the point of detection.

use crate::bus::MsgId;
use crate::table::Direction;
use thiserror::Error;

/// Codec failures. Parse failures report how many declared fields were found.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("malformed JSON ({found}/{expected} fields): {reason}")]
    Malformed {
        reason: String,
        found: usize,
        expected: usize,
    },

    #[error("incomplete object: found {found} of {expected} fields")]
    Incomplete { found: usize, expected: usize },

    #[error("payload is {actual} bytes, expected {expected}")]
    PayloadSize { expected: usize, actual: usize },

    #[error("field '{field}' is not a finite number")]
    NonFinite { field: &'static str },
}

impl CodecError {
    /// Fields found vs fields declared, for diagnostics.
    pub fn field_counts(&self) -> Option<(usize, usize)> {
        match self {
            Self::Malformed {
                found, expected, ..
            }
            | Self::Incomplete { found, expected } => Some((*found, *expected)),
            Self::PayloadSize { .. } | Self::NonFinite { .. } => None,
        }
    }
}

/// Topic table construction and access errors.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("index {index} outside topic table (max {max})")]
    InvalidIndex { index: usize, max: usize },

    #[error("row {row}: empty topic name")]
    EmptyName { row: usize },

    #[error("row {row}: topic name is {len} bytes (max {max})")]
    NameTooLong { row: usize, len: usize, max: usize },

    #[error("row {row}: duplicate topic name '{name}'")]
    DuplicateName { row: usize, name: String },

    #[error("row {row}: offset {offset} already used by '{existing}'")]
    DuplicateOffset {
        row: usize,
        offset: usize,
        existing: String,
    },

    #[error("row {row}: offset {offset} outside table of {max} topics")]
    OffsetOutOfRange { row: usize, offset: usize, max: usize },

    #[error("row {row}: unknown codec '{codec}'")]
    UnknownCodec { row: usize, codec: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Software bus collaborator errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("pipe '{pipe}' is full")]
    PipeFull { pipe: String },

    #[error("pipe '{pipe}' is closed")]
    PipeClosed { pipe: String },

    #[error("subscription to msg id {msg_id:#06x} rejected: {reason}")]
    Subscribe { msg_id: MsgId, reason: String },

    #[error("bus error: {0}")]
    Other(String),
}

/// Pub/sub client collaborator errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("not connected")]
    NotConnected,

    #[error("subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("client error: {0}")]
    Other(String),
}

/// Why a single message was dropped.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("no active topic for msg id {msg_id:#06x}")]
    UnknownMsgId { msg_id: MsgId },

    #[error("no topic matches '{topic}'")]
    UnknownTopic { topic: String },

    #[error("topic '{topic}' failed to translate: {source}")]
    Codec {
        topic: String,
        #[source]
        source: CodecError,
    },

    #[error("topic table access failed: {0}")]
    InvalidIndex(#[from] TableError),

    #[error("topic '{topic}' carried no payload")]
    EmptyPayload { topic: String },

    #[error("topic '{topic}' is configured {direction}, message arrived from the other side")]
    WrongDirection { topic: String, direction: Direction },

    #[error("publish failed: {0}")]
    Publish(#[from] ClientError),

    #[error("transmit failed: {0}")]
    Transmit(#[from] BusError),
}

impl TranslateError {
    /// True for the lookup class of failures (no matching active entry for
    /// this direction).
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::UnknownMsgId { .. } | Self::UnknownTopic { .. } | Self::WrongDirection { .. }
        )
    }

    /// True for failures of the transport collaborators.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Publish(_) | Self::Transmit(_))
    }
}

/// Process-level gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Topic table error: {0}")]
    Table(#[from] TableError),

    #[error("No topic table configured")]
    NoTopicTable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_field_counts() {
        let err = CodecError::Incomplete {
            found: 2,
            expected: 3,
        };
        assert_eq!(err.field_counts(), Some((2, 3)));
        assert!(err.to_string().contains("found 2 of 3"));

        let err = CodecError::PayloadSize {
            expected: 12,
            actual: 4,
        };
        assert_eq!(err.field_counts(), None);
    }

    #[test]
    fn test_translate_error_classes() {
        assert!(TranslateError::UnknownMsgId { msg_id: 0x1F50 }.is_lookup());
        assert!(TranslateError::UnknownTopic {
            topic: "sat/unknown".into()
        }
        .is_lookup());
        assert!(TranslateError::Transmit(BusError::Other("down".into())).is_transport());
        assert!(!TranslateError::EmptyPayload {
            topic: "sat/rate".into()
        }
        .is_lookup());
    }
}
