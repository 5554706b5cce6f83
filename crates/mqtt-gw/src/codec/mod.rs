// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-topic conversion between fixed-layout bus payloads and JSON text.
//!
//! A codec is a stateless pair of functions bound to a topic when the topic
//! table is built. [`CodecKind`] is the tag stored in the table source; it
//! resolves to a `&'static dyn Codec` so entries never own codec state.
//!
//! Decoding is all-or-nothing: the destination payload is zeroed first and
//! only written once every declared field has been found.

mod rate;

pub use rate::{RateCodec, RatePayload, RATE_FIELDS};

use crate::error::CodecError;
use serde_json::Value;
use std::fmt;

/// Conversion capability bound to one topic type.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Codec name as written in the topic table.
    fn name(&self) -> &'static str;

    /// Size of the binary payload in bytes.
    fn payload_len(&self) -> usize;

    /// Number of fields a JSON document must carry to decode.
    fn field_count(&self) -> usize;

    /// Render a binary payload as JSON into `out` (cleared first).
    fn encode(&self, payload: &[u8], out: &mut String) -> Result<(), CodecError>;

    /// Parse JSON into `out`.
    ///
    /// `out` is zeroed before parsing and left zeroed on any failure.
    fn decode(&self, json: &[u8], out: &mut [u8]) -> Result<(), CodecError>;
}

/// Codec tag selected per topic table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// Three-axis body rate, `{"rate":{"x":..,"y":..,"z":..}}`.
    Rate,
}

static RATE: RateCodec = RateCodec;

impl CodecKind {
    /// All known codecs.
    pub const ALL: [CodecKind; 1] = [CodecKind::Rate];

    /// Resolve a codec by table name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Table name of this codec.
    pub fn name(self) -> &'static str {
        self.codec().name()
    }

    /// The codec implementation.
    pub fn codec(self) -> &'static dyn Codec {
        match self {
            Self::Rate => &RATE,
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Look up `root.object.field` as a number.
///
/// Returns `None` when any step is missing or the leaf is not a number.
pub(crate) fn json_number(root: &Value, object: &str, field: &str) -> Option<f64> {
    root.get(object)?.get(field)?.as_f64()
}
