// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rate topic codec.
//!
//! Binary layout: three little-endian IEEE-754 `f32` (x, y, z), 12 bytes.
//! JSON layout: `{"rate":{"x":1.500000,"y":-2.250000,"z":0.000000}}`.

use super::{json_number, Codec};
use crate::error::CodecError;
use serde_json::Value;
use std::fmt::Write as _;

/// JSON field names, in emit order.
pub const RATE_FIELDS: [&str; 3] = ["x", "y", "z"];

const RATE_OBJECT: &str = "rate";

/// Decoded rate payload.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatePayload {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RatePayload {
    /// Encoded size in bytes.
    pub const SIZE: usize = 12;

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Serialize to the bus layout.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.x.to_le_bytes());
        buf[4..8].copy_from_slice(&self.y.to_le_bytes());
        buf[8..12].copy_from_slice(&self.z.to_le_bytes());
        buf
    }

    /// Parse the bus layout. Returns `None` unless exactly `SIZE` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        let field = |at: usize| {
            f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Some(Self {
            x: field(0),
            y: field(4),
            z: field(8),
        })
    }

    fn values(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Codec for [`RatePayload`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RateCodec;

impl Codec for RateCodec {
    fn name(&self) -> &'static str {
        "rate"
    }

    fn payload_len(&self) -> usize {
        RatePayload::SIZE
    }

    fn field_count(&self) -> usize {
        RATE_FIELDS.len()
    }

    fn encode(&self, payload: &[u8], out: &mut String) -> Result<(), CodecError> {
        out.clear();

        let rate = RatePayload::from_bytes(payload).ok_or(CodecError::PayloadSize {
            expected: RatePayload::SIZE,
            actual: payload.len(),
        })?;

        // {:.6} of a NaN or infinity is not JSON
        for (field, value) in RATE_FIELDS.into_iter().zip(rate.values()) {
            if !value.is_finite() {
                return Err(CodecError::NonFinite { field });
            }
        }

        write!(
            out,
            "{{\"{}\":{{\"x\":{:.6},\"y\":{:.6},\"z\":{:.6}}}}}",
            RATE_OBJECT, rate.x, rate.y, rate.z
        )
        .map_err(|e| CodecError::Malformed {
            reason: e.to_string(),
            found: 0,
            expected: RATE_FIELDS.len(),
        })
    }

    fn decode(&self, json: &[u8], out: &mut [u8]) -> Result<(), CodecError> {
        out.fill(0);

        if out.len() != RatePayload::SIZE {
            return Err(CodecError::PayloadSize {
                expected: RatePayload::SIZE,
                actual: out.len(),
            });
        }

        let root: Value = serde_json::from_slice(json).map_err(|e| CodecError::Malformed {
            reason: e.to_string(),
            found: 0,
            expected: RATE_FIELDS.len(),
        })?;

        let mut values = [0.0f32; 3];
        let mut found = 0;
        for (slot, field) in values.iter_mut().zip(RATE_FIELDS) {
            if let Some(value) = json_number(&root, RATE_OBJECT, field) {
                let value = value as f32;
                if !value.is_finite() {
                    return Err(CodecError::NonFinite { field });
                }
                *slot = value;
                found += 1;
            }
        }

        if found < RATE_FIELDS.len() {
            return Err(CodecError::Incomplete {
                found,
                expected: RATE_FIELDS.len(),
            });
        }

        let rate = RatePayload::new(values[0], values[1], values[2]);
        out.copy_from_slice(&rate.to_bytes());
        Ok(())
    }
}
