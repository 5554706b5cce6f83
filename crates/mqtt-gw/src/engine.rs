// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Translation engine.
//!
//! The engine is split into one half per direction. Each half owns its own
//! scratch buffer and is driven by exactly one pump, so the two directions
//! can run in parallel while sharing only the read-only table and the atomic
//! counters.
//!
//! ```text
//! bus message --resolve id--> entry --encode--> JSON --publish--> client
//! raw inbound --prefix scan--> entry --decode--> payload --stamp+transmit--> bus
//! ```
//!
//! Every failure is handled where it is detected: logged, counted, and
//! returned as [`Disposition::Dropped`]. Nothing propagates to the pumps.

use crate::bus::{BusMessage, SoftwareBus};
use crate::client::{InboundMessage, PubSubClient, Qos};
use crate::error::TranslateError;
use crate::stats::{DirectionStats, GatewayStats};
use crate::table::{Direction, TopicEntry, TopicTable};
use std::sync::Arc;

/// Bytes of an unmatched inbound message quoted in diagnostics.
const PREVIEW_LEN: usize = 64;

/// What happened to one message.
#[derive(Debug)]
pub enum Disposition {
    /// Translated and handed to the other side.
    Forwarded { index: usize },
    /// Dropped; the error has already been logged and counted.
    Dropped(TranslateError),
}

impl Disposition {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Self::Forwarded { .. })
    }

    pub fn error(&self) -> Option<&TranslateError> {
        match self {
            Self::Forwarded { .. } => None,
            Self::Dropped(err) => Some(err),
        }
    }
}

/// Shared state of both translation directions.
#[derive(Debug, Clone)]
pub struct TranslationEngine {
    table: Arc<TopicTable>,
    stats: Arc<GatewayStats>,
    publish_qos: Qos,
}

impl TranslationEngine {
    pub fn new(table: Arc<TopicTable>, stats: Arc<GatewayStats>, publish_qos: Qos) -> Self {
        Self {
            table,
            stats,
            publish_qos,
        }
    }

    pub fn table(&self) -> &Arc<TopicTable> {
        &self.table
    }

    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    /// Half for the bus receive pump.
    pub fn bus_to_external(&self) -> BusToExternal {
        BusToExternal {
            table: Arc::clone(&self.table),
            stats: Arc::clone(&self.stats),
            qos: self.publish_qos,
            json: String::with_capacity(256),
        }
    }

    /// Half for the external event pump.
    pub fn external_to_bus(&self) -> ExternalToBus {
        ExternalToBus {
            table: Arc::clone(&self.table),
            stats: Arc::clone(&self.stats),
            payload: Vec::with_capacity(64),
        }
    }
}

/// Bus -> external translation.
pub struct BusToExternal {
    table: Arc<TopicTable>,
    stats: Arc<GatewayStats>,
    qos: Qos,
    json: String,
}

impl BusToExternal {
    /// Translate one bus message and publish it.
    pub fn process(&mut self, msg: &BusMessage, client: &dyn PubSubClient) -> Disposition {
        let stats = &self.stats.bus_to_external;
        stats.record_received();

        let entry = match resolve_bus(&self.table, msg) {
            Ok(entry) => entry,
            Err(err) => return dropped(stats, Direction::BusToExternal, err),
        };

        match encode_and_publish(entry, msg, client, self.qos, &mut self.json) {
            Ok(()) => {
                entry.counters().record_translated();
                stats.record_forwarded(self.json.len());
                tracing::trace!(topic = entry.name(), msg_id = msg.msg_id, "published");
                Disposition::Forwarded {
                    index: entry.index(),
                }
            }
            Err(err) => {
                entry.counters().record_error();
                dropped(stats, Direction::BusToExternal, err)
            }
        }
    }
}

fn resolve_bus<'t>(table: &'t TopicTable, msg: &BusMessage) -> Result<&'t TopicEntry, TranslateError> {
    let unknown = || TranslateError::UnknownMsgId { msg_id: msg.msg_id };

    let index = table.resolve_by_binary_id(msg.msg_id).ok_or_else(unknown)?;
    let entry = table.get_entry(index)?.ok_or_else(unknown)?;

    if entry.direction() != Direction::BusToExternal {
        return Err(TranslateError::WrongDirection {
            topic: entry.name().to_string(),
            direction: entry.direction(),
        });
    }
    Ok(entry)
}

fn encode_and_publish(
    entry: &TopicEntry,
    msg: &BusMessage,
    client: &dyn PubSubClient,
    qos: Qos,
    json: &mut String,
) -> Result<(), TranslateError> {
    entry
        .codec()
        .encode(&msg.payload, json)
        .map_err(|source| TranslateError::Codec {
            topic: entry.name().to_string(),
            source,
        })?;

    client.publish(entry.name(), json.as_bytes(), qos)?;
    Ok(())
}

/// External -> bus translation.
pub struct ExternalToBus {
    table: Arc<TopicTable>,
    stats: Arc<GatewayStats>,
    payload: Vec<u8>,
}

impl ExternalToBus {
    /// Translate one raw inbound message and transmit it on the bus.
    pub fn process(&mut self, msg: &InboundMessage, bus: &dyn SoftwareBus) -> Disposition {
        let stats = &self.stats.external_to_bus;
        stats.record_received();

        let raw = msg.as_bytes();
        let (entry, name_len) = match resolve_inbound(&self.table, raw) {
            Ok(found) => found,
            Err(err) => return dropped(stats, Direction::ExternalToBus, err),
        };

        match decode_and_transmit(entry, &raw[name_len..], bus, &mut self.payload) {
            Ok(()) => {
                entry.counters().record_translated();
                stats.record_forwarded(self.payload.len());
                tracing::trace!(topic = entry.name(), msg_id = entry.msg_id(), "transmitted");
                Disposition::Forwarded {
                    index: entry.index(),
                }
            }
            Err(err) => {
                entry.counters().record_error();
                dropped(stats, Direction::ExternalToBus, err)
            }
        }
    }
}

fn resolve_inbound<'t>(
    table: &'t TopicTable,
    raw: &[u8],
) -> Result<(&'t TopicEntry, usize), TranslateError> {
    let unknown = || TranslateError::UnknownTopic {
        topic: preview(raw),
    };

    // bus-side topics are never subscribed externally, so they are not candidates
    let (index, name_len) = table
        .find_by_name_prefix(raw, Direction::ExternalToBus)
        .ok_or_else(unknown)?;
    let entry = table.get_entry(index)?.ok_or_else(unknown)?;
    Ok((entry, name_len))
}

fn decode_and_transmit(
    entry: &TopicEntry,
    json: &[u8],
    bus: &dyn SoftwareBus,
    payload: &mut Vec<u8>,
) -> Result<(), TranslateError> {
    if json.is_empty() {
        return Err(TranslateError::EmptyPayload {
            topic: entry.name().to_string(),
        });
    }

    let codec = entry.codec();
    payload.resize(codec.payload_len(), 0);
    codec
        .decode(json, payload)
        .map_err(|source| TranslateError::Codec {
            topic: entry.name().to_string(),
            source,
        })?;

    let mut msg = BusMessage::new(entry.msg_id(), payload.as_slice());
    msg.stamp();
    bus.transmit(msg)?;
    Ok(())
}

/// Log and count a dropped message.
fn dropped(stats: &DirectionStats, direction: Direction, err: TranslateError) -> Disposition {
    stats.record_drop(&err);

    match &err {
        TranslateError::InvalidIndex(source) => {
            tracing::error!(%direction, "topic table index check failed, check base_msg_id/max_topics: {}", source);
        }
        TranslateError::Codec { topic, source } => match source.field_counts() {
            Some((found, expected)) => {
                tracing::warn!(%direction, topic = %topic, found, expected, "codec error: {}", source)
            }
            None => tracing::warn!(%direction, topic = %topic, "codec error: {}", source),
        },
        _ => tracing::warn!(%direction, "message dropped: {}", err),
    }

    Disposition::Dropped(err)
}

fn preview(raw: &[u8]) -> String {
    let end = raw.len().min(PREVIEW_LEN);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
