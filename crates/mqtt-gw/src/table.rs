// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic table.
//!
//! Maps external topic names to bus message ids and codecs. The table has a
//! fixed number of slots (`max_topics`); slot `i` carries message id
//! `base_id + i`, which is the only way inbound bus messages are resolved.
//!
//! The table is built once by [`TopicTable::load`] and is read-only
//! afterwards (only the per-entry counters change), so both pump directions
//! share it through an `Arc` without locking.
//!
//! # Table source
//!
//! ```json
//! { "topics": [
//!     { "name": "sat/rate",     "direction": "bus_to_external", "offset": 0, "codec": "rate" },
//!     { "name": "sat/rate/cmd", "direction": "external_to_bus", "offset": 1, "codec": "rate" }
//! ] }
//! ```
//!
//! `direction` also accepts `"pub"` (the bus publishes, the gateway forwards
//! externally) and `"sub"` (the gateway subscribes externally).

use crate::bus::MsgId;
use crate::codec::{Codec, CodecKind};
use crate::error::TableError;
use crate::stats::TopicCounters;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Longest accepted topic name in bytes.
pub const MAX_TOPIC_NAME_LEN: usize = 255;

/// Which side of the gateway produces a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Published on the bus, forwarded to the external client.
    #[serde(alias = "pub")]
    BusToExternal,
    /// Received from the external client, transmitted on the bus.
    #[serde(alias = "sub")]
    ExternalToBus,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusToExternal => f.write_str("bus->external"),
            Self::ExternalToBus => f.write_str("external->bus"),
        }
    }
}

/// Tie-break when several registered names prefix the same inbound bytes.
///
/// Inbound messages have no topic/payload delimiter, so a name that is a
/// prefix of another name (`sat` and `sat/rate`) makes resolution depend on
/// this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixPolicy {
    /// First matching entry in index order.
    #[default]
    FirstInTableOrder,
    /// Longest matching name.
    LongestMatch,
}

/// One row of the table source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRow {
    pub name: String,
    pub direction: Direction,
    /// Slot index; the message id is `base_id + offset`.
    pub offset: usize,
    pub codec: String,
}

impl TopicRow {
    pub fn new(
        name: impl Into<String>,
        direction: Direction,
        offset: usize,
        codec: CodecKind,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            offset,
            codec: codec.name().to_string(),
        }
    }
}

/// The table source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTableDef {
    #[serde(default)]
    pub topics: Vec<TopicRow>,
}

impl TopicTableDef {
    /// Read a JSON table file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, TableError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, TableError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Small table with one topic per direction.
    pub fn example() -> Self {
        Self {
            topics: vec![
                TopicRow::new("sat/rate", Direction::BusToExternal, 0, CodecKind::Rate),
                TopicRow::new("gnd/rate/cmd", Direction::ExternalToBus, 1, CodecKind::Rate),
            ],
        }
    }
}

/// Outcome of a table load.
#[derive(Debug)]
pub struct LoadReport {
    /// Rows in the source.
    pub declared: usize,
    /// Rows that became active entries.
    pub loaded: usize,
    /// Why loading stopped early, if it did.
    pub error: Option<TableError>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.loaded == self.declared && self.error.is_none()
    }
}

/// An active topic table entry.
#[derive(Debug)]
pub struct TopicEntry {
    index: usize,
    name: Arc<str>,
    direction: Direction,
    msg_id: MsgId,
    codec: CodecKind,
    counters: TopicCounters,
}

impl TopicEntry {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table-owned name, for consumers that keep referencing it.
    pub fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn msg_id(&self) -> MsgId {
        self.msg_id
    }

    pub fn codec_kind(&self) -> CodecKind {
        self.codec
    }

    pub fn codec(&self) -> &'static dyn Codec {
        self.codec.codec()
    }

    pub fn counters(&self) -> &TopicCounters {
        &self.counters
    }
}

/// Fixed-capacity topic registry. Empty slots are inactive.
#[derive(Debug)]
pub struct TopicTable {
    base_id: MsgId,
    slots: Vec<Option<TopicEntry>>,
    policy: PrefixPolicy,
}

impl TopicTable {
    /// Build a table from source rows.
    ///
    /// Rows are applied in order. The first invalid row stops the load: the
    /// rows before it are active and every later row stays inactive. A
    /// partial load is reported, never fatal.
    pub fn load(
        base_id: MsgId,
        max_topics: usize,
        policy: PrefixPolicy,
        rows: &[TopicRow],
    ) -> (Self, LoadReport) {
        let mut table = Self {
            base_id,
            slots: (0..max_topics).map(|_| None).collect(),
            policy,
        };

        let mut loaded = 0;
        let mut error = None;
        for (row_no, row) in rows.iter().enumerate() {
            match table.insert(row_no, row) {
                Ok(()) => loaded += 1,
                Err(err) => {
                    error = Some(err);
                    break;
                }
            }
        }

        let report = LoadReport {
            declared: rows.len(),
            loaded,
            error,
        };

        match &report.error {
            None => tracing::info!(
                loaded = report.loaded,
                declared = report.declared,
                "topic table loaded"
            ),
            Some(err) => tracing::warn!(
                loaded = report.loaded,
                declared = report.declared,
                "topic table partially loaded: {}",
                err
            ),
        }

        for (short, long) in table.overlapping_names() {
            tracing::warn!(
                "topic '{}' (index {}) is a prefix of '{}' (index {}), inbound match uses {:?}",
                table.slot_name(short),
                short,
                table.slot_name(long),
                long,
                table.policy
            );
        }

        (table, report)
    }

    /// Build a table from a source document.
    pub fn from_def(
        base_id: MsgId,
        max_topics: usize,
        policy: PrefixPolicy,
        def: &TopicTableDef,
    ) -> (Self, LoadReport) {
        Self::load(base_id, max_topics, policy, &def.topics)
    }

    fn insert(&mut self, row_no: usize, row: &TopicRow) -> Result<(), TableError> {
        if row.name.is_empty() {
            return Err(TableError::EmptyName { row: row_no });
        }
        if row.name.len() > MAX_TOPIC_NAME_LEN {
            return Err(TableError::NameTooLong {
                row: row_no,
                len: row.name.len(),
                max: MAX_TOPIC_NAME_LEN,
            });
        }

        let max = self.slots.len();
        let msg_id = u32::try_from(row.offset)
            .ok()
            .and_then(|offset| self.base_id.checked_add(offset))
            .filter(|_| row.offset < max)
            .ok_or(TableError::OffsetOutOfRange {
                row: row_no,
                offset: row.offset,
                max,
            })?;

        if let Some(existing) = &self.slots[row.offset] {
            return Err(TableError::DuplicateOffset {
                row: row_no,
                offset: row.offset,
                existing: existing.name().to_string(),
            });
        }
        if self.entries().any(|e| e.name() == row.name) {
            return Err(TableError::DuplicateName {
                row: row_no,
                name: row.name.clone(),
            });
        }
        let codec = CodecKind::from_name(&row.codec).ok_or_else(|| TableError::UnknownCodec {
            row: row_no,
            codec: row.codec.clone(),
        })?;

        self.slots[row.offset] = Some(TopicEntry {
            index: row.offset,
            name: Arc::from(row.name.as_str()),
            direction: row.direction,
            msg_id,
            codec,
            counters: TopicCounters::default(),
        });
        Ok(())
    }

    fn slot_name(&self, index: usize) -> &str {
        self.slots[index].as_ref().map_or("", |e| e.name())
    }

    pub fn base_id(&self) -> MsgId {
        self.base_id
    }

    /// Slot count.
    pub fn max_topics(&self) -> usize {
        self.slots.len()
    }

    pub fn policy(&self) -> PrefixPolicy {
        self.policy
    }

    /// Number of active entries.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Active entries in index order.
    pub fn entries(&self) -> impl Iterator<Item = &TopicEntry> {
        self.slots.iter().flatten()
    }

    /// Bounds-checked slot access.
    ///
    /// `Ok(None)` for an inactive slot, `InvalidIndex` outside the table.
    pub fn get_entry(&self, index: usize) -> Result<Option<&TopicEntry>, TableError> {
        self.slots
            .get(index)
            .map(Option::as_ref)
            .ok_or(TableError::InvalidIndex {
                index,
                max: self.slots.len(),
            })
    }

    /// Resolve the `direction` topic whose name prefixes `raw`.
    ///
    /// Entries of the other direction are never candidates. Returns
    /// `(index, name_len)`; the payload starts at `raw[name_len..]`.
    pub fn find_by_name_prefix(
        &self,
        raw: &[u8],
        direction: Direction,
    ) -> Option<(usize, usize)> {
        let mut matches = self
            .entries()
            .filter(|e| e.direction == direction && raw.starts_with(e.name().as_bytes()));

        let entry = match self.policy {
            PrefixPolicy::FirstInTableOrder => matches.next(),
            // names are unique, so equal lengths cannot both match
            PrefixPolicy::LongestMatch => matches.max_by_key(|e| e.name().len()),
        }?;
        Some((entry.index, entry.name().len()))
    }

    /// Resolve a bus message id to an active slot index.
    pub fn resolve_by_binary_id(&self, msg_id: MsgId) -> Option<usize> {
        let index = usize::try_from(msg_id.checked_sub(self.base_id)?).ok()?;
        self.slots.get(index)?.as_ref().map(|_| index)
    }

    /// Pairs `(shorter, longer)` of inbound entries where one name strictly
    /// prefixes the other. Only these can shadow each other in the prefix scan.
    pub fn overlapping_names(&self) -> Vec<(usize, usize)> {
        let inbound = || {
            self.entries()
                .filter(|e| e.direction == Direction::ExternalToBus)
        };
        let mut pairs = Vec::new();
        for a in inbound() {
            for b in inbound() {
                if a.index != b.index
                    && a.name().len() < b.name().len()
                    && b.name().starts_with(a.name())
                {
                    pairs.push((a.index, b.index));
                }
            }
        }
        pairs
    }

    /// Source rows of the active entries.
    pub fn dump(&self) -> TopicTableDef {
        TopicTableDef {
            topics: self
                .entries()
                .map(|e| TopicRow::new(e.name(), e.direction, e.index, e.codec))
                .collect(),
        }
    }

    /// Zero every entry's counters.
    pub fn reset_counters(&self) {
        for entry in self.entries() {
            entry.counters.reset();
        }
    }
}
