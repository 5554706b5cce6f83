// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway counters.
//!
//! Counters are observability only and never drive control flow. Each
//! direction has its own [`DirectionStats`], touched only from that
//! direction's pump; they are atomic anyway so snapshots can be taken from
//! any thread.

use crate::error::TranslateError;
use crate::subscribe::SubscriptionSummary;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for one translation direction.
#[derive(Debug, Default)]
pub struct DirectionStats {
    /// Messages handed to the translator.
    pub received: AtomicU64,
    /// Messages translated and sent on.
    pub forwarded: AtomicU64,
    /// Payload bytes sent on.
    pub bytes_forwarded: AtomicU64,
    /// Drops: no matching active topic (or wrong direction).
    pub lookup_errors: AtomicU64,
    /// Drops: codec failure, empty payload or invalid table index.
    pub codec_errors: AtomicU64,
    /// Drops: publish or transmit refused by the collaborator.
    pub transport_errors: AtomicU64,
}

impl DirectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self, bytes: usize) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Count a dropped message under its error class.
    pub fn record_drop(&self, err: &TranslateError) {
        let counter = if err.is_lookup() {
            &self.lookup_errors
        } else if err.is_transport() {
            &self.transport_errors
        } else {
            &self.codec_errors
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DirectionSnapshot {
        DirectionSnapshot {
            received: self.received.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            lookup_errors: self.lookup_errors.load(Ordering::Relaxed),
            codec_errors: self.codec_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.forwarded.store(0, Ordering::Relaxed);
        self.bytes_forwarded.store(0, Ordering::Relaxed);
        self.lookup_errors.store(0, Ordering::Relaxed);
        self.codec_errors.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
    }
}

/// Copy of one direction's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionSnapshot {
    pub received: u64,
    pub forwarded: u64,
    pub bytes_forwarded: u64,
    pub lookup_errors: u64,
    pub codec_errors: u64,
    pub transport_errors: u64,
}

impl DirectionSnapshot {
    /// All dropped messages regardless of class.
    pub fn dropped(&self) -> u64 {
        self.lookup_errors + self.codec_errors + self.transport_errors
    }
}

/// Per-topic counters, the only mutable part of a topic entry.
#[derive(Debug, Default)]
pub struct TopicCounters {
    translated: AtomicU64,
    errors: AtomicU64,
}

impl TopicCounters {
    pub fn record_translated(&self) {
        self.translated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn translated(&self) -> u64 {
        self.translated.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.translated.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}

/// Gateway-wide statistics.
#[derive(Debug)]
pub struct GatewayStats {
    /// Bus -> external publish path.
    pub bus_to_external: DirectionStats,
    /// External -> bus transmit path.
    pub external_to_bus: DirectionStats,
    bus_subscriptions: AtomicU64,
    external_subscriptions: AtomicU64,
    subscribe_errors: AtomicU64,
    start_time: Instant,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self {
            bus_to_external: DirectionStats::new(),
            external_to_bus: DirectionStats::new(),
            bus_subscriptions: AtomicU64::new(0),
            external_subscriptions: AtomicU64::new(0),
            subscribe_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Remember the bootstrap outcome.
    pub fn record_bootstrap(&self, summary: &SubscriptionSummary) {
        self.bus_subscriptions
            .store(summary.bus as u64, Ordering::Relaxed);
        self.external_subscriptions
            .store(summary.external as u64, Ordering::Relaxed);
        self.subscribe_errors
            .store(summary.errors as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Zero the message counters. Subscription counts describe the
    /// bootstrap and are kept.
    pub fn reset(&self) {
        self.bus_to_external.reset();
        self.external_to_bus.reset();
    }

    /// `inbound_dropped` comes from the inbound queue, which keeps its own count.
    pub fn snapshot(&self, inbound_dropped: u64) -> StatsSnapshot {
        StatsSnapshot {
            bus_to_external: self.bus_to_external.snapshot(),
            external_to_bus: self.external_to_bus.snapshot(),
            bus_subscriptions: self.bus_subscriptions.load(Ordering::Relaxed),
            external_subscriptions: self.external_subscriptions.load(Ordering::Relaxed),
            subscribe_errors: self.subscribe_errors.load(Ordering::Relaxed),
            inbound_dropped,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of the gateway statistics.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub bus_to_external: DirectionSnapshot,
    pub external_to_bus: DirectionSnapshot,
    pub bus_subscriptions: u64,
    pub external_subscriptions: u64,
    pub subscribe_errors: u64,
    pub inbound_dropped: u64,
    pub uptime_secs: u64,
}

impl StatsSnapshot {
    /// Forwarded messages per second across both directions.
    pub fn messages_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            (self.bus_to_external.forwarded + self.external_to_bus.forwarded) as f64
                / self.uptime_secs as f64
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        let b2e = &self.bus_to_external;
        let e2b = &self.external_to_bus;
        format!(
            "Gateway Stats (uptime: {}s)\n\
             Subscriptions: bus {}, external {}, errors {}\n\
             Bus->Ext: RX {} msgs, TX {} msgs ({} bytes), lookup={}, codec={}, transport={}\n\
             Ext->Bus: RX {} msgs, TX {} msgs ({} bytes), lookup={}, codec={}, transport={}, queue_full={}",
            self.uptime_secs,
            self.bus_subscriptions,
            self.external_subscriptions,
            self.subscribe_errors,
            b2e.received,
            b2e.forwarded,
            b2e.bytes_forwarded,
            b2e.lookup_errors,
            b2e.codec_errors,
            b2e.transport_errors,
            e2b.received,
            e2b.forwarded,
            e2b.bytes_forwarded,
            e2b.lookup_errors,
            e2b.codec_errors,
            e2b.transport_errors,
            self.inbound_dropped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BusError, CodecError};

    #[test]
    fn test_direction_stats_classify_drops() {
        let stats = DirectionStats::new();
        stats.record_drop(&TranslateError::UnknownMsgId { msg_id: 1 });
        stats.record_drop(&TranslateError::Codec {
            topic: "sat/rate".into(),
            source: CodecError::Incomplete {
                found: 2,
                expected: 3,
            },
        });
        stats.record_drop(&TranslateError::EmptyPayload {
            topic: "sat/rate".into(),
        });
        stats.record_drop(&TranslateError::Transmit(BusError::Other("down".into())));

        let snap = stats.snapshot();
        assert_eq!(snap.lookup_errors, 1);
        assert_eq!(snap.codec_errors, 2);
        assert_eq!(snap.transport_errors, 1);
        assert_eq!(snap.dropped(), 4);
    }

    #[test]
    fn test_reset_keeps_bootstrap_counts() {
        let stats = GatewayStats::new();
        stats.record_bootstrap(&SubscriptionSummary {
            attempted: 3,
            bus: 2,
            external: 1,
            errors: 0,
        });
        stats.bus_to_external.record_received();
        stats.bus_to_external.record_forwarded(52);

        let snap = stats.snapshot(0);
        assert_eq!(snap.bus_to_external.forwarded, 1);
        assert_eq!(snap.bus_to_external.bytes_forwarded, 52);

        stats.reset();
        let snap = stats.snapshot(0);
        assert_eq!(snap.bus_to_external, DirectionSnapshot::default());
        assert_eq!(snap.bus_subscriptions, 2);
        assert_eq!(snap.external_subscriptions, 1);
    }

    #[test]
    fn test_topic_counters() {
        let counters = TopicCounters::default();
        counters.record_translated();
        counters.record_translated();
        counters.record_error();
        assert_eq!(counters.translated(), 2);
        assert_eq!(counters.errors(), 1);
        counters.reset();
        assert_eq!(counters.translated(), 0);
    }

    #[test]
    fn test_format_summary() {
        let stats = GatewayStats::new();
        stats.external_to_bus.record_forwarded(12);
        let summary = stats.snapshot(3).format_summary();
        assert!(summary.contains("Bus->Ext:"));
        assert!(summary.contains("Ext->Bus:"));
        assert!(summary.contains("queue_full=3"));
    }
}
