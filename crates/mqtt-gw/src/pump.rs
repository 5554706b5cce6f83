// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-direction pumps.
//!
//! A pump cycle blocks for at most one configured wait (bus pend time or
//! client yield budget) and then drains whatever is already queued without
//! blocking again. The gateway threads simply call `cycle` until stopped.

use crate::bus::SoftwareBus;
use crate::client::{InboundReceiver, PubSubClient};
use crate::engine::{BusToExternal, Disposition, ExternalToBus};
use std::sync::Arc;
use std::time::Duration;

/// What one pump cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: usize,
    pub forwarded: usize,
    pub dropped: usize,
    /// The collaborator reported an error while waiting.
    pub fault: bool,
}

impl CycleReport {
    fn record(&mut self, disposition: &Disposition) {
        self.processed += 1;
        if disposition.is_forwarded() {
            self.forwarded += 1;
        } else {
            self.dropped += 1;
        }
    }

    pub fn is_idle(&self) -> bool {
        self.processed == 0
    }
}

/// Bus receive pump: topic pipe -> translator -> external client.
pub struct BusPump {
    translator: BusToExternal,
    bus: Arc<dyn SoftwareBus>,
    client: Arc<dyn PubSubClient>,
    pend: Duration,
}

impl BusPump {
    pub fn new(
        translator: BusToExternal,
        bus: Arc<dyn SoftwareBus>,
        client: Arc<dyn PubSubClient>,
        pend: Duration,
    ) -> Self {
        Self {
            translator,
            bus,
            client,
            pend,
        }
    }

    /// Pend once on the pipe, then drain it.
    pub fn cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        let mut next = match self.bus.receive(self.pend) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!("bus receive failed: {}", err);
                report.fault = true;
                return report;
            }
        };

        while let Some(msg) = next {
            let disposition = self.translator.process(&msg, self.client.as_ref());
            report.record(&disposition);

            next = match self.bus.try_receive() {
                Ok(msg) => msg,
                Err(err) => {
                    tracing::warn!("bus poll failed: {}", err);
                    report.fault = true;
                    None
                }
            };
        }

        report
    }

    pub fn pend_time(&self) -> Duration {
        self.pend
    }
}

/// External event pump: client I/O -> inbound queue -> translator -> bus.
pub struct ExternalPump {
    translator: ExternalToBus,
    inbound: InboundReceiver,
    bus: Arc<dyn SoftwareBus>,
    client: Arc<dyn PubSubClient>,
    budget: Duration,
}

impl ExternalPump {
    pub fn new(
        translator: ExternalToBus,
        inbound: InboundReceiver,
        bus: Arc<dyn SoftwareBus>,
        client: Arc<dyn PubSubClient>,
        budget: Duration,
    ) -> Self {
        Self {
            translator,
            inbound,
            bus,
            client,
            budget,
        }
    }

    /// Give the client its processing budget, then translate what arrived.
    pub fn cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        if let Err(err) = self.client.yield_for(self.budget) {
            tracing::warn!("client yield failed: {}", err);
            report.fault = true;
        }

        // messages queued before a failed yield are still valid
        while let Some(msg) = self.inbound.try_next() {
            let disposition = self.translator.process(&msg, self.bus.as_ref());
            report.record(&disposition);
        }

        report
    }

    pub fn yield_time(&self) -> Duration {
        self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusMessage, LocalBus, MsgId};
    use crate::client::{inbound_queue, LoopbackClient, Qos};
    use crate::codec::{CodecKind, RatePayload};
    use crate::engine::TranslationEngine;
    use crate::error::BusError;
    use crate::stats::GatewayStats;
    use crate::table::{Direction, PrefixPolicy, TopicRow, TopicTable};
    use std::sync::Arc;

    const BASE: MsgId = 0x1F50;

    fn engine() -> TranslationEngine {
        let rows = vec![
            TopicRow::new("sat/rate", Direction::BusToExternal, 0, CodecKind::Rate),
            TopicRow::new("gnd/rate/cmd", Direction::ExternalToBus, 1, CodecKind::Rate),
        ];
        let (table, _) = TopicTable::load(BASE, 4, PrefixPolicy::default(), &rows);
        TranslationEngine::new(Arc::new(table), Arc::new(GatewayStats::new()), Qos::AtMostOnce)
    }

    #[test]
    fn test_bus_pump_drains_pipe() {
        let engine = engine();
        let bus = Arc::new(LocalBus::new("PIPE", 8));
        let client = Arc::new(LoopbackClient::new());
        bus.subscribe(BASE).expect("subscribe");

        let payload = RatePayload::new(0.1, 0.2, 0.3).to_bytes();
        for _ in 0..3 {
            bus.transmit(BusMessage::new(BASE, payload.to_vec()))
                .expect("transmit");
        }

        let mut pump = BusPump::new(
            engine.bus_to_external(),
            bus.clone(),
            client.clone(),
            Duration::from_millis(20),
        );
        let report = pump.cycle();

        assert_eq!(report.processed, 3);
        assert_eq!(report.forwarded, 3);
        assert_eq!(bus.pending(), 0);
        assert_eq!(client.published().len(), 3);
    }

    #[test]
    fn test_bus_pump_idle_cycle() {
        let engine = engine();
        let mut pump = BusPump::new(
            engine.bus_to_external(),
            Arc::new(LocalBus::new("PIPE", 8)),
            Arc::new(LoopbackClient::new()),
            Duration::from_millis(5),
        );
        let report = pump.cycle();
        assert!(report.is_idle());
        assert!(!report.fault);
    }

    #[test]
    fn test_bus_pump_reports_receive_fault() {
        struct BrokenBus;
        impl SoftwareBus for BrokenBus {
            fn subscribe(&self, _msg_id: MsgId) -> Result<(), BusError> {
                Ok(())
            }
            fn receive(&self, _timeout: Duration) -> Result<Option<BusMessage>, BusError> {
                Err(BusError::PipeClosed {
                    pipe: "PIPE".into(),
                })
            }
            fn transmit(&self, _msg: BusMessage) -> Result<(), BusError> {
                Ok(())
            }
        }

        let engine = engine();
        let mut pump = BusPump::new(
            engine.bus_to_external(),
            Arc::new(BrokenBus),
            Arc::new(LoopbackClient::new()),
            Duration::from_millis(5),
        );
        let report = pump.cycle();
        assert!(report.fault);
        assert!(report.is_idle());
    }

    #[test]
    fn test_external_pump_translates_arrivals() {
        let engine = engine();
        let bus = Arc::new(LocalBus::new("PIPE", 8));
        let monitor = bus.monitor();
        let client = Arc::new(LoopbackClient::new());
        let (tx, rx) = inbound_queue(8);
        client
            .subscribe(Arc::from("gnd/rate/cmd"), Qos::ExactlyOnce, tx)
            .expect("subscribe");

        client.inject("gnd/rate/cmd", br#"{"rate":{"x":4,"y":5,"z":6}}"#);
        client.inject("gnd/rate/cmd", br#"{"rate":{"x":4}}"#);

        let mut pump = ExternalPump::new(
            engine.external_to_bus(),
            rx,
            bus.clone(),
            client.clone(),
            Duration::from_millis(20),
        );
        let report = pump.cycle();

        assert_eq!(report.processed, 2);
        assert_eq!(report.forwarded, 1);
        assert_eq!(report.dropped, 1);

        let msg = monitor.try_recv().expect("transmitted");
        assert_eq!(msg.msg_id, BASE + 1);
        assert_eq!(
            RatePayload::from_bytes(&msg.payload),
            Some(RatePayload::new(4.0, 5.0, 6.0))
        );
        assert!(monitor.try_recv().is_err());
    }
}
