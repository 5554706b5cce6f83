// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One-time subscription bootstrap.
//!
//! Wires both sides of the gateway to the topic table: bus-to-external
//! topics subscribe the bus topic pipe to their message id, external-to-bus
//! topics subscribe the external client (exactly-once QoS) with the shared
//! inbound queue as sink. A failure is logged and counted, and the pass moves
//! on to the next entry.

use crate::bus::SoftwareBus;
use crate::client::{InboundSender, PubSubClient, Qos};
use crate::table::{Direction, TopicTable};

/// QoS requested for every external subscription.
pub const SUBSCRIBE_QOS: Qos = Qos::ExactlyOnce;

/// Outcome of the bootstrap pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionSummary {
    /// Active entries visited.
    pub attempted: usize,
    /// Bus pipe subscriptions made.
    pub bus: usize,
    /// External client subscriptions made.
    pub external: usize,
    /// Subscriptions that failed.
    pub errors: usize,
}

impl SubscriptionSummary {
    pub fn succeeded(&self) -> usize {
        self.bus + self.external
    }
}

/// Bootstraps subscriptions from a topic table.
pub struct SubscriptionManager;

impl SubscriptionManager {
    /// Subscribe every active entry. Never stops early.
    pub fn bootstrap(
        table: &TopicTable,
        bus: &dyn SoftwareBus,
        client: &dyn PubSubClient,
        inbound: &InboundSender,
    ) -> SubscriptionSummary {
        let mut summary = SubscriptionSummary::default();

        for entry in table.entries() {
            summary.attempted += 1;

            match entry.direction() {
                Direction::BusToExternal => match bus.subscribe(entry.msg_id()) {
                    Ok(()) => summary.bus += 1,
                    Err(err) => {
                        summary.errors += 1;
                        tracing::warn!(
                            topic = entry.name(),
                            msg_id = entry.msg_id(),
                            "bus subscription failed: {}",
                            err
                        );
                    }
                },
                Direction::ExternalToBus => {
                    // the client keeps the name; hand it the table's storage
                    match client.subscribe(entry.shared_name(), SUBSCRIBE_QOS, inbound.clone()) {
                        Ok(()) => summary.external += 1,
                        Err(err) => {
                            summary.errors += 1;
                            tracing::warn!(
                                topic = entry.name(),
                                "external subscription failed: {}",
                                err
                            );
                        }
                    }
                }
            }
        }

        tracing::info!(
            "Subscribed to {} topics on the bus and {} topics externally with {} errors",
            summary.bus,
            summary.external,
            summary.errors
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusMessage, MsgId};
    use crate::client::inbound_queue;
    use crate::codec::CodecKind;
    use crate::error::{BusError, ClientError};
    use crate::table::{PrefixPolicy, TopicRow};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    /// Bus that rejects a chosen set of ids and records every attempt.
    #[derive(Default)]
    struct FlakyBus {
        reject: HashSet<MsgId>,
        attempts: Mutex<Vec<MsgId>>,
    }

    impl SoftwareBus for FlakyBus {
        fn subscribe(&self, msg_id: MsgId) -> Result<(), BusError> {
            self.attempts.lock().push(msg_id);
            if self.reject.contains(&msg_id) {
                Err(BusError::Subscribe {
                    msg_id,
                    reason: "no route".into(),
                })
            } else {
                Ok(())
            }
        }

        fn receive(&self, _timeout: Duration) -> Result<Option<BusMessage>, BusError> {
            Ok(None)
        }

        fn transmit(&self, _msg: BusMessage) -> Result<(), BusError> {
            Ok(())
        }
    }

    /// Client that rejects a chosen set of topics and records every attempt.
    #[derive(Default)]
    struct FlakyClient {
        reject: HashSet<String>,
        attempts: Mutex<Vec<(Arc<str>, Qos)>>,
    }

    impl PubSubClient for FlakyClient {
        fn subscribe(
            &self,
            topic: Arc<str>,
            qos: Qos,
            _sink: InboundSender,
        ) -> Result<(), ClientError> {
            self.attempts.lock().push((Arc::clone(&topic), qos));
            if self.reject.contains(&*topic) {
                Err(ClientError::Subscribe {
                    topic: topic.to_string(),
                    reason: "not authorized".into(),
                })
            } else {
                Ok(())
            }
        }

        fn publish(&self, _topic: &str, _payload: &[u8], _qos: Qos) -> Result<(), ClientError> {
            Ok(())
        }

        fn yield_for(&self, _budget: Duration) -> Result<(), ClientError> {
            Ok(())
        }
    }

    const BASE: MsgId = 0x0800;

    fn ten_topic_table() -> TopicTable {
        let rows: Vec<_> = (0..10)
            .map(|i| {
                let direction = if i % 2 == 0 {
                    Direction::BusToExternal
                } else {
                    Direction::ExternalToBus
                };
                TopicRow::new(format!("sat/t{}", i), direction, i, CodecKind::Rate)
            })
            .collect();
        let (table, report) = TopicTable::load(BASE, 16, PrefixPolicy::default(), &rows);
        assert!(report.is_complete());
        table
    }

    #[test]
    fn test_bootstrap_continues_past_failures() {
        let table = ten_topic_table();
        let bus = FlakyBus {
            reject: [BASE, BASE + 4].into_iter().collect(),
            ..Default::default()
        };
        let client = FlakyClient {
            reject: ["sat/t3".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let (inbound, _rx) = inbound_queue(4);

        let summary = SubscriptionManager::bootstrap(&table, &bus, &client, &inbound);

        assert_eq!(summary.attempted, 10);
        assert_eq!(summary.succeeded(), 7);
        assert_eq!(summary.errors, 3);
        assert_eq!(summary.bus, 3);
        assert_eq!(summary.external, 4);
        assert_eq!(bus.attempts.lock().len(), 5);
        assert_eq!(client.attempts.lock().len(), 5);
    }

    #[test]
    fn test_bootstrap_routes_by_direction() {
        let table = ten_topic_table();
        let bus = FlakyBus::default();
        let client = FlakyClient::default();
        let (inbound, _rx) = inbound_queue(4);

        SubscriptionManager::bootstrap(&table, &bus, &client, &inbound);

        let bus_ids = bus.attempts.lock().clone();
        assert_eq!(bus_ids, vec![BASE, BASE + 2, BASE + 4, BASE + 6, BASE + 8]);

        let attempts = client.attempts.lock();
        assert!(attempts.iter().all(|(_, qos)| *qos == Qos::ExactlyOnce));
        assert_eq!(&*attempts[0].0, "sat/t1");
    }

    #[test]
    fn test_external_name_shares_table_storage() {
        let table = ten_topic_table();
        let bus = FlakyBus::default();
        let client = FlakyClient::default();
        let (inbound, _rx) = inbound_queue(4);

        SubscriptionManager::bootstrap(&table, &bus, &client, &inbound);

        let entry = table.get_entry(1).unwrap().unwrap();
        let attempts = client.attempts.lock();
        assert!(Arc::ptr_eq(&attempts[0].0, &entry.shared_name()));
    }

    #[test]
    fn test_bootstrap_empty_table() {
        let (table, _) = TopicTable::load(BASE, 4, PrefixPolicy::default(), &[]);
        let (inbound, _rx) = inbound_queue(1);
        let summary = SubscriptionManager::bootstrap(
            &table,
            &FlakyBus::default(),
            &FlakyClient::default(),
            &inbound,
        );
        assert_eq!(summary, SubscriptionSummary::default());
    }
}
