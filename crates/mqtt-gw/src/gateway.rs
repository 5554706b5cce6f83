// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway assembly and lifecycle.
//!
//! [`Gateway`] owns everything the two directions share: the topic table,
//! statistics, the collaborators and the inbound queue. [`Gateway::start`]
//! hands each direction its own pump on a dedicated thread and returns a
//! [`GatewayHandle`] for stopping, status reset and statistics.

use crate::bus::SoftwareBus;
use crate::client::{inbound_queue, InboundReceiver, InboundSender, PubSubClient};
use crate::config::GatewayConfig;
use crate::engine::TranslationEngine;
use crate::error::GatewayError;
use crate::pump::{BusPump, CycleReport, ExternalPump};
use crate::stats::{GatewayStats, StatsSnapshot};
use crate::subscribe::{SubscriptionManager, SubscriptionSummary};
use crate::table::{LoadReport, TopicTable, TopicTableDef};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Minimum pause after a pump reports a collaborator fault.
const FAULT_BACKOFF: Duration = Duration::from_millis(10);

/// A configured, not yet running gateway.
pub struct Gateway {
    config: GatewayConfig,
    engine: TranslationEngine,
    bus: Arc<dyn SoftwareBus>,
    client: Arc<dyn PubSubClient>,
    inbound_tx: InboundSender,
    inbound_rx: InboundReceiver,
    subscriptions: Option<SubscriptionSummary>,
}

impl Gateway {
    /// Assemble a gateway around an already loaded table.
    pub fn new(
        config: GatewayConfig,
        table: Arc<TopicTable>,
        bus: Arc<dyn SoftwareBus>,
        client: Arc<dyn PubSubClient>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let stats = Arc::new(GatewayStats::new());
        let engine = TranslationEngine::new(table, stats, config.publish_qos);
        let (inbound_tx, inbound_rx) = inbound_queue(config.inbound_queue_depth);

        Ok(Self {
            config,
            engine,
            bus,
            client,
            inbound_tx,
            inbound_rx,
            subscriptions: None,
        })
    }

    /// Load the table file named by the configuration and assemble a gateway.
    ///
    /// A partially loaded table is not an error; the report says how far the
    /// load got.
    pub fn from_config(
        config: GatewayConfig,
        bus: Arc<dyn SoftwareBus>,
        client: Arc<dyn PubSubClient>,
    ) -> Result<(Self, LoadReport), GatewayError> {
        let path = config
            .topic_table
            .as_ref()
            .ok_or(GatewayError::NoTopicTable)?;
        let def = TopicTableDef::from_file(path)?;
        let (table, report) = TopicTable::from_def(
            config.base_msg_id,
            config.max_topics,
            config.prefix_policy,
            &def,
        );

        let gateway = Self::new(config, Arc::new(table), bus, client)?;
        Ok((gateway, report))
    }

    /// Subscribe both sides to the table. Idempotent.
    pub fn bootstrap(&mut self) -> SubscriptionSummary {
        if let Some(summary) = self.subscriptions {
            return summary;
        }

        let summary = SubscriptionManager::bootstrap(
            self.engine.table(),
            self.bus.as_ref(),
            self.client.as_ref(),
            &self.inbound_tx,
        );
        self.engine.stats().record_bootstrap(&summary);
        self.subscriptions = Some(summary);
        summary
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn table(&self) -> &Arc<TopicTable> {
        self.engine.table()
    }

    pub fn stats(&self) -> Arc<GatewayStats> {
        Arc::clone(self.engine.stats())
    }

    /// Sender half of the inbound queue, for clients subscribed outside bootstrap.
    pub fn inbound_sender(&self) -> InboundSender {
        self.inbound_tx.clone()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.engine.stats().snapshot(self.inbound_tx.dropped())
    }

    /// Zero the gateway, per-topic and inbound queue counters.
    pub fn reset_status(&self) {
        reset_status(self.engine.stats(), self.engine.table(), &self.inbound_tx);
    }

    /// Bootstrap if needed and run both pumps on their own threads.
    pub fn start(mut self) -> Result<GatewayHandle, GatewayError> {
        self.bootstrap();

        let running = Arc::new(AtomicBool::new(true));

        let bus_pump = BusPump::new(
            self.engine.bus_to_external(),
            Arc::clone(&self.bus),
            Arc::clone(&self.client),
            self.config.bus_pend_time(),
        );
        let external_pump = ExternalPump::new(
            self.engine.external_to_bus(),
            self.inbound_rx,
            Arc::clone(&self.bus),
            Arc::clone(&self.client),
            self.config.client_yield_time(),
        );

        let mut threads = Vec::with_capacity(2);
        threads.push(spawn_pump(
            format!("{}-bus", self.config.name),
            Arc::clone(&running),
            bus_pump.pend_time(),
            bus_pump,
            BusPump::cycle,
        )?);

        let external = spawn_pump(
            format!("{}-ext", self.config.name),
            Arc::clone(&running),
            external_pump.yield_time(),
            external_pump,
            ExternalPump::cycle,
        );
        match external {
            Ok(handle) => threads.push(handle),
            Err(err) => {
                running.store(false, Ordering::Relaxed);
                for handle in threads {
                    let _ = handle.join();
                }
                return Err(err);
            }
        }

        tracing::info!(
            name = %self.config.name,
            pipe = %self.config.topic_pipe_name,
            topics = self.engine.table().len(),
            "gateway started"
        );

        Ok(GatewayHandle {
            running,
            threads,
            stats: Arc::clone(self.engine.stats()),
            table: Arc::clone(self.engine.table()),
            inbound_tx: self.inbound_tx,
        })
    }
}

fn spawn_pump<P, F>(
    name: String,
    running: Arc<AtomicBool>,
    wait: Duration,
    mut pump: P,
    cycle: F,
) -> Result<JoinHandle<()>, GatewayError>
where
    P: Send + 'static,
    F: Fn(&mut P) -> CycleReport + Send + 'static,
{
    let backoff = wait.max(FAULT_BACKOFF);
    let thread_name = name.clone();

    let handle = thread::Builder::new().name(name).spawn(move || {
        tracing::debug!(thread = %thread_name, "pump running");
        while running.load(Ordering::Relaxed) {
            let report = cycle(&mut pump);
            if report.fault {
                thread::sleep(backoff);
            }
        }
        tracing::debug!(thread = %thread_name, "pump stopped");
    })?;
    Ok(handle)
}

fn reset_status(stats: &GatewayStats, table: &TopicTable, inbound: &InboundSender) {
    stats.reset();
    table.reset_counters();
    inbound.reset_dropped();
    tracing::info!("gateway status reset");
}

/// Control handle for a running gateway. Dropping it stops the gateway.
pub struct GatewayHandle {
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    stats: Arc<GatewayStats>,
    table: Arc<TopicTable>,
    inbound_tx: InboundSender,
}

impl GatewayHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Signal both pumps to stop after their current cycle.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Running flag, for wiring into signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Stop and wait for both pump threads.
    pub fn join(mut self) {
        self.shutdown();
    }

    pub fn stats(&self) -> Arc<GatewayStats> {
        Arc::clone(&self.stats)
    }

    pub fn table(&self) -> &Arc<TopicTable> {
        &self.table
    }

    pub fn inbound_sender(&self) -> InboundSender {
        self.inbound_tx.clone()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(self.inbound_tx.dropped())
    }

    /// Zero the gateway, per-topic and inbound queue counters.
    pub fn reset_status(&self) {
        reset_status(&self.stats, &self.table, &self.inbound_tx);
    }

    fn shutdown(&mut self) {
        self.stop();
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("pump").to_string();
            if handle.join().is_err() {
                tracing::error!(thread = %name, "pump thread panicked");
            }
        }
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
