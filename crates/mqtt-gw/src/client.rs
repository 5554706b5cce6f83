// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! External pub/sub client seam.
//!
//! Inbound messages do not call into the gateway directly. The client's own
//! context pushes raw messages into a bounded queue ([`InboundSender`]) and the
//! external pump drains it ([`InboundReceiver`]). A full queue drops the
//! message and counts it, so the client is never blocked by codec work.
//!
//! A raw inbound message is the topic name immediately followed by the payload
//! bytes with no delimiter. Only the topic table can split it.

use crate::error::ClientError;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Delivery guarantee level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl fmt::Display for Qos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QoS{}", *self as u8)
    }
}

/// Raw inbound message: topic bytes immediately followed by payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    raw: Vec<u8>,
}

impl InboundMessage {
    pub fn from_raw(raw: impl Into<Vec<u8>>) -> Self {
        Self { raw: raw.into() }
    }

    /// Concatenate a topic and payload the way the wire delivers them.
    pub fn from_parts(topic: &str, payload: &[u8]) -> Self {
        let mut raw = Vec::with_capacity(topic.len() + payload.len());
        raw.extend_from_slice(topic.as_bytes());
        raw.extend_from_slice(payload);
        Self { raw }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Create the bounded inbound queue.
pub fn inbound_queue(depth: usize) -> (InboundSender, InboundReceiver) {
    let (tx, rx) = channel::bounded(depth);
    (
        InboundSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        InboundReceiver { rx },
    )
}

/// Producer side of the inbound queue, held by the client.
#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: Sender<InboundMessage>,
    dropped: Arc<AtomicU64>,
}

impl InboundSender {
    /// Enqueue without blocking. Returns `false` if the message was dropped.
    pub fn offer(&self, msg: InboundMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(bytes = msg.len(), "inbound queue full, message dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Messages dropped at the queue since the last reset.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn reset_dropped(&self) {
        self.dropped.store(0, Ordering::Relaxed);
    }
}

/// Consumer side of the inbound queue, owned by the external pump.
#[derive(Debug)]
pub struct InboundReceiver {
    rx: Receiver<InboundMessage>,
}

impl InboundReceiver {
    /// Take the next queued message, if any.
    pub fn try_next(&self) -> Option<InboundMessage> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Operations the gateway needs from the external pub/sub client.
pub trait PubSubClient: Send + Sync {
    /// Subscribe to `topic` and deliver its messages into `sink`.
    ///
    /// `topic` is shared with the topic table, so the client may keep
    /// referencing it for the life of the subscription.
    fn subscribe(&self, topic: Arc<str>, qos: Qos, sink: InboundSender) -> Result<(), ClientError>;

    /// Publish `payload` under `topic`. Does not wait for acknowledgment.
    fn publish(&self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), ClientError>;

    /// Service client I/O for at most `budget`, pushing arrivals into sinks.
    fn yield_for(&self, budget: Duration) -> Result<(), ClientError>;
}

/// A message published through [`LoopbackClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
}

struct Subscription {
    topic: Arc<str>,
    qos: Qos,
    sink: InboundSender,
}

/// In-process broker stand-in.
///
/// Records publishes, and delivers injected messages to exact-match
/// subscriptions when the owner yields.
pub struct LoopbackClient {
    subscriptions: Mutex<Vec<Subscription>>,
    arrivals_tx: Sender<(String, Vec<u8>)>,
    arrivals_rx: Receiver<(String, Vec<u8>)>,
    published: Mutex<Vec<Published>>,
}

impl LoopbackClient {
    pub fn new() -> Self {
        let (arrivals_tx, arrivals_rx) = channel::unbounded();
        Self {
            subscriptions: Mutex::new(Vec::new()),
            arrivals_tx,
            arrivals_rx,
            published: Mutex::new(Vec::new()),
        }
    }

    /// Simulate a message arriving from the broker on `topic`.
    pub fn inject(&self, topic: &str, payload: &[u8]) {
        // receiver lives in self, send cannot fail
        let _ = self.arrivals_tx.send((topic.to_string(), payload.to_vec()));
    }

    /// Active subscriptions as (topic, qos).
    pub fn subscriptions(&self) -> Vec<(Arc<str>, Qos)> {
        self.subscriptions
            .lock()
            .iter()
            .map(|s| (Arc::clone(&s.topic), s.qos))
            .collect()
    }

    /// Everything published so far.
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().clone()
    }

    /// Drain the publish log.
    pub fn take_published(&self) -> Vec<Published> {
        std::mem::take(&mut *self.published.lock())
    }

    fn deliver(&self, topic: &str, payload: &[u8]) {
        let subscriptions = self.subscriptions.lock();
        let mut delivered = false;
        for sub in subscriptions.iter().filter(|s| &*s.topic == topic) {
            sub.sink.offer(InboundMessage::from_parts(topic, payload));
            delivered = true;
        }
        if !delivered {
            tracing::trace!(topic, "no loopback subscriber");
        }
    }
}

impl Default for LoopbackClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSubClient for LoopbackClient {
    fn subscribe(&self, topic: Arc<str>, qos: Qos, sink: InboundSender) -> Result<(), ClientError> {
        self.subscriptions
            .lock()
            .push(Subscription { topic, qos, sink });
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), ClientError> {
        self.published.lock().push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
        });
        Ok(())
    }

    fn yield_for(&self, budget: Duration) -> Result<(), ClientError> {
        let first = match self.arrivals_rx.recv_timeout(budget) {
            Ok(arrival) => arrival,
            Err(RecvTimeoutError::Timeout) => return Ok(()),
            Err(RecvTimeoutError::Disconnected) => return Err(ClientError::NotConnected),
        };
        self.deliver(&first.0, &first.1);

        while let Ok((topic, payload)) = self.arrivals_rx.try_recv() {
            self.deliver(&topic, &payload);
        }
        Ok(())
    }
}
