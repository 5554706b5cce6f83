// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Software bus seam.
//!
//! The gateway only needs four bus operations: subscribe its topic pipe to a
//! message id, pend on the pipe with a timeout, poll it, and transmit a
//! message. [`SoftwareBus`] captures exactly that so any bus transport can be
//! plugged in. [`LocalBus`] is an in-process implementation backed by a
//! bounded crossbeam channel, used by tests and the `loopback` command.

use crate::error::BusError;
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::time::Duration;

/// Numeric bus message identifier.
pub type MsgId = u32;

/// Binary bus message: identifier, delivery timestamp and fixed-layout payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub msg_id: MsgId,
    pub timestamp: Option<DateTime<Utc>>,
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// Create an unstamped message.
    pub fn new(msg_id: MsgId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            msg_id,
            timestamp: None,
            payload: payload.into(),
        }
    }

    /// Stamp the message with the current time.
    pub fn stamp(&mut self) {
        self.timestamp = Some(Utc::now());
    }
}

/// Operations the gateway needs from the software bus.
pub trait SoftwareBus: Send + Sync {
    /// Route messages carrying `msg_id` to the gateway's topic pipe.
    fn subscribe(&self, msg_id: MsgId) -> Result<(), BusError>;

    /// Pend on the topic pipe for at most `timeout`.
    ///
    /// `Ok(None)` means the pend expired with no message (idle, not a fault).
    fn receive(&self, timeout: Duration) -> Result<Option<BusMessage>, BusError>;

    /// Take a message only if one is already queued.
    fn try_receive(&self) -> Result<Option<BusMessage>, BusError> {
        self.receive(Duration::ZERO)
    }

    /// Send a message onto the bus.
    fn transmit(&self, msg: BusMessage) -> Result<(), BusError>;
}

/// In-process software bus with a single bounded topic pipe.
pub struct LocalBus {
    pipe_name: String,
    pipe_tx: Sender<BusMessage>,
    pipe_rx: Receiver<BusMessage>,
    subscriptions: RwLock<HashSet<MsgId>>,
    monitors: Mutex<Vec<Sender<BusMessage>>>,
}

impl LocalBus {
    /// Create a bus whose topic pipe holds at most `depth` messages.
    pub fn new(pipe_name: impl Into<String>, depth: usize) -> Self {
        let (pipe_tx, pipe_rx) = channel::bounded(depth);
        Self {
            pipe_name: pipe_name.into(),
            pipe_tx,
            pipe_rx,
            subscriptions: RwLock::new(HashSet::new()),
            monitors: Mutex::new(Vec::new()),
        }
    }

    /// Name of the topic pipe.
    pub fn pipe_name(&self) -> &str {
        &self.pipe_name
    }

    /// Whether the topic pipe is subscribed to `msg_id`.
    pub fn is_subscribed(&self, msg_id: MsgId) -> bool {
        self.subscriptions.read().contains(&msg_id)
    }

    /// Number of messages waiting in the topic pipe.
    pub fn pending(&self) -> usize {
        self.pipe_rx.len()
    }

    /// Observe every transmitted message, subscribed or not.
    pub fn monitor(&self) -> Receiver<BusMessage> {
        let (tx, rx) = channel::unbounded();
        self.monitors.lock().push(tx);
        rx
    }
}

impl SoftwareBus for LocalBus {
    fn subscribe(&self, msg_id: MsgId) -> Result<(), BusError> {
        self.subscriptions.write().insert(msg_id);
        tracing::debug!(pipe = %self.pipe_name, msg_id, "pipe subscribed");
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> Result<Option<BusMessage>, BusError> {
        if timeout.is_zero() {
            return match self.pipe_rx.try_recv() {
                Ok(msg) => Ok(Some(msg)),
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => Err(BusError::PipeClosed {
                    pipe: self.pipe_name.clone(),
                }),
            };
        }

        match self.pipe_rx.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::PipeClosed {
                pipe: self.pipe_name.clone(),
            }),
        }
    }

    fn transmit(&self, msg: BusMessage) -> Result<(), BusError> {
        self.monitors
            .lock()
            .retain(|monitor| monitor.send(msg.clone()).is_ok());

        if !self.is_subscribed(msg.msg_id) {
            return Ok(());
        }

        self.pipe_tx.try_send(msg).map_err(|err| match err {
            TrySendError::Full(_) => BusError::PipeFull {
                pipe: self.pipe_name.clone(),
            },
            TrySendError::Disconnected(_) => BusError::PipeClosed {
                pipe: self.pipe_name.clone(),
            },
        })
    }
}
