// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT <-> Software Bus Gateway
//!
//! Bridges a binary software bus and an external pub/sub broker, translating
//! fixed-layout binary payloads to JSON and back under the control of a
//! topic table.
//!
//! # Features
//!
//! - **Topic Table**: Fixed slots, message id = `base_msg_id + offset`
//! - **Bidirectional Translation**: Bus -> JSON publish, JSON -> bus transmit
//! - **Pluggable Codecs**: One codec per message type, selected per topic
//! - **Pluggable Transports**: [`SoftwareBus`] and [`PubSubClient`] traits
//!
//! # Quick Start
//!
//! ```bash
//! # Generate a configuration and a topic table
//! mqtt-gw gen-config -o gateway.toml
//! mqtt-gw gen-table -o topics.json
//!
//! # Check them
//! mqtt-gw validate -c gateway.toml -t topics.json
//!
//! # Run against the in-process bus and broker
//! mqtt-gw loopback -c gateway.toml -t topics.json -i inbound.txt
//! ```
//!
//! # Topic Table
//!
//! ```json
//! { "topics": [
//!     { "name": "sat/rate",     "direction": "bus_to_external", "offset": 0, "codec": "rate" },
//!     { "name": "gnd/rate/cmd", "direction": "external_to_bus", "offset": 1, "codec": "rate" }
//! ] }
//! ```

pub mod bus;
pub mod client;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod pump;
pub mod stats;
pub mod subscribe;
pub mod table;

pub use bus::{BusMessage, LocalBus, MsgId, SoftwareBus};
pub use client::{inbound_queue, InboundMessage, InboundSender, LoopbackClient, PubSubClient, Qos};
pub use codec::{Codec, CodecKind, RateCodec, RatePayload};
pub use config::{ConfigError, GatewayConfig};
pub use engine::{Disposition, TranslationEngine};
pub use error::{BusError, ClientError, CodecError, GatewayError, TableError, TranslateError};
pub use gateway::{Gateway, GatewayHandle};
pub use stats::{GatewayStats, StatsSnapshot};
pub use subscribe::{SubscriptionManager, SubscriptionSummary};
pub use table::{Direction, PrefixPolicy, TopicEntry, TopicRow, TopicTable, TopicTableDef};
