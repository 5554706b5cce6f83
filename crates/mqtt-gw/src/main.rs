// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT Gateway CLI
//!
//! Command-line tool for preparing, checking and exercising gateway
//! configurations.
//!
//! # Usage
//!
//! ```bash
//! # Example files
//! mqtt-gw gen-config -o gateway.toml
//! mqtt-gw gen-table -o topics.json
//!
//! # Validate configuration and topic table
//! mqtt-gw validate -c gateway.toml -t topics.json
//!
//! # Try a codec
//! mqtt-gw encode --codec rate --hex 0000803f0000004000004040
//! mqtt-gw decode --codec rate '{"rate":{"x":1,"y":2,"z":3}}'
//!
//! # Run the gateway in-process, feeding raw inbound lines from a file
//! mqtt-gw loopback -c gateway.toml -t topics.json -i inbound.txt --duration 5
//! ```

use clap::{Parser, Subcommand};
use mqtt_gw::{
    CodecKind, Gateway, GatewayConfig, InboundMessage, LocalBus, LoopbackClient, StatsSnapshot,
    TopicTable, TopicTableDef,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Monitor poll interval of the loopback traffic printer.
const TRAFFIC_POLL: Duration = Duration::from_millis(100);

/// MQTT <-> Software Bus Gateway
#[derive(Parser, Debug)]
#[command(name = "mqtt-gw")]
#[command(about = "MQTT <-> software bus gateway - topic table driven JSON/binary translation")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "gateway.toml")]
        output: PathBuf,
    },

    /// Generate example topic table
    GenTable {
        /// Output file path
        #[arg(short, long, default_value = "topics.json")]
        output: PathBuf,
    },

    /// Validate a configuration file and its topic table
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,

        /// Topic table (overrides `topic_table` in the configuration)
        #[arg(short, long)]
        table: Option<PathBuf>,
    },

    /// Encode a binary payload (hex) to JSON
    Encode {
        /// Codec name
        #[arg(long, default_value = "rate")]
        codec: String,

        /// Payload bytes as hex
        #[arg(long)]
        hex: String,
    },

    /// Decode JSON to a binary payload (printed as hex)
    Decode {
        /// Codec name
        #[arg(long, default_value = "rate")]
        codec: String,

        /// JSON document
        json: String,
    },

    /// Run the gateway against the in-process bus and broker
    Loopback {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,

        /// Topic table (overrides `topic_table` in the configuration)
        #[arg(short, long)]
        table: Option<PathBuf>,

        /// Raw inbound messages, one per line (topic immediately followed by JSON)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(short, long)]
        duration: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Commands::GenConfig { output } => cmd_gen_config(output),
        Commands::GenTable { output } => cmd_gen_table(output),
        Commands::Validate { config, table } => cmd_validate(config, table),
        Commands::Encode { codec, hex } => cmd_encode(&codec, &hex),
        Commands::Decode { codec, json } => cmd_decode(&codec, &json),
        Commands::Loopback {
            config,
            table,
            input,
            duration,
        } => cmd_loopback(config, table, input, duration).await,
    }
}

fn load_config(
    path: &Path,
    table: Option<PathBuf>,
) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let mut config = GatewayConfig::from_file(path)?;
    if let Some(table) = table {
        config = config.topic_table(table);
    }
    Ok(config)
}

fn codec_kind(name: &str) -> Result<CodecKind, Box<dyn std::error::Error>> {
    CodecKind::from_name(name).ok_or_else(|| {
        let known: Vec<_> = CodecKind::ALL.iter().map(|k| k.name()).collect();
        format!("unknown codec '{}' (known: {})", name, known.join(", ")).into()
    })
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig {
        name: "example-gateway".into(),
        ..GatewayConfig::default()
    }
    .topic_table("topics.json");

    let toml_str = toml::to_string_pretty(&config)?;

    // Add comments
    let content = format!(
        r#"# MQTT Gateway Configuration
# Generated by mqtt-gw gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_gen_table(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let json = TopicTableDef::example().to_json_pretty()?;
    std::fs::write(&output, json)?;
    println!("Generated topic table: {}", output.display());
    Ok(())
}

fn cmd_validate(
    config_path: PathBuf,
    table: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_config(&config_path, table) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    };

    println!("Configuration valid!");
    println!();
    println!("Gateway: {}", config.name);
    println!(
        "Message ids: {:#06x}..={:#06x} ({} slots)",
        config.base_msg_id,
        config.base_msg_id as usize + config.max_topics - 1,
        config.max_topics
    );
    println!(
        "Topic pipe: {} (depth {})",
        config.topic_pipe_name, config.topic_pipe_depth
    );

    let Some(table_path) = config.topic_table.as_ref() else {
        println!("Topic table: not configured");
        return Ok(());
    };

    let def = match TopicTableDef::from_file(table_path) {
        Ok(def) => def,
        Err(e) => {
            eprintln!("Topic table unreadable: {}", e);
            std::process::exit(1);
        }
    };
    let (table, report) = TopicTable::from_def(
        config.base_msg_id,
        config.max_topics,
        config.prefix_policy,
        &def,
    );

    println!();
    println!(
        "Topic table: {} ({} of {} rows loaded)",
        table_path.display(),
        report.loaded,
        report.declared
    );
    for entry in table.entries() {
        println!(
            "  [{}] {:#06x} {} ({}, codec {})",
            entry.index(),
            entry.msg_id(),
            entry.name(),
            entry.direction(),
            entry.codec_kind()
        );
    }
    for (short, long) in table.overlapping_names() {
        println!(
            "  warning: [{}] is a prefix of [{}], inbound match uses {:?}",
            short,
            long,
            table.policy()
        );
    }

    if let Some(err) = report.error {
        eprintln!("Topic table invalid: {}", err);
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_encode(codec: &str, payload_hex: &str) -> Result<(), Box<dyn std::error::Error>> {
    let codec = codec_kind(codec)?.codec();
    let payload = hex::decode(payload_hex.trim())?;

    let mut json = String::new();
    match codec.encode(&payload, &mut json) {
        Ok(()) => {
            println!("{}", json);
            Ok(())
        }
        Err(e) => {
            eprintln!("Encode failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_decode(codec: &str, json: &str) -> Result<(), Box<dyn std::error::Error>> {
    let codec = codec_kind(codec)?.codec();

    let mut payload = vec![0u8; codec.payload_len()];
    match codec.decode(json.as_bytes(), &mut payload) {
        Ok(()) => {
            println!("{}", hex::encode(&payload));
            Ok(())
        }
        Err(e) => {
            match e.field_counts() {
                Some((found, expected)) => {
                    eprintln!("Decode failed: {} (found {} of {} fields)", e, found, expected)
                }
                None => eprintln!("Decode failed: {}", e),
            }
            std::process::exit(1);
        }
    }
}

async fn cmd_loopback(
    config_path: PathBuf,
    table: Option<PathBuf>,
    input: Option<PathBuf>,
    duration: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&config_path, table)?;

    let lines: Vec<String> = match input {
        Some(path) => std::fs::read_to_string(path)?
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };

    let bus = Arc::new(LocalBus::new(
        config.topic_pipe_name.clone(),
        config.topic_pipe_depth,
    ));
    let monitor = bus.monitor();
    let client = Arc::new(LoopbackClient::new());

    let (gateway, report) = Gateway::from_config(config.clone(), bus.clone(), client.clone())?;
    if let Some(err) = &report.error {
        println!(
            "Warning: topic table partially loaded ({} of {}): {}",
            report.loaded, report.declared, err
        );
    }

    println!("MQTT Gateway v{} (loopback)", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!();
    for entry in gateway.table().entries() {
        println!(
            "Topic: {} <-> {:#06x} ({})",
            entry.name(),
            entry.msg_id(),
            entry.direction()
        );
    }
    println!();

    let inbound = gateway.inbound_sender();
    let handle = gateway.start()?;

    // Traffic printer; drains the monitor and the published log as they fill
    let traffic = {
        let running = handle.running_flag();
        let client = client.clone();
        tokio::task::spawn_blocking(move || {
            println!("Traffic:");
            loop {
                let live = running.load(std::sync::atomic::Ordering::Relaxed);
                while let Ok(msg) = monitor.recv_timeout(TRAFFIC_POLL) {
                    println!("  bus {:#06x} {}", msg.msg_id, hex::encode(&msg.payload));
                }
                for published in client.take_published() {
                    println!(
                        "  pub {} ({}) {}",
                        published.topic,
                        published.qos,
                        String::from_utf8_lossy(&published.payload)
                    );
                }
                if !live {
                    break;
                }
            }
        })
    };

    // Stats reporting task
    let stats_interval = config.stats_interval_secs;
    if stats_interval > 0 {
        let stats = handle.stats();
        let queue = handle.inbound_sender();
        let running = handle.running_flag();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                if !running.load(std::sync::atomic::Ordering::Relaxed) {
                    break;
                }
                print_stats(&stats.snapshot(queue.dropped()));
            }
        });
    }

    // Feed the queue one batch per client yield so the pump keeps up
    let batch = config.inbound_queue_depth.max(1);
    for chunk in lines.chunks(batch) {
        for line in chunk {
            inbound.offer(InboundMessage::from_raw(line.as_str()));
        }
        tokio::time::sleep(config.client_yield_time().max(Duration::from_millis(1))).await;
    }

    match duration {
        Some(secs) => {
            println!("Running for {}s...", secs);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                res = tokio::signal::ctrl_c() => res?,
            }
        }
        None => {
            println!("Press Ctrl+C to stop...");
            tokio::signal::ctrl_c().await?;
        }
    }
    println!("\nShutting down...");

    let snapshot = handle.snapshot();
    tokio::task::spawn_blocking(move || handle.join()).await?;
    traffic.await?;

    println!("\nFinal Statistics:");
    print_stats(&snapshot);
    Ok(())
}

fn print_stats(stats: &StatsSnapshot) {
    println!("--- Gateway Statistics ---");
    println!("{}", stats.format_summary());
    println!(
        "  {:.1} msg/s, {} dropped",
        stats.messages_per_second(),
        stats.bus_to_external.dropped() + stats.external_to_bus.dropped() + stats.inbound_dropped
    );
}
