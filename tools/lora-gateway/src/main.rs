// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LoRa -> MQTT gateway CLI
//!
//! Receives compact readings from LoRa sensor nodes and publishes canonical
//! readings to an MQTT broker.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: broker on localhost, UDP bench radio on :1700
//! lora-gateway
//!
//! # Using configuration file
//! lora-gateway --config gateway.toml
//!
//! # Override broker and prefix
//! lora-gateway --broker-host 10.0.0.5 --topic-prefix plant/hall-b
//!
//! # Generate / check a configuration file
//! lora-gateway gen-config -o gateway.toml
//! lora-gateway validate -c gateway.toml
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lora_bridge::gateway::{Bridge, GatewayConfig, MqttTransport};
use lora_bridge::radio::UdpRadio;
use tracing_subscriber::EnvFilter;

/// LoRa -> MQTT ingestion gateway
#[derive(Parser, Debug)]
#[command(name = "lora-gateway")]
#[command(about = "LoRa -> MQTT ingestion gateway")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MQTT broker host (overrides config)
    #[arg(long)]
    broker_host: Option<String>,

    /// MQTT broker port (overrides config)
    #[arg(long)]
    broker_port: Option<u16>,

    /// Topic prefix (overrides config)
    #[arg(long)]
    topic_prefix: Option<String>,

    /// Address the UDP bench radio listens on
    #[arg(long, default_value = "0.0.0.0:1700")]
    listen: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "gateway.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Handle subcommands
    if let Some(cmd) = args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;

    let radio = UdpRadio::bind(&args.listen)
        .with_context(|| format!("binding radio on {}", args.listen))?;
    let transport = MqttTransport::new(config.mqtt.clone());

    println!("LoRa Gateway v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!();
    println!(
        "Radio:  udp {} ({} MHz, SF{})",
        args.listen,
        config.radio.frequency_mhz,
        config.radio.spreading_factor.value()
    );
    println!("Broker: {}:{}", config.mqtt.host, config.mqtt.port);
    println!("Topics: {}/<machine_id>", config.gateway.topic_prefix);
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let handle = Bridge::new(config)?.start(radio, transport)?;
    let stats = handle.stats();

    // Wait for Ctrl+C
    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    handle.join().await;

    println!("\nFinal Statistics:");
    println!("{}", stats.format_summary());

    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    let mut config = match args.config {
        Some(ref path) => GatewayConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GatewayConfig::default(),
    };

    if let Some(ref host) = args.broker_host {
        config.mqtt.host = host.clone();
    }
    if let Some(port) = args.broker_port {
        config.mqtt.port = port;
    }
    if let Some(ref prefix) = args.topic_prefix {
        config.gateway.topic_prefix = prefix.clone();
    }

    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: PathBuf) -> anyhow::Result<()> {
    let toml_str = GatewayConfig::default().to_toml()?;

    // Add comments
    let content = format!(
        r#"# LoRa Gateway Configuration
# Generated by lora-gateway gen-config
#
# [radio] must match the nodes: frequency, spreading factor, bandwidth,
# coding rate and sync word.

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    match GatewayConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Gateway: {}", config.gateway.name);
            println!(
                "Broker:  {}:{} (client id {}, backoff {}s)",
                config.mqtt.host,
                config.mqtt.port,
                config.mqtt.client_id,
                config.mqtt.reconnect_backoff_secs
            );
            println!("Topics:  {}/<machine_id>", config.gateway.topic_prefix);
            println!(
                "Radio:   {} MHz, SF{}, {} kHz, CR 4/{}, sync 0x{:02X}",
                config.radio.frequency_mhz,
                config.radio.spreading_factor.value(),
                f32::from(config.radio.bandwidth),
                config.radio.coding_rate.denominator(),
                config.radio.sync_word
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}
