// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host-side LoRa sensor node
//!
//! Runs the node scheduler with a simulated sensor and the UDP bench radio,
//! so a gateway can be exercised without hardware.
//!
//! # Usage
//!
//! ```bash
//! # One reading every 30s to a gateway on localhost
//! lora-node lathe_01
//!
//! # Fast profile, 5s interval, 10 cycles then exit
//! lora-node press_07 --interval 5 --profile fast --cycles 10
//! ```

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use lora_bridge::node::{NodeConfig, NodeScheduler, NodeSession, PowerControl, SimulatedSensor};
use lora_bridge::radio::{LinkQuality, LoRaProfile, RadioConfig, UdpRadio};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// LoRa sensor node (host simulation)
#[derive(Parser, Debug)]
#[command(name = "lora-node")]
#[command(about = "Duty-cycled LoRa sensor node over the UDP bench radio")]
#[command(version)]
struct Args {
    /// Machine identity carried in every packet
    identity: String,

    /// Wake interval in seconds
    #[arg(short, long, default_value = "30")]
    interval: u64,

    /// Gateway UDP address
    #[arg(short, long, default_value = "127.0.0.1:1700")]
    gateway: String,

    /// LoRa profile (fast, balanced, long-range)
    #[arg(long, default_value = "balanced")]
    profile: LoRaProfile,

    /// Carrier frequency in MHz
    #[arg(long, default_value = "868.0")]
    frequency: f32,

    /// RSSI reported to the gateway (dBm)
    #[arg(long, default_value = "-60", allow_hyphen_values = true)]
    rssi: i16,

    /// SNR reported to the gateway (dB)
    #[arg(long, default_value = "7.5", allow_hyphen_values = true)]
    snr: f32,

    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Sensor simulation seed (default: current time)
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Stands in for deep sleep and reboot on a host
struct HostPower;

impl PowerControl for HostPower {
    fn deep_sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }

    fn restart(&mut self) {
        warn!("Restart requested, cold booting in 1s");
        thread::sleep(Duration::from_secs(1));
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let radio_config = RadioConfig::from_profile(args.profile, args.frequency);
    let config = NodeConfig::new(args.identity.clone())?
        .with_wake_interval(Duration::from_secs(args.interval))?
        .with_radio(radio_config)?;

    let radio = UdpRadio::bind("0.0.0.0:0")?
        .with_peer(&args.gateway)
        .with_context(|| format!("resolving gateway {}", args.gateway))?
        .with_link(LinkQuality {
            rssi: args.rssi,
            snr: args.snr,
        });

    let seed = args.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });

    info!(
        gateway = %args.gateway,
        duty_cycle_pct = config.worst_case_duty_cycle() * 100.0,
        "Sending to gateway"
    );

    let mut node = NodeScheduler::new(config, radio, SimulatedSensor::new(seed));
    let session = node.run(&mut HostPower, NodeSession::new(), args.cycles);

    info!(
        boot_count = session.boot_count,
        last_send = ?session.last_send_result,
        "Node stopped"
    );
    Ok(())
}
