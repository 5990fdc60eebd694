// src/main.rs
mod cdh;
mod config;
mod nvm;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uplink_protocol::{PacketManager, UdpRadio};

use cdh::{CommandDataHandler, Dispatched, PassOutcome};
use nvm::FileNvm;
use nvm::counter::Counter16;

/// Two bytes at this NVM offset hold the replay counter, high byte first.
const REPLAY_COUNTER_OFFSET: usize = 0;
const NVM_SIZE: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    // -------- logging ----------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("satellite_cdh=debug".parse().unwrap())
                .add_directive("uplink_protocol=debug".parse().unwrap()),
        )
        .compact()
        .init();

    // -------- config ----------
    let cli = config::Cli::parse();
    let config = config::Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    info!(
        name = %config.cubesat_name,
        modulation = %config.modulation,
        "satellite CDH starting"
    );

    // -------- replay counter ----------
    // A missing store is fatal: without the counter nothing below can hold
    // the anti-replay guarantee.
    let store = FileNvm::open(&cli.nvm, NVM_SIZE).context("opening non-volatile memory")?;
    let replay_counter = Counter16::new(store, REPLAY_COUNTER_OFFSET)
        .context("placing replay counter in non-volatile memory")?;
    info!(counter = replay_counter.get(), "replay counter restored");

    // -------- radio + packet manager ----------
    let radio = UdpRadio::connect(&cli.bind_addr, &cli.ground_addr, config.max_frame_size)
        .await
        .context("bringing up radio link")?;
    let packets = PacketManager::new(
        radio,
        config.license.clone(),
        Duration::from_millis(config.turnaround_delay_ms),
    )?;

    // -------- command loop ----------
    let listen_timeout = Duration::from_secs(config.listen_timeout_s);
    let mut handler = CommandDataHandler::new(config, packets, replay_counter);

    loop {
        let outcome = handler.listen_for_commands(listen_timeout).await;
        if outcome == PassOutcome::Dispatched(Dispatched::Reset) {
            // stands in for the microcontroller reset on flight hardware
            warn!("reset dispatched, restarting flight software");
            break;
        }
    }
    Ok(())
}
