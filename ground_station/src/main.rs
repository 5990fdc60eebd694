// src/main.rs
mod config;
mod link;

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use uplink_protocol::{
    CMD_CHANGE_RADIO_MODULATION, CMD_PING, CMD_REPEAT, CMD_RESET, CMD_SEND_JOKE, PacketManager,
    UdpRadio,
};

use link::GroundStation;

const MENU: &str = "
===============================
| Select command to send      |
| 1: Reset                    |
| 2: Change radio modulation  |
| 3: Send joke                |
| 4: Query replay counter     |
| 5: OSCAR ping               |
| 6: OSCAR repeat             |
| q: Quit                     |
===============================
";

#[tokio::main]
async fn main() -> Result<()> {
    // -------- logging ----------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ground_station=info".parse().unwrap())
                .add_directive("uplink_protocol=info".parse().unwrap()),
        )
        .compact()
        .init();

    // -------- radio + station ----------
    let cli = config::Cli::parse();
    let radio = UdpRadio::connect(&cli.bind_addr, &cli.satellite_addr, cli.max_frame_size)
        .await
        .context("bringing up radio link")?;
    let packets = PacketManager::new(
        radio,
        cli.license.clone(),
        Duration::from_millis(cli.send_delay_ms),
    )?;
    let mut station = GroundStation::new(cli.satellite_name.clone(), &cli.hmac_secret, packets);

    info!(satellite = %cli.satellite_name, "ground station starting");
    match station.sync_counter().await {
        Some(counter) => info!(counter, "replay counter synchronized"),
        None => warn!("no counter response from the satellite, starting from 0"),
    }

    // -------- operator console ----------
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("{MENU}");
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let response = match line.trim() {
            "1" => station.send_command(CMD_RESET, &[]).await,
            "2" => {
                let Some(modulation) = prompt(&mut lines, "Enter new radio modulation [FSK | LoRa]: ").await? else {
                    break;
                };
                station
                    .send_command(CMD_CHANGE_RADIO_MODULATION, &[modulation])
                    .await
            }
            "3" => station.send_command(CMD_SEND_JOKE, &[]).await,
            "4" => {
                match station.sync_counter().await {
                    Some(counter) => info!(counter, "satellite replay counter"),
                    None => warn!("no counter response from the satellite"),
                }
                continue;
            }
            "5" => station.send_oscar(CMD_PING, &[]).await,
            "6" => {
                let Some(message) = prompt(&mut lines, "Enter message to repeat: ").await? else {
                    break;
                };
                if message.is_empty() {
                    warn!("empty message provided");
                    continue;
                }
                let words: Vec<String> = message.split_whitespace().map(str::to_string).collect();
                station.send_oscar(CMD_REPEAT, &words).await
            }
            "q" | "quit" => break,
            _ => {
                warn!("invalid command selection");
                continue;
            }
        };

        match response {
            Some(text) => info!(response = %text, "received response"),
            None => warn!("command exchange failed"),
        }
    }

    info!("ground station exiting");
    Ok(())
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> Result<Option<String>> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.map(|l| l.trim().to_string()))
}
