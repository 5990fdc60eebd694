// Command line interface: which satellite to talk to, and how.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// Name of the satellite to command.
    #[arg(long, default_value = "Orbit1")]
    pub satellite_name: String,
    /// Shared secret; must match the satellite's copy exactly.
    #[arg(long, default_value = "replace-me-before-flight")]
    pub hmac_secret: String,
    /// Operator callsign; transmission is refused while empty.
    #[arg(long, default_value = "KK7GND")]
    pub license: String,
    #[arg(long, default_value = "0.0.0.0:7891")]
    pub bind_addr: String,
    #[arg(long, default_value = "127.0.0.1:7892")]
    pub satellite_addr: String,
    #[arg(long, default_value_t = 252)]
    pub max_frame_size: usize,
    /// Inter-frame pacing on the half-duplex link.
    #[arg(long, default_value_t = 200)]
    pub send_delay_ms: u64,
}
