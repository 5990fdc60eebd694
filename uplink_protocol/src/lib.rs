// lib.rs — uplink wire protocol shared by the flight software and the ground station

pub mod auth;
pub mod frame;
pub mod message;
pub mod packets;
pub mod radio;
pub mod testing;

pub use auth::HmacAuthenticator;
pub use message::CommandMessage;
pub use packets::PacketManager;
pub use radio::{Radio, UdpRadio};

// =========================== Command vocabulary =============================

pub const CMD_RESET: &str = "reset";
pub const CMD_CHANGE_RADIO_MODULATION: &str = "change_radio_modulation";
pub const CMD_SEND_JOKE: &str = "send_joke";

/// Unauthenticated read of the satellite's replay counter. The only way a
/// ground station can learn where the counter stands before opening a session.
pub const CMD_GET_COUNTER: &str = "get_counter";

/// Legacy (OSCAR) vocabulary, reachable only through the password path.
pub const CMD_PING: &str = "ping";
pub const CMD_REPEAT: &str = "repeat";

/// Passphrase for the legacy recovery path. It bypasses replay protection and
/// exists for desync recovery under direct operator supervision.
pub const OSCAR_PASSWORD: &str = "Hello World!";

// ============================== Wire constants ==============================

/// Raw acknowledgement payload transmitted after an accepted command.
pub const ACK: &[u8] = b"ACK";
