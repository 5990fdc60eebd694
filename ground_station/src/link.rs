// The command exchange seen from the ground: sign, uplink, wait through the
// turnaround for the acknowledgement, then collect the response.

use std::time::Duration;

use tracing::{debug, info, warn};

use uplink_protocol::message::{
    CommandMessage, FIELD_ARGS, FIELD_COMMAND, FIELD_NAME, FIELD_PASSWORD,
};
use uplink_protocol::{ACK, CMD_GET_COUNTER, HmacAuthenticator, OSCAR_PASSWORD, PacketManager, Radio};

const ACK_TIMEOUT: Duration = Duration::from_secs(1);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_ATTEMPTS: usize = 5;

pub struct GroundStation<R: Radio> {
    satellite_name: String,
    packets: PacketManager<R>,
    authenticator: HmacAuthenticator,
    /// Last counter value stamped into an uplinked command.
    counter: u16,
}

impl<R: Radio> GroundStation<R> {
    pub fn new(satellite_name: String, hmac_secret: &str, packets: PacketManager<R>) -> Self {
        Self {
            satellite_name,
            packets,
            authenticator: HmacAuthenticator::new(hmac_secret),
            counter: 0,
        }
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }

    /// Queries the satellite's persisted counter so signing can resume above
    /// the floor after a ground-side restart.
    pub async fn sync_counter(&mut self) -> Option<u16> {
        let mut msg = CommandMessage::new();
        msg.insert(FIELD_COMMAND, CMD_GET_COUNTER);
        let wire = msg.to_bytes();

        for attempt in 1..=MAX_ATTEMPTS {
            if !self.packets.send(&wire).await {
                continue;
            }
            if let Some(reply) = self.packets.listen(RESPONSE_TIMEOUT).await {
                match String::from_utf8_lossy(&reply).trim().parse::<u16>() {
                    Ok(value) => {
                        self.counter = value;
                        return Some(value);
                    }
                    Err(_) => info!(attempt, "unparsable counter reply, retrying"),
                }
            }
        }
        None
    }

    /// Signs and uplinks one command from the authenticated vocabulary.
    pub async fn send_command(&mut self, command: &str, args: &[String]) -> Option<String> {
        self.counter = self.counter.wrapping_add(1);

        let mut msg = CommandMessage::new();
        msg.insert(FIELD_NAME, self.satellite_name.as_str());
        msg.insert(FIELD_COMMAND, command);
        if !args.is_empty() {
            msg.insert(FIELD_ARGS, args.to_vec());
        }
        msg.sign(&self.authenticator, self.counter);

        info!(%command, ?args, counter = self.counter, "sending command");
        self.exchange(&msg.to_bytes()).await
    }

    /// Legacy recovery vocabulary; password only, no counter, no digest.
    pub async fn send_oscar(&mut self, command: &str, args: &[String]) -> Option<String> {
        let mut msg = CommandMessage::new();
        msg.insert(FIELD_PASSWORD, OSCAR_PASSWORD);
        msg.insert(FIELD_COMMAND, command);
        if !args.is_empty() {
            msg.insert(FIELD_ARGS, args.to_vec());
        }

        info!(%command, ?args, "sending oscar command");
        self.exchange(&msg.to_bytes()).await
    }

    async fn exchange(&mut self, wire: &[u8]) -> Option<String> {
        for attempt in 1..=MAX_ATTEMPTS {
            if !self.packets.send(wire).await {
                warn!(attempt, "uplink transmission failed");
                continue;
            }

            let Some(reply) = self.packets.listen(ACK_TIMEOUT).await else {
                info!(attempt, "no acknowledgement received, retrying");
                continue;
            };
            if reply != ACK {
                info!(
                    attempt,
                    reply = %String::from_utf8_lossy(&reply),
                    "expected acknowledgement, retrying"
                );
                continue;
            }
            debug!("received acknowledgement");

            let Some(response) = self.packets.listen(RESPONSE_TIMEOUT).await else {
                info!(attempt, "no response after acknowledgement, retrying");
                continue;
            };
            return Some(String::from_utf8_lossy(&response).into_owned());
        }

        warn!("giving up after {MAX_ATTEMPTS} attempts");
        None
    }
}
