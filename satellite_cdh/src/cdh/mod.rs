// Command authentication and dispatch for the uplink.
//
// One call processes one received payload to completion. Parse failures are
// the only failure path that answers the sender; every authentication
// failure below is silent toward the network so the handler cannot be used
// as a verification oracle, and is logged locally instead.

use std::time::Duration;

use rand::seq::IndexedRandom;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use uplink_protocol::message::{CommandMessage, CounterField};
use uplink_protocol::{
    CMD_CHANGE_RADIO_MODULATION, CMD_GET_COUNTER, CMD_PING, CMD_REPEAT, CMD_RESET, CMD_SEND_JOKE,
    HmacAuthenticator, OSCAR_PASSWORD, PacketManager, Radio,
};

use crate::config::Config;
use crate::nvm::NonVolatileMemory;
use crate::nvm::counter::Counter16;

/// Counters farther than half the space ahead of the floor are only
/// reachable by stepping backward, so they are stale.
const FORWARD_WINDOW: u16 = 32768;

/// What one listen pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Timed out with nothing received.
    Idle,
    /// Message rejected without any reply.
    Dropped(DropReason),
    /// A diagnostic frame was sent back.
    Diagnostic,
    /// A command was authenticated, acknowledged and dispatched.
    Dispatched(Dispatched),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `hmac` or `counter` missing on the authenticated path.
    MissingAuth,
    /// `counter` present but not an integer in [0, 65535].
    InvalidCounterField,
    BadHmac,
    /// Exact replay or a counter behind the persisted floor.
    Replay,
    /// Authenticated, but addressed to a different satellite.
    NameMismatch,
    /// The accepted counter could not be persisted; without the floor the
    /// anti-replay guarantee is gone, so the command is not executed.
    PersistFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Reset,
    ChangeRadioModulation,
    SendJoke,
    GetCounter,
    /// Legacy vocabulary (`ping`, `repeat`).
    Oscar,
}

/// Forward half-window freshness test over the cyclic 16-bit counter space.
/// Rejects exact replays (diff 0) and values only reachable backward
/// (diff > 32768); tolerates legitimate forward wraparound.
pub fn counter_is_fresh(last: u16, candidate: u16) -> bool {
    let diff = candidate.wrapping_sub(last);
    diff != 0 && diff <= FORWARD_WINDOW
}

pub struct CommandDataHandler<R: Radio, N: NonVolatileMemory> {
    config: Config,
    packets: PacketManager<R>,
    authenticator: HmacAuthenticator,
    replay_counter: Counter16<N>,
    turnaround: Duration,
}

impl<R: Radio, N: NonVolatileMemory> CommandDataHandler<R, N> {
    pub fn new(config: Config, packets: PacketManager<R>, replay_counter: Counter16<N>) -> Self {
        let authenticator = HmacAuthenticator::new(&config.hmac_secret);
        let turnaround = Duration::from_millis(config.turnaround_delay_ms);
        Self {
            config,
            packets,
            authenticator,
            replay_counter,
            turnaround,
        }
    }

    /// The persisted floor; also the value reported to `get_counter`.
    pub fn last_accepted_counter(&self) -> u16 {
        self.replay_counter.get()
    }

    /// Listens up to `timeout` for one payload and runs it through the
    /// protocol state machine.
    pub async fn listen_for_commands(&mut self, timeout: Duration) -> PassOutcome {
        debug!(?timeout, "listening for commands");

        let Some(raw) = self.packets.listen(timeout).await else {
            return PassOutcome::Idle;
        };

        let msg = match CommandMessage::parse(&raw) {
            Ok(msg) => msg,
            Err(err) => {
                error!(%err, "failed to parse command message");
                self.send_text(&format!("failed to parse command message: {err}"))
                    .await;
                return PassOutcome::Diagnostic;
            }
        };

        // Legacy recovery path: replay protection deliberately bypassed.
        if msg.password() == Some(OSCAR_PASSWORD) {
            return self.handle_oscar(&msg).await;
        }

        // Counter query: the one unauthenticated read, so a ground station
        // can learn the floor and open a session.
        if msg.command() == Some(CMD_GET_COUNTER) {
            let value = self.replay_counter.get();
            info!(counter = value, "counter query");
            sleep(self.turnaround).await;
            self.send_text(&value.to_string()).await;
            return PassOutcome::Dispatched(Dispatched::GetCounter);
        }

        if let Err(reason) = self.authenticate(&msg) {
            return PassOutcome::Dropped(reason);
        }

        self.dispatch(&msg).await
    }

    /// Field checks, HMAC, replay window, persistence, identity. Every
    /// failure here is silent toward the network.
    fn authenticate(&mut self, msg: &CommandMessage) -> Result<(), DropReason> {
        let Some(candidate) = msg.hmac() else {
            debug!("message missing hmac field");
            return Err(DropReason::MissingAuth);
        };

        let counter = match msg.counter() {
            CounterField::Missing => {
                debug!("message missing counter field");
                return Err(DropReason::MissingAuth);
            }
            CounterField::Invalid => {
                debug!("counter field is not a 16-bit integer");
                return Err(DropReason::InvalidCounterField);
            }
            CounterField::Value(value) => value,
        };

        let canonical = msg.canonical_form();
        if !self.authenticator.verify(&canonical, counter, candidate) {
            debug!("invalid hmac in message");
            return Err(DropReason::BadHmac);
        }

        let last = self.replay_counter.get();
        if !counter_is_fresh(last, counter) {
            let diff = counter.wrapping_sub(last);
            debug!(counter, last, diff, "replayed or stale counter");
            return Err(DropReason::Replay);
        }

        // Close the window for this value before anything else runs; a
        // crash-and-retry by the sender must not be replayable.
        if let Err(err) = self.replay_counter.set(counter) {
            error!(%err, "failed to persist replay counter");
            return Err(DropReason::PersistFailed);
        }

        // After authentication, so only a holder of the secret can probe
        // for the configured name.
        if msg.name() != Some(self.config.cubesat_name.as_str()) {
            debug!(name = ?msg.name(), "satellite name mismatch in message");
            return Err(DropReason::NameMismatch);
        }

        Ok(())
    }

    async fn dispatch(&mut self, msg: &CommandMessage) -> PassOutcome {
        let Some(cmd) = msg.command() else {
            warn!("no command found in message");
            self.send_text("no command found in message").await;
            return PassOutcome::Diagnostic;
        };
        let cmd = cmd.to_owned();
        let args = msg.args();
        debug!(%cmd, ?args, "received command message");

        // The sender's radio needs time to switch back to receive mode.
        sleep(self.turnaround).await;
        self.packets.send_acknowledgement().await;

        match cmd.as_str() {
            CMD_RESET => {
                self.reset().await;
                PassOutcome::Dispatched(Dispatched::Reset)
            }
            CMD_CHANGE_RADIO_MODULATION => {
                self.change_radio_modulation(&args).await;
                PassOutcome::Dispatched(Dispatched::ChangeRadioModulation)
            }
            CMD_SEND_JOKE => {
                self.send_joke().await;
                PassOutcome::Dispatched(Dispatched::SendJoke)
            }
            _ => {
                warn!(%cmd, "unknown command received");
                self.send_text(&format!("unknown command received: {cmd}"))
                    .await;
                PassOutcome::Diagnostic
            }
        }
    }

    async fn handle_oscar(&mut self, msg: &CommandMessage) -> PassOutcome {
        let Some(cmd) = msg.command() else {
            warn!("no oscar command found in message");
            self.send_text("no oscar command found in message").await;
            return PassOutcome::Diagnostic;
        };
        let cmd = cmd.to_owned();
        let args = msg.args();
        debug!(%cmd, ?args, "oscar command received");

        sleep(self.turnaround).await;
        self.packets.send_acknowledgement().await;

        match cmd.as_str() {
            CMD_PING => {
                info!("oscar ping received, sending pong");
                let rssi = self.packets.last_rssi();
                self.send_text(&format!("Pong! {rssi}")).await;
                PassOutcome::Dispatched(Dispatched::Oscar)
            }
            CMD_REPEAT => {
                if args.is_empty() {
                    warn!("no message specified for repeat command");
                    self.send_text("no message specified for repeat command")
                        .await;
                    return PassOutcome::Diagnostic;
                }
                info!("oscar repeat received, repeating message");
                self.send_text(&args.join(" ")).await;
                PassOutcome::Dispatched(Dispatched::Oscar)
            }
            _ => {
                warn!(%cmd, "unknown oscar command received");
                self.send_text(&format!("unknown oscar command received: {cmd}"))
                    .await;
                PassOutcome::Diagnostic
            }
        }
    }

    /// Announces the reset; the platform restart itself is the caller's job
    /// once this pass returns `Dispatched(Reset)`.
    async fn reset(&mut self) {
        info!("resetting satellite");
        self.send_text("resetting satellite").await;
    }

    async fn change_radio_modulation(&mut self, args: &[String]) {
        let Some(modulation) = args.first() else {
            warn!("no modulation specified");
            self.send_text("no modulation specified, provide a modulation type")
                .await;
            return;
        };

        match self.config.set_modulation(modulation) {
            Ok(()) => {
                info!(%modulation, "radio modulation changed");
                self.send_text(&format!("radio modulation changed: {modulation}"))
                    .await;
            }
            Err(err) => {
                // The sender already proved legitimacy; report the failure.
                error!(%err, "failed to change radio modulation");
                self.send_text(&format!("failed to change radio modulation: {err}"))
                    .await;
            }
        }
    }

    async fn send_joke(&mut self) {
        let joke = match self.config.jokes.choose(&mut rand::rng()) {
            Some(joke) => joke.clone(),
            None => {
                warn!("no jokes configured");
                self.send_text("no jokes configured").await;
                return;
            }
        };
        info!(%joke, "sending joke");
        self.send_text(&joke).await;
    }

    async fn send_text(&mut self, text: &str) {
        if !self.packets.send(text.as_bytes()).await {
            warn!("failed to transmit response");
        }
    }
}

#[cfg(test)]
mod tests;
