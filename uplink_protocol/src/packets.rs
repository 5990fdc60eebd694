// Application payloads in and out of the radio: outbound data is fragmented
// into paced, sequence-numbered frames; inbound data arrives as one whole
// frame per message.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::frame::{self, HEADER_SIZE};
use crate::radio::Radio;
use crate::ACK;

/// Log a progress line every this many frames on long downlinks.
const PROGRESS_INTERVAL: usize = 16;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("max frame size {0} leaves no room for the {HEADER_SIZE}-byte header")]
    FrameSizeTooSmall(usize),
}

/// Fragmenting sender and single-frame listener over a [`Radio`].
pub struct PacketManager<R: Radio> {
    radio: R,
    license: String,
    send_delay: Duration,
    max_frame_size: usize,
}

impl<R: Radio> PacketManager<R> {
    /// `license` is the operator callsign; transmission is refused while it
    /// is empty. `send_delay` paces consecutive frames on the half-duplex
    /// link.
    pub fn new(radio: R, license: impl Into<String>, send_delay: Duration) -> Result<Self, PacketError> {
        let max_frame_size = radio.max_frame_size();
        if max_frame_size <= HEADER_SIZE {
            return Err(PacketError::FrameSizeTooSmall(max_frame_size));
        }
        Ok(Self {
            radio,
            license: license.into(),
            send_delay,
            max_frame_size,
        })
    }

    /// Fragments `data` and transmits the frames in order. No per-frame
    /// acknowledgement or retry; reliability, if any, is the caller's.
    pub async fn send(&mut self, data: &[u8]) -> bool {
        if self.license.is_empty() {
            warn!("license is required to send data");
            return false;
        }

        let frames = frame::fragment(data, self.max_frame_size);
        let total = frames.len();
        debug!(num_frames = total, data_len = data.len(), "sending frames");

        for (seq, f) in frames.iter().enumerate() {
            if !self.radio.send(f).await {
                warn!(seq, total, "radio refused frame");
                return false;
            }
            if total > 1 {
                if seq > 0 && seq % PROGRESS_INTERVAL == 0 {
                    debug!(seq, total, "downlink progress");
                }
                tokio::time::sleep(self.send_delay).await;
            }
        }

        debug!(num_frames = total, "sent all frames");
        true
    }

    /// Waits up to `timeout` for one whole application payload.
    ///
    /// Inbound reassembly is not implemented: commands must fit one frame.
    /// A header announcing more frames is logged and only the payload of
    /// frame 0 is returned; a stray continuation frame is dropped.
    pub async fn listen(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        let raw = self.radio.receive(timeout).await?;

        let Some((seq, total)) = frame::parse_header(&raw) else {
            warn!(len = raw.len(), "runt frame received");
            return None;
        };
        if seq != 0 || total == 0 {
            warn!(seq, total, "stray continuation frame dropped");
            return None;
        }
        if total > 1 {
            warn!(total, "multi-frame message received; reassembly is not supported");
        }

        Some(frame::payload(&raw).to_vec())
    }

    /// Raw acknowledgement frame, best effort.
    pub async fn send_acknowledgement(&mut self) {
        if !self.send(ACK).await {
            warn!("failed to send acknowledgement");
        }
    }

    pub fn last_rssi(&self) -> i16 {
        self.radio.last_rssi()
    }
}
