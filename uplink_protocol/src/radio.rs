// The radio collaborator. The protocol core never inspects physical-layer
// details; it only needs one `receive` to yield one whole frame.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

/// Half-duplex radio seen from the protocol layer.
#[async_trait]
pub trait Radio: Send {
    /// Blocks up to `timeout` waiting for a single inbound frame.
    async fn receive(&mut self, timeout: Duration) -> Option<Vec<u8>>;

    /// Transmits one frame. `false` means the hardware refused it.
    async fn send(&mut self, frame: &[u8]) -> bool;

    /// RSSI of the most recently received frame, in dBm.
    fn last_rssi(&self) -> i16;

    /// Largest frame the radio can move in one transmission.
    fn max_frame_size(&self) -> usize;
}

/// UDP stand-in for the radio link, one datagram per frame. Used on the
/// bench and by the ground station console; flight builds swap in the real
/// driver behind the same trait.
pub struct UdpRadio {
    tx: UdpSocket,
    rx: UdpSocket,
    max_frame_size: usize,
    last_rssi: i16,
}

impl UdpRadio {
    pub async fn connect(
        bind_addr: &str,
        peer_addr: &str,
        max_frame_size: usize,
    ) -> io::Result<Self> {
        let tx = UdpSocket::bind("0.0.0.0:0").await?;
        tx.connect(peer_addr).await?;
        let rx = UdpSocket::bind(bind_addr).await?;
        Ok(Self {
            tx,
            rx,
            max_frame_size,
            last_rssi: 0,
        })
    }
}

#[async_trait]
impl Radio for UdpRadio {
    async fn receive(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        let mut buf = vec![0u8; self.max_frame_size];
        match tokio::time::timeout(timeout, self.rx.recv_from(&mut buf)).await {
            Ok(Ok((n, _from))) => {
                // no physical link, report a plausible bench-level signal
                self.last_rssi = -70;
                buf.truncate(n);
                Some(buf)
            }
            Ok(Err(err)) => {
                debug!(%err, "radio receive error");
                None
            }
            Err(_elapsed) => None,
        }
    }

    async fn send(&mut self, frame: &[u8]) -> bool {
        self.tx.send(frame).await.is_ok()
    }

    fn last_rssi(&self) -> i16 {
        self.last_rssi
    }

    fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}
