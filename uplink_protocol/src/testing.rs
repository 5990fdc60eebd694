// Scripted test doubles shared by the workspace's test suites.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::frame;
use crate::radio::Radio;

#[derive(Default)]
struct FakeRadioState {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<Vec<u8>>,
    refuse_sends: bool,
}

/// Radio double with a scripted inbound queue and a captured outbound log.
/// Clones share state, so a test can keep a handle for inspection after
/// handing the radio to a `PacketManager`.
#[derive(Clone)]
pub struct FakeRadio {
    state: Arc<Mutex<FakeRadioState>>,
    rssi: i16,
    max_frame_size: usize,
}

impl FakeRadio {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeRadioState::default())),
            rssi: -70,
            max_frame_size,
        }
    }

    /// Queues one raw frame for the next `receive`.
    pub fn queue_frame(&self, frame: Vec<u8>) {
        self.state.lock().unwrap().inbound.push_back(frame);
    }

    /// Queues `payload` wrapped in a single (0, 1) frame.
    pub fn queue_payload(&self, payload: &[u8]) {
        let mut frame = 0u16.to_be_bytes().to_vec();
        frame.extend_from_slice(&1u16.to_be_bytes());
        frame.extend_from_slice(payload);
        self.queue_frame(frame);
    }

    /// Every frame transmitted so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().outbound.clone()
    }

    /// Transmitted frames with their headers stripped.
    pub fn sent_payloads(&self) -> Vec<Vec<u8>> {
        self.sent()
            .iter()
            .map(|f| frame::payload(f).to_vec())
            .collect()
    }

    /// Makes subsequent sends fail, as a refusing radio would.
    pub fn refuse_sends(&self) {
        self.state.lock().unwrap().refuse_sends = true;
    }
}

#[async_trait]
impl Radio for FakeRadio {
    async fn receive(&mut self, _timeout: Duration) -> Option<Vec<u8>> {
        self.state.lock().unwrap().inbound.pop_front()
    }

    async fn send(&mut self, frame: &[u8]) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.refuse_sends {
            return false;
        }
        state.outbound.push(frame.to_vec());
        true
    }

    fn last_rssi(&self) -> i16 {
        self.rssi
    }

    fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}
