use super::{CanBus, InputLine, OutputLine, SignalLines};
use crate::codec::CanFrame;
use crate::error::{ChademoError, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex as AsyncMutex, mpsc};

/// Loopback transceiver: frames injected by the test are received, frames
/// sent by the controller are recorded
pub struct MemoryBus {
    inbound_tx: mpsc::UnboundedSender<CanFrame>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<CanFrame>>,
    sent: Mutex<Vec<CanFrame>>,
    offline: AtomicBool,
}

impl MemoryBus {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            sent: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Queue a frame as if it arrived on the wire
    pub fn inject(&self, frame: CanFrame) {
        let _ = self.inbound_tx.send(frame);
    }

    /// Everything sent so far
    pub fn sent(&self) -> Vec<CanFrame> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Drain the sent log
    pub fn take_sent(&self) -> Vec<CanFrame> {
        self.sent
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }

    /// Make `send` fail, as a transceiver in bus-off would
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CanBus for MemoryBus {
    async fn send(&self, frame: CanFrame) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChademoError::bus(format!("bus offline, dropped {}", frame)));
        }
        self.sent
            .lock()
            .map_err(|_| ChademoError::bus("sent log poisoned"))?
            .push(frame);
        Ok(())
    }

    async fn recv(&self) -> Result<CanFrame> {
        self.inbound_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| ChademoError::bus("inbound queue closed"))
    }
}

/// Digital lines held in memory; input changes are reported as edges
pub struct MemoryLines {
    inputs: Mutex<HashMap<InputLine, bool>>,
    writes: Mutex<Vec<(OutputLine, bool)>>,
    edge_tx: mpsc::UnboundedSender<(InputLine, bool)>,
    edge_rx: AsyncMutex<mpsc::UnboundedReceiver<(InputLine, bool)>>,
}

impl MemoryLines {
    pub fn new() -> Self {
        let (edge_tx, edge_rx) = mpsc::unbounded_channel();
        Self {
            inputs: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            edge_tx,
            edge_rx: AsyncMutex::new(edge_rx),
        }
    }

    /// Set an input level without raising an edge (power-on state)
    pub fn preset(&self, line: InputLine, active: bool) {
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.insert(line, active);
        }
    }

    /// Change an input; raises an edge when the level actually moves
    pub fn set_input(&self, line: InputLine, active: bool) {
        let changed = self
            .inputs
            .lock()
            .map(|mut inputs| inputs.insert(line, active) != Some(active))
            .unwrap_or(false);
        if changed {
            let _ = self.edge_tx.send((line, active));
        }
    }

    /// Last level written to an output (false if never written)
    pub fn output(&self, line: OutputLine) -> bool {
        self.writes
            .lock()
            .ok()
            .and_then(|w| w.iter().rev().find(|(l, _)| *l == line).map(|(_, v)| *v))
            .unwrap_or(false)
    }

    /// Every write in order
    pub fn writes(&self) -> Vec<(OutputLine, bool)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl Default for MemoryLines {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SignalLines for MemoryLines {
    fn read(&self, line: InputLine) -> Result<bool> {
        self.inputs
            .lock()
            .map(|inputs| inputs.get(&line).copied().unwrap_or(false))
            .map_err(|_| ChademoError::signal("input table poisoned"))
    }

    fn write(&self, line: OutputLine, active: bool) -> Result<()> {
        self.writes
            .lock()
            .map_err(|_| ChademoError::signal("output log poisoned"))?
            .push((line, active));
        Ok(())
    }

    async fn next_edge(&self) -> Result<(InputLine, bool)> {
        self.edge_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| ChademoError::signal("edge queue closed"))
    }
}
