//! Single-consumer dispatcher
//!
//! Frame pollers and the edge monitor only forward raw stimuli; the run loop
//! is the one place the controller is touched. Each stimulus is handled to
//! completion, its actions applied in order, and a fresh snapshot published
//! before the next one is taken off the queue.

use crate::codec::{Bus, CanFrame};
use crate::config::Config;
use crate::controller::{Action, ChargeController, ControllerSnapshot};
use crate::error::Result;
use crate::hal::{CanBus, InputLine, OutputLine, SignalLines};
use crate::liveness::Peer;
use crate::logging::{LogContext, StructuredLogger, get_logger, get_logger_with_context};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

mod timer;

pub use timer::PeriodicTimer;

/// The I/O the runtime drives
#[derive(Clone)]
pub struct Hardware {
    /// Transceiver on the CHAdeMO link
    pub chademo_bus: Arc<dyn CanBus>,
    /// Transceiver on the vehicle bus the BMS talks on
    pub main_bus: Arc<dyn CanBus>,
    pub lines: Arc<dyn SignalLines>,
}

/// Raw input forwarded by a producer task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stimulus {
    Frame { bus: Bus, frame: CanFrame },
    Line { line: InputLine, active: bool },
}

pub struct ChargeRuntime {
    controller: ChargeController,
    hardware: Hardware,
    stimulus_tx: mpsc::UnboundedSender<Stimulus>,
    stimulus_rx: mpsc::UnboundedReceiver<Stimulus>,
    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
    snapshot_tx: watch::Sender<Arc<ControllerSnapshot>>,
    outbound: PeriodicTimer,
    bms_check: PeriodicTimer,
    station_check: PeriodicTimer,
    logger: StructuredLogger,
}

/// Monotonic time that follows tokio's clock (paused in tests)
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

impl ChargeRuntime {
    pub fn new(config: Config, hardware: Hardware) -> Self {
        let outbound = PeriodicTimer::new(Duration::from_millis(config.protocol.outbound_period_ms));
        let check_period = Duration::from_millis(config.liveness.check_period_ms);
        let controller = ChargeController::new(config, now());

        let (stimulus_tx, stimulus_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(Arc::new(controller.snapshot()));

        Self {
            controller,
            hardware,
            stimulus_tx,
            stimulus_rx,
            shutdown_tx,
            shutdown_rx,
            snapshot_tx,
            outbound,
            bms_check: PeriodicTimer::new(check_period),
            station_check: PeriodicTimer::new(check_period),
            logger: get_logger("runtime"),
        }
    }

    /// Snapshots published after every handled stimulus
    pub fn subscribe(&self) -> watch::Receiver<Arc<ControllerSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Send `()` to stop the run loop
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<()> {
        self.shutdown_tx.clone()
    }

    /// Extra producer handle, e.g. for a bench console
    pub fn stimulus_handle(&self) -> mpsc::UnboundedSender<Stimulus> {
        self.stimulus_tx.clone()
    }

    /// Run until a shutdown request; both outputs are low on return
    pub async fn run(mut self) -> Result<()> {
        self.logger.info(&format!(
            "Starting charge controller {}",
            env!("APP_VERSION")
        ));

        // Known-safe outputs before anything else happens
        self.write_output(OutputLine::ChargeEnable, false);
        self.write_output(OutputLine::ContactorPermit, false);

        let producers = self.spawn_producers();

        for line in [InputLine::PlugDetect, InputLine::ChargeInhibit] {
            match self.hardware.lines.read(line) {
                Ok(true) => {
                    let _ = self.stimulus_tx.send(Stimulus::Line { line, active: true });
                }
                Ok(false) => {}
                Err(e) => self
                    .logger
                    .error(&format!("Failed to sample {} at start: {}", line, e)),
            }
        }

        self.bms_check.start();
        self.publish();

        loop {
            tokio::select! {
                Some(stimulus) = self.stimulus_rx.recv() => {
                    let now = now();
                    let actions = match stimulus {
                        Stimulus::Frame { bus, frame } => self.controller.on_frame(bus, &frame, now),
                        Stimulus::Line { line, active } => self.controller.on_line(line, active, now),
                    };
                    self.apply(actions);
                    self.publish();
                }
                _ = self.outbound.tick() => {
                    self.transmit().await;
                }
                _ = self.bms_check.tick() => {
                    let actions = self.controller.check_liveness(Peer::Bms, now());
                    self.apply(actions);
                    self.publish();
                }
                _ = self.station_check.tick() => {
                    let actions = self.controller.check_liveness(Peer::Station, now());
                    self.apply(actions);
                    self.publish();
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        for task in producers {
            task.abort();
        }
        self.outbound.stop();
        self.station_check.stop();
        self.bms_check.stop();
        self.write_output(OutputLine::ChargeEnable, false);
        self.write_output(OutputLine::ContactorPermit, false);
        self.logger.info("Charge controller stopped, outputs low");
        Ok(())
    }

    fn spawn_producers(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        for (bus, handle) in [
            (Bus::Chademo, self.hardware.chademo_bus.clone()),
            (Bus::Main, self.hardware.main_bus.clone()),
        ] {
            let tx = self.stimulus_tx.clone();
            let logger = get_logger_with_context(LogContext::new("poller").with_bus(&bus.to_string()));
            tasks.push(tokio::spawn(async move {
                loop {
                    match handle.recv().await {
                        Ok(frame) => {
                            if tx.send(Stimulus::Frame { bus, frame }).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            // Silence from here on is caught by liveness supervision
                            logger.error(&format!("Receive failed, poller stopping: {}", e));
                            break;
                        }
                    }
                }
            }));
        }

        let lines = self.hardware.lines.clone();
        let tx = self.stimulus_tx.clone();
        let logger = get_logger("edges");
        tasks.push(tokio::spawn(async move {
            loop {
                match lines.next_edge().await {
                    Ok((line, active)) => {
                        if tx.send(Stimulus::Line { line, active }).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        logger.error(&format!("Edge monitor stopping: {}", e));
                        break;
                    }
                }
            }
        }));

        tasks
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::SetOutput(line, active) => self.write_output(line, active),
                Action::StartTransmission => self.outbound.start(),
                Action::StopTransmission => self.outbound.stop(),
                Action::StartStationLiveness => self.station_check.start(),
                Action::StopStationLiveness => self.station_check.stop(),
            }
        }
    }

    fn write_output(&self, line: OutputLine, active: bool) {
        if let Err(e) = self.hardware.lines.write(line, active) {
            self.logger
                .error(&format!("Failed to drive {} {}: {}", line, active, e));
        }
    }

    async fn transmit(&self) {
        for frame in self.controller.outbound_frames() {
            if let Err(e) = self.hardware.chademo_bus.send(frame).await {
                self.logger.warn(&format!("Failed to send {}: {}", frame, e));
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx
            .send_replace(Arc::new(self.controller.snapshot()));
    }
}
