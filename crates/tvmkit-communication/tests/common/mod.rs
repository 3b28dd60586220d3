#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tvmkit_communication::firmware::tvm920::command_creator::OP_STATUS;
use tvmkit_communication::firmware::tvm920::status_parser::StatusBuilder;
use tvmkit_communication::{
    HomingConfig, Link, LinkTiming, MotionController, MotionTiming, SimulatedConfig,
    SimulatedHandle, SimulatedTransport, TickChannel, Transport,
};
use tvmkit_core::{CalibrationConstants, ConnectionError, HeadIndex, MachineLimits};

pub type Sent = Arc<Mutex<Vec<Vec<u8>>>>;

/// Answers every status request with the same stopped status and echoes
/// everything else, recording what was sent
pub struct ScriptedTransport {
    status: Vec<u8>,
    sent: Sent,
    pending: Option<Vec<u8>>,
}

impl ScriptedTransport {
    pub fn new(status: Vec<u8>) -> (Self, Sent) {
        let sent = Sent::default();
        (
            Self {
                status,
                sent: sent.clone(),
                pending: None,
            },
            sent,
        )
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, datagram: &[u8]) -> Result<(), ConnectionError> {
        self.sent.lock().push(datagram.to_vec());
        self.pending = Some(if datagram.first() == Some(&OP_STATUS) {
            self.status.clone()
        } else {
            datagram.to_vec()
        });
        Ok(())
    }

    fn receive(&mut self, _timeout: Duration) -> Result<Vec<u8>, ConnectionError> {
        self.pending
            .take()
            .ok_or(ConnectionError::Timeout { timeout_ms: 1 })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn fast_timing() -> MotionTiming {
    MotionTiming {
        poll_interval: Duration::ZERO,
        motion_timeout: Duration::from_secs(5),
        init_step: Duration::ZERO,
        init_pause: Duration::ZERO,
    }
}

pub fn fast_homing() -> HomingConfig {
    HomingConfig {
        walk_settle: Duration::ZERO,
        ..HomingConfig::default()
    }
}

pub fn link(transport: impl Transport + 'static) -> Arc<Link> {
    Arc::new(Link::new(
        Box::new(transport),
        LinkTiming::immediate(Duration::from_millis(1)),
    ))
}

/// Controller over a transport that always reports `x_ticks` and stopped
pub fn scripted_controller(x_ticks: i32) -> (MotionController, Sent) {
    let status = StatusBuilder::new(64).ticks(TickChannel::X, x_ticks).build();
    let (transport, sent) = ScriptedTransport::new(status);
    let controller = MotionController::new(
        link(transport),
        CalibrationConstants::default(),
        MachineLimits::default(),
    )
    .with_timing(fast_timing());
    (controller, sent)
}

/// Controller over the emulated machine
pub fn simulated_controller(config: SimulatedConfig) -> (MotionController, SimulatedHandle) {
    let transport = SimulatedTransport::new(config);
    let handle = transport.handle();
    let controller = MotionController::new(
        link(transport),
        CalibrationConstants::default(),
        MachineLimits::default(),
    )
    .with_timing(fast_timing())
    .with_homing(fast_homing());
    (controller, handle)
}

pub fn head(index: usize) -> HeadIndex {
    HeadIndex::new(index).unwrap()
}
