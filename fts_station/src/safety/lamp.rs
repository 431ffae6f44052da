//! Tower lamp state machine and actor.
//!
//! The lamp pattern must keep blinking after the request that set it has
//! long returned, so all channel writes happen on a dedicated, always-
//! running actor thread that exclusively owns the blink/beep timers.
//! Callers hand status changes over a channel and never run timers
//! inline. On each status message the actor cancels any active timers,
//! rewrites every channel for the new pattern, and re-arms timers for
//! blinking channels.
//!
//! Invariant: green is only ever turned off by the explicit `all_off`
//! shutdown request — every status pattern drives green on (or blinks
//! it), and rewriting all channels on a transition restores green to on
//! and red/yellow to off whenever a blink is cancelled.

use fts_common::config::LampPins;
use fts_common::links::DigitalIoLink;
use fts_common::status::SystemStatus;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Receiver wait when no timer is armed.
const IDLE_WAIT: Duration = Duration::from_secs(60);

/// Timer periods, injectable for tests.
#[derive(Debug, Clone, Copy)]
pub struct LampTiming {
    /// Full blink period (half on, half off).
    pub blink_period: Duration,
    /// Beeper pulse length.
    pub beep_pulse: Duration,
}

impl Default for LampTiming {
    fn default() -> Self {
        Self {
            blink_period: Duration::from_secs(2),
            beep_pulse: Duration::from_secs(1),
        }
    }
}

/// Static/blinking assignment of one lamp channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Off,
    On,
    BlinkSlow,
}

/// Beeper assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeepMode {
    Off,
    /// One pulse, then silent.
    Pulse,
    /// On until the next transition.
    Continuous,
}

/// Per-status output assignment for the three lamps and the beeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LampPattern {
    pub red: ChannelMode,
    pub yellow: ChannelMode,
    pub green: ChannelMode,
    pub beep: BeepMode,
}

impl LampPattern {
    /// The output table driving the lamp state machine.
    pub const fn for_status(status: SystemStatus) -> Self {
        use BeepMode as B;
        use ChannelMode as C;
        match status {
            SystemStatus::SystemIdle | SystemStatus::SystemRunning => Self {
                red: C::Off,
                yellow: C::Off,
                green: C::On,
                beep: B::Off,
            },
            SystemStatus::TestPass => Self {
                red: C::Off,
                yellow: C::Off,
                green: C::BlinkSlow,
                beep: B::Pulse,
            },
            SystemStatus::TestFail => Self {
                red: C::Off,
                yellow: C::BlinkSlow,
                green: C::On,
                beep: B::Pulse,
            },
            SystemStatus::SystemError => Self {
                red: C::BlinkSlow,
                yellow: C::Off,
                green: C::On,
                beep: B::Off,
            },
            SystemStatus::TestErrorCleared | SystemStatus::EmergencyCleared => Self {
                red: C::On,
                yellow: C::Off,
                green: C::On,
                beep: B::Off,
            },
            SystemStatus::EmergencyStop => Self {
                red: C::BlinkSlow,
                yellow: C::Off,
                green: C::On,
                beep: B::Continuous,
            },
            SystemStatus::SafetyViolation => Self {
                red: C::Off,
                yellow: C::BlinkSlow,
                green: C::On,
                beep: B::Off,
            },
            SystemStatus::SafetyCleared => Self {
                red: C::Off,
                yellow: C::On,
                green: C::On,
                beep: B::Off,
            },
        }
    }
}

enum LampRequest {
    SetStatus(SystemStatus),
    AllOff,
    Shutdown,
}

/// Handle to the lamp actor thread.
///
/// Cheap to call from any context; dropping the controller stops the
/// actor after it has drained pending requests.
pub struct TowerLampController {
    tx: Sender<LampRequest>,
    worker: Option<JoinHandle<()>>,
}

impl TowerLampController {
    /// Spawn the actor thread owning the lamp channels.
    pub fn spawn<D>(dio: Arc<D>, pins: LampPins, timing: LampTiming) -> Self
    where
        D: DigitalIoLink + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let worker = std::thread::spawn(move || {
            LampWorker {
                dio,
                pins,
                timing,
                rx,
                blink: None,
                beep_off_at: None,
            }
            .run()
        });
        Self {
            tx,
            worker: Some(worker),
        }
    }

    /// Request the output pattern for a system status.
    pub fn set_status(&self, status: SystemStatus) {
        if self.tx.send(LampRequest::SetStatus(status)).is_err() {
            warn!(%status, "lamp actor gone; status pattern dropped");
        }
    }

    /// Explicit shutdown pattern: every lamp and the beeper off.
    pub fn all_off(&self) {
        if self.tx.send(LampRequest::AllOff).is_err() {
            warn!("lamp actor gone; all-off dropped");
        }
    }

    /// Stop the actor after it drains pending requests.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.tx.send(LampRequest::Shutdown);
            if worker.join().is_err() {
                warn!("lamp actor panicked");
            }
        }
    }
}

impl Drop for TowerLampController {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Blink {
    pin: u8,
    lit: bool,
    next_toggle: Instant,
}

struct LampWorker<D> {
    dio: Arc<D>,
    pins: LampPins,
    timing: LampTiming,
    rx: Receiver<LampRequest>,
    blink: Option<Blink>,
    beep_off_at: Option<Instant>,
}

impl<D: DigitalIoLink> LampWorker<D> {
    fn run(mut self) {
        loop {
            let wait = self
                .next_deadline()
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_WAIT);
            match self.rx.recv_timeout(wait) {
                Ok(LampRequest::SetStatus(status)) => {
                    debug!(%status, "lamp pattern change");
                    self.apply(LampPattern::for_status(status));
                }
                Ok(LampRequest::AllOff) => self.all_off(),
                Ok(LampRequest::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => self.tick(Instant::now()),
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.blink.as_ref().map(|b| b.next_toggle), self.beep_off_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        }
    }

    /// Cancel active timers and rewrite every channel for the pattern.
    fn apply(&mut self, pattern: LampPattern) {
        self.blink = None;
        self.beep_off_at = None;
        let now = Instant::now();

        for (pin, mode) in [
            (self.pins.red, pattern.red),
            (self.pins.yellow, pattern.yellow),
            (self.pins.green, pattern.green),
        ] {
            match mode {
                ChannelMode::Off => self.write(pin, false),
                ChannelMode::On => self.write(pin, true),
                ChannelMode::BlinkSlow => {
                    // Blink starts in the lit half-period.
                    self.write(pin, true);
                    self.blink = Some(Blink {
                        pin,
                        lit: true,
                        next_toggle: now + self.timing.blink_period / 2,
                    });
                }
            }
        }

        match pattern.beep {
            BeepMode::Off => self.write(self.pins.beeper, false),
            BeepMode::Continuous => self.write(self.pins.beeper, true),
            BeepMode::Pulse => {
                self.write(self.pins.beeper, true);
                self.beep_off_at = Some(now + self.timing.beep_pulse);
            }
        }
    }

    fn tick(&mut self, now: Instant) {
        let mut toggled = None;
        if let Some(blink) = self.blink.as_mut() {
            if now >= blink.next_toggle {
                blink.lit = !blink.lit;
                blink.next_toggle += self.timing.blink_period / 2;
                toggled = Some((blink.pin, blink.lit));
            }
        }
        if let Some((pin, lit)) = toggled {
            self.write(pin, lit);
        }

        if let Some(at) = self.beep_off_at {
            if now >= at {
                self.write(self.pins.beeper, false);
                self.beep_off_at = None;
            }
        }
    }

    fn all_off(&mut self) {
        self.blink = None;
        self.beep_off_at = None;
        for pin in [
            self.pins.red,
            self.pins.yellow,
            self.pins.green,
            self.pins.beeper,
        ] {
            self.write(pin, false);
        }
    }

    fn write(&self, pin: u8, high: bool) {
        if let Err(err) = self.dio.write_output(pin, high) {
            warn!(pin, error = %err, "lamp channel write failed");
        }
    }
}
