//! USB host power-cycle supervisor.
//!
//! USB communication problems can occur at the physical layer (EMC
//! interference and the like). They surface either as an I/O error in the
//! mass-storage worker or as a port-disabled interrupt from the host
//! controller. The supervisor works around them by power-cycling the bus:
//!
//! ```text
//!  idle ──trigger──▶ (10 ms) ──▶ power_off ── (150 ms) ──▶ power_on
//!    ▲                              stop host     start host    │
//!    │◀── msc active + paused print: resume ◀──────────────────┤
//!    └──────────── (5000 ms) elapsed: raise USB error warning ◀─┘
//! ```
//!
//! If a print was paused by the storage error and the stick re-enumerates
//! within the 5-second window, the print is resumed automatically; if the
//! window expires the UI gets a flash-disk error warning instead.
//!
//! Triggers come from an ISR, from the storage worker task, and from the
//! main printer loop; the timer callback runs on the timer-service task.
//! All shared state is atomic and every operation takes `&self` — no locks
//! are held in any context. A trigger observed outside `idle` is dropped.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use log::{info, warn};

use crate::time::Duration;

/// Settle time between the trigger and stopping the host stack.
pub const SETTLE_MS: Duration = 10;
/// How long the bus stays powered off.
pub const POWER_OFF_MS: Duration = 150;
/// How long a re-enumerated stick gets to show up before the user is told.
pub const RECOVERY_WINDOW_MS: Duration = 5000;

/// Where the cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    PowerOff = 1,
    PowerOn = 2,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::PowerOff,
            2 => Self::PowerOn,
            _ => {
                debug_assert!(false, "invalid phase: {raw}");
                Self::Idle
            }
        }
    }
}

/// Start/stop surface of the USB host stack.
pub trait UsbHostPort {
    fn stop_host(&mut self);
    fn start_host(&mut self);
}

/// Print-continuity surface: resume a paused job, or tell the user the
/// drive is gone.
pub trait JobRecoveryPort {
    fn resume_print(&mut self);
    fn usb_error_warning(&mut self);
}

/// One re-armable one-shot timer driving the cycle. `arm` while armed
/// re-arms with the new period; both calls are safe from ISR context.
pub trait CycleTimer {
    fn arm(&self, after: Duration);
    fn stop(&self);
}

/// The supervisor itself. One per USB host controller.
pub struct PowerCycleSupervisor {
    phase: AtomicU8,
    /// Set by the media layer when the storage error paused the print;
    /// cleared at the moment of a successful resume.
    printing_paused: AtomicBool,
}

impl PowerCycleSupervisor {
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Idle as u8),
            printing_paused: AtomicBool::new(false),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn printing_paused(&self) -> bool {
        self.printing_paused.load(Ordering::Acquire)
    }

    /// I/O error reported by the mass-storage worker. Starts a cycle unless
    /// one is already running.
    pub fn io_error(&self, timer: &impl CycleTimer) {
        if self.phase() == Phase::Idle {
            warn!("usb msc io error, power-cycling the bus");
            timer.arm(SETTLE_MS);
        }
    }

    /// Port-disabled interrupt from the host controller. ISR context.
    pub fn port_disabled(&self, timer: &impl CycleTimer) {
        if self.phase() == Phase::Idle {
            timer.arm(SETTLE_MS);
        }
    }

    /// The media layer observed that the storage error paused the print.
    pub fn media_state_error(&self) {
        self.printing_paused.store(true, Ordering::Release);
    }

    /// Mass storage re-enumerated. If a cycle is in its recovery window and
    /// a print sits paused, cut the wait short and resume it.
    pub fn msc_active(&self, timer: &impl CycleTimer, jobs: &mut impl JobRecoveryPort) {
        if self.phase() == Phase::PowerOn && self.printing_paused.load(Ordering::Acquire) {
            self.printing_paused.store(false, Ordering::Release);
            timer.stop();
            self.set_phase(Phase::Idle);
            info!("usb recovered within the window, resuming print");
            jobs.resume_print();
        }
    }

    /// The cycle timer expired. Runs on the timer-service context.
    pub fn timer_fired(
        &self,
        timer: &impl CycleTimer,
        host: &mut impl UsbHostPort,
        jobs: &mut impl JobRecoveryPort,
    ) {
        match self.phase() {
            Phase::Idle => {
                self.set_phase(Phase::PowerOff);
                timer.arm(POWER_OFF_MS);
                host.stop_host();
            }
            Phase::PowerOff => {
                self.set_phase(Phase::PowerOn);
                timer.arm(RECOVERY_WINDOW_MS);
                host.start_host();
            }
            Phase::PowerOn => {
                self.set_phase(Phase::Idle);
                if self.printing_paused.load(Ordering::Acquire) {
                    warn!("usb did not recover, raising flash disk error");
                    jobs.usb_error_warning();
                }
            }
        }
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

impl Default for PowerCycleSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
