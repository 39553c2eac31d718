//! Startup hot-plug detection.
//!
//! If a flash drive is already plugged in when the printer boots, the UI
//! offers "one-click print" of its newest file. The detection is a simple
//! window: a mass-storage mount within the first 3000 ms after USB init
//! raises the flag; a disconnect clears it. The flag is polled by UI code
//! from another task, so everything here is atomic.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::time::{Duration, Timestamp};

/// How long after USB init a mounted drive still counts as "was present at
/// boot".
pub const DETECT_WINDOW_MS: Duration = 3000;

/// Boot-window detector. A deadline of 0 means the window is closed.
pub struct StartupHotplug {
    deadline: AtomicU32,
    connected: AtomicBool,
}

impl StartupHotplug {
    pub const fn new() -> Self {
        Self {
            deadline: AtomicU32::new(0),
            connected: AtomicBool::new(false),
        }
    }

    /// Open the detection window. Call once, right after USB host init.
    pub fn init(&self, now: Timestamp) {
        self.deadline
            .store(now.wrapping_add(DETECT_WINDOW_MS), Ordering::Release);
    }

    /// Close the window once the counter has advanced past the deadline.
    /// Call from the host-stack user process on every notification; this is
    /// also what keeps a late wrap of the tick counter (every ~50 days) from
    /// reopening detection.
    pub fn poll(&self, now: Timestamp) {
        let deadline = self.deadline.load(Ordering::Acquire);
        if deadline > 0 && now >= deadline {
            self.deadline.store(0, Ordering::Release);
        }
    }

    /// Mass storage mounted. Raises the flag while the window is open.
    pub fn msc_mounted(&self, now: Timestamp) {
        let deadline = self.deadline.load(Ordering::Acquire);
        if deadline > 0 && now < deadline {
            self.connected.store(true, Ordering::Release);
        }
    }

    /// The drive disconnected; it no longer counts as present at boot.
    pub fn disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Whether a drive was present within the boot window (and still is).
    pub fn connected_at_startup(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Default for StartupHotplug {
    fn default() -> Self {
        Self::new()
    }
}
