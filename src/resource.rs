//! Simulated I/O device inventory and arbitration.
//!
//! Six device classes share one non-blocking `try_run` contract with two
//! arbitration flavors: counted pools (hard drives, printers, speakers)
//! and exclusive devices (monitor, keyboard, mouse). A successful
//! acquisition launches a fire-and-forget worker thread that spins for the
//! transfer time, flips the process WAITING -> READY, logs the end line,
//! and only then releases the device slot, so the configured quantity
//! bounds the number of transfers in flight.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use log::debug;

use crate::clock::spin_for_ms;
use crate::config::Settings;
use crate::errors::SimError;
use crate::process::{Pcb, ProcState};
use crate::trace::TraceSink;
use crate::types::TimeMs;

/// Transfer direction for a device operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// The six simulated device classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    HardDrive,
    Printer,
    Speaker,
    Monitor,
    Keyboard,
    Mouse,
}

impl DeviceKind {
    /// Device label as it appears in log lines.
    fn label(self, direction: Direction, dev_id: u32) -> String {
        match self {
            DeviceKind::HardDrive => match direction {
                Direction::Input => format!("hard drive input on HDD {dev_id}"),
                Direction::Output => format!("hard drive output on HDD {dev_id}"),
            },
            DeviceKind::Printer => format!("printer output on PRNTR {dev_id}"),
            DeviceKind::Speaker => format!("speaker output on SPKR {dev_id}"),
            DeviceKind::Monitor => "monitor output".to_string(),
            DeviceKind::Keyboard => "keyboard input".to_string(),
            DeviceKind::Mouse => "mouse input".to_string(),
        }
    }
}

/// Non-blocking counting semaphore over an atomic permit counter.
#[derive(Debug)]
struct TrySemaphore {
    permits: AtomicU32,
}

impl TrySemaphore {
    fn new(count: u32) -> Self {
        TrySemaphore {
            permits: AtomicU32::new(count),
        }
    }

    /// Take a permit if one is available.
    fn try_acquire(&self) -> bool {
        self.permits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| p.checked_sub(1))
            .is_ok()
    }

    fn release(&self) {
        self.permits.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Debug)]
enum Arbitration {
    /// Permit-counted pool with a round-robin device cursor.
    Counted {
        permits: TrySemaphore,
        cursor: Mutex<u32>,
        count: u32,
    },
    /// Single device; at most one transfer in flight. An atomic flag
    /// rather than a mutex because the worker thread, not the acquiring
    /// thread, releases it.
    Exclusive { busy: AtomicBool },
}

/// One simulated device class.
#[derive(Debug)]
pub struct Device {
    kind: DeviceKind,
    cycle_ms: TimeMs,
    sink: Arc<TraceSink>,
    arb: Arbitration,
}

impl Device {
    pub fn counted(
        kind: DeviceKind,
        count: u32,
        cycle_ms: TimeMs,
        sink: Arc<TraceSink>,
    ) -> Arc<Self> {
        Arc::new(Device {
            kind,
            cycle_ms,
            sink,
            arb: Arbitration::Counted {
                permits: TrySemaphore::new(count),
                cursor: Mutex::new(0),
                count,
            },
        })
    }

    pub fn exclusive(kind: DeviceKind, cycle_ms: TimeMs, sink: Arc<TraceSink>) -> Arc<Self> {
        Arc::new(Device {
            kind,
            cycle_ms,
            sink,
            arb: Arbitration::Exclusive {
                busy: AtomicBool::new(false),
            },
        })
    }

    /// Try to start `cycles` of work for `pcb` on this device class.
    ///
    /// Non-blocking: returns Ok(false) when no device slot is free. On
    /// success the process is parked WAITING before the worker launches,
    /// so even an instant transfer observes the state it must flip.
    pub fn try_run(
        self: &Arc<Self>,
        cycles: i64,
        direction: Direction,
        pcb: &Arc<Pcb>,
    ) -> Result<bool, SimError> {
        let dev_id = match &self.arb {
            Arbitration::Counted {
                permits,
                cursor,
                count,
            } => {
                if !permits.try_acquire() {
                    return Ok(false);
                }
                let mut cursor = cursor.lock().unwrap();
                let id = *cursor;
                *cursor = (*cursor + 1) % *count;
                id
            }
            Arbitration::Exclusive { busy } => {
                if busy
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    return Ok(false);
                }
                0
            }
        };

        pcb.state.store(ProcState::Waiting);
        self.launch(cycles, pcb, self.kind.label(direction, dev_id))?;
        Ok(true)
    }

    /// Log the start line and spawn the transfer worker.
    fn launch(self: &Arc<Self>, cycles: i64, pcb: &Arc<Pcb>, label: String) -> Result<(), SimError> {
        let ms = cycles as TimeMs * self.cycle_ms;
        self.sink
            .line(format_args!("Process {}: start {}", pcb.pid, label));

        let device = Arc::clone(self);
        let pcb = Arc::clone(pcb);
        thread::Builder::new()
            .name(format!("io-{}", pcb.pid))
            .spawn(move || device.worker(ms, pcb, label))
            .map_err(|e| SimError::ResourceInit(format!("unable to create io thread: {e}")))?;
        Ok(())
    }

    fn worker(&self, ms: TimeMs, pcb: Arc<Pcb>, label: String) {
        spin_for_ms(ms);

        if pcb.state.load() == ProcState::Waiting {
            pcb.state.store(ProcState::Ready);
        }
        self.sink
            .line(format_args!("Process {}: end {}", pcb.pid, label));
        debug!("io complete for process {}: {label}", pcb.pid);

        // Release only after the end line is on the log, so unmatched
        // start lines never exceed the configured quantity.
        match &self.arb {
            Arbitration::Counted { permits, .. } => permits.release(),
            Arbitration::Exclusive { busy } => busy.store(false, Ordering::Release),
        }
    }
}

/// The fixed inventory of six device classes.
#[derive(Debug)]
pub struct ResourceInventory {
    hdd: Arc<Device>,
    printer: Arc<Device>,
    speaker: Arc<Device>,
    monitor: Arc<Device>,
    keyboard: Arc<Device>,
    mouse: Arc<Device>,
}

impl ResourceInventory {
    pub fn new(settings: &Settings, sink: Arc<TraceSink>) -> Self {
        ResourceInventory {
            hdd: Device::counted(
                DeviceKind::HardDrive,
                settings.hdd_count,
                settings.hdd_cycle_ms,
                Arc::clone(&sink),
            ),
            printer: Device::counted(
                DeviceKind::Printer,
                settings.printer_count,
                settings.printer_cycle_ms,
                Arc::clone(&sink),
            ),
            speaker: Device::counted(
                DeviceKind::Speaker,
                settings.speaker_count,
                settings.speaker_cycle_ms,
                Arc::clone(&sink),
            ),
            monitor: Device::exclusive(
                DeviceKind::Monitor,
                settings.monitor_cycle_ms,
                Arc::clone(&sink),
            ),
            keyboard: Device::exclusive(
                DeviceKind::Keyboard,
                settings.keyboard_cycle_ms,
                Arc::clone(&sink),
            ),
            mouse: Device::exclusive(DeviceKind::Mouse, settings.mouse_cycle_ms, sink),
        }
    }

    /// Look up the device class handling a metadata descriptor.
    pub fn for_descriptor(&self, descriptor: &str) -> Option<&Arc<Device>> {
        match descriptor {
            "hard drive" => Some(&self.hdd),
            "printer" => Some(&self.printer),
            "speaker" => Some(&self.speaker),
            "monitor" => Some(&self.monitor),
            "keyboard" => Some(&self.keyboard),
            "mouse" => Some(&self.mouse),
            _ => None,
        }
    }
}
