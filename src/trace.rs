//! The simulation log sink.
//!
//! Every scheduling and resource event the simulator emits goes through
//! one serialized sink as a line timestamped with seconds since simulation
//! start. The chronological log is the simulator's product, so lines are
//! flushed as they are written.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::sync::Mutex;

use crate::clock::SimClock;
use crate::errors::SimError;

/// Where simulation log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Both,
    File,
    Monitor,
}

impl LogMode {
    /// Parse the `Log` config value, case-insensitively.
    pub fn from_config(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "log to both" => Some(LogMode::Both),
            "log to file" => Some(LogMode::File),
            "log to monitor" => Some(LogMode::Monitor),
            _ => None,
        }
    }
}

/// Serialized sink holding the simulation clock.
///
/// Resources keep a shared handle to this so they can stamp and emit lines
/// without reaching back into the engine.
#[derive(Debug)]
pub struct TraceSink {
    clock: SimClock,
    to_monitor: bool,
    file: Mutex<Option<File>>,
}

impl TraceSink {
    /// Build the sink, opening (and truncating) the log file when the mode
    /// asks for one.
    pub fn new(mode: LogMode, log_file_path: &str) -> Result<Self, SimError> {
        let file = match mode {
            LogMode::Both | LogMode::File => {
                Some(File::create(log_file_path).map_err(|source| SimError::ConfigIo {
                    path: log_file_path.to_string(),
                    source,
                })?)
            }
            LogMode::Monitor => None,
        };
        Ok(TraceSink {
            clock: SimClock::new(),
            to_monitor: matches!(mode, LogMode::Both | LogMode::Monitor),
            file: Mutex::new(file),
        })
    }

    /// Rebase the simulation clock to now.
    pub fn reset_clock(&self) {
        self.clock.reset();
    }

    /// Seconds since simulation start.
    pub fn seconds(&self) -> f64 {
        self.clock.seconds()
    }

    /// Emit one timestamped log line. Best effort: write failures after
    /// startup are ignored rather than taking the simulation down.
    pub fn line(&self, msg: fmt::Arguments<'_>) {
        let mut file = self.file.lock().unwrap();
        let text = format!("{:.6} - {}\n", self.clock.seconds(), msg);
        if self.to_monitor {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
        if let Some(file) = file.as_mut() {
            let _ = file.write_all(text.as_bytes());
            let _ = file.flush();
        }
    }
}
