//! Shared fixtures for end-to-end simulator tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use osim::metadata::{METADATA_FOOTER, METADATA_HEADER};

/// Full simulations spin several busy-wait threads; running them
/// concurrently makes their timing meaningless. Every end-to-end test
/// holds this lock for its whole run.
pub fn sim_lock() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Temp directory that cleans itself up on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

pub fn make_temp_dir(prefix: &str) -> io::Result<TempDir> {
    let mut path = std::env::temp_dir();
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    path.push(format!("{}_{}_{}", prefix, std::process::id(), stamp));
    fs::create_dir(&path)?;
    Ok(TempDir { path })
}

pub fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture file");
    path
}

/// Render a configuration file for the given metadata and log paths, with
/// sane defaults overridable per test.
pub fn render_config(metadata: &Path, log_file: &Path, overrides: &[(&str, &str)]) -> String {
    let metadata = metadata.display().to_string();
    let log_file = log_file.display().to_string();
    let defaults: &[(&str, &str)] = &[
        ("Version/Phase", "1.0"),
        ("File Path", &metadata),
        ("Processor cycle time (msec)", "10"),
        ("Monitor display time (msec)", "1"),
        ("Hard drive cycle time (msec)", "1"),
        ("Printer cycle time (msec)", "1"),
        ("Keyboard cycle time (msec)", "1"),
        ("Mouse cycle time (msec)", "1"),
        ("Speaker cycle time (msec)", "1"),
        ("Memory cycle time (msec)", "1"),
        ("System memory (kbytes)", "8"),
        ("Memory block size (kbytes)", "1"),
        ("Printer quantity", "1"),
        ("Hard drive quantity", "1"),
        ("Speaker quantity", "1"),
        ("Quantum Number (msec)", "50"),
        ("Log", "Log to File"),
        ("Log File Path", &log_file),
        ("CPU Scheduling Code", "RR"),
    ];

    let mut text = String::from("Start Simulator Configuration File\n");
    for &(key, default_value) in defaults {
        let value = overrides
            .iter()
            .find(|(k, _)| *k == key)
            .map(|&(_, v)| v)
            .unwrap_or(default_value);
        text.push_str(&format!("{key}: {value}\n"));
    }
    text.push_str("End Simulator Configuration File\n");
    text
}

/// Wrap an event stream in the metadata file markers.
pub fn render_metadata(body: &str) -> String {
    format!("{METADATA_HEADER}\n{body}\n{METADATA_FOOTER}\n")
}

/// Timestamp of a log line, in seconds.
pub fn stamp(line: &str) -> f64 {
    line.split_once(" - ")
        .expect("log line has a timestamp")
        .0
        .parse()
        .expect("timestamp parses")
}

/// Message part of a log line.
pub fn message(line: &str) -> &str {
    line.split_once(" - ").expect("log line has a timestamp").1
}

/// Whether a log line is about the given process.
pub fn mentions_pid(line: &str, pid: u32) -> bool {
    let msg = message(line);
    msg.starts_with(&format!("Process {pid}:"))
        || msg == format!("Process {pid} completed")
        || msg.ends_with(&format!("process {pid}"))
}
