//! Configuration loading: the typed option registry, the bracketed
//! `key : value` file format, and the resolved [`Settings`] the engine
//! consumes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;
use regex::Regex;

use crate::errors::SimError;
use crate::sched::SchedPolicy;
use crate::trace::LogMode;
use crate::types::TimeMs;

pub const CONFIG_HEADER: &str = "Start Simulator Configuration File";
pub const CONFIG_FOOTER: &str = "End Simulator Configuration File";

/// Value kinds an option can be registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Int,
    Double,
    Str,
}

#[derive(Debug, Clone)]
enum ConfigValue {
    Int(i64),
    Double(f64),
    Str(String),
}

#[derive(Debug, Clone)]
struct ConfigOption {
    kind: ConfigKind,
    value: Option<ConfigValue>,
}

/// Typed option registry with set/get by label.
///
/// Options must be registered before they can be set; setting from a
/// string coerces the value to the registered kind.
#[derive(Debug, Default)]
pub struct ConfigStore {
    options: HashMap<String, ConfigOption>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `label`. Returns false if it was already registered.
    pub fn add_option(&mut self, label: &str, kind: ConfigKind) -> bool {
        if self.options.contains_key(label) {
            return false;
        }
        self.options
            .insert(label.to_string(), ConfigOption { kind, value: None });
        true
    }

    fn option(&self, label: &str) -> Result<&ConfigOption, SimError> {
        self.options
            .get(label)
            .ok_or_else(|| SimError::ConfigValue(format!("unknown config option ({label})")))
    }

    fn option_mut(&mut self, label: &str) -> Result<&mut ConfigOption, SimError> {
        self.options
            .get_mut(label)
            .ok_or_else(|| SimError::ConfigValue(format!("unknown config option ({label})")))
    }

    /// Set an option from its string form, coerced to the registered kind.
    pub fn set_str(&mut self, label: &str, raw: &str) -> Result<(), SimError> {
        let option = self.option_mut(label)?;
        option.value = Some(match option.kind {
            ConfigKind::Int => ConfigValue::Int(raw.parse().map_err(|_| {
                SimError::ConfigValue(format!("invalid integer for config option ({label}): {raw}"))
            })?),
            ConfigKind::Double => ConfigValue::Double(raw.parse().map_err(|_| {
                SimError::ConfigValue(format!("invalid double for config option ({label}): {raw}"))
            })?),
            ConfigKind::Str => ConfigValue::Str(raw.to_string()),
        });
        Ok(())
    }

    pub fn set_int(&mut self, label: &str, value: i64) -> Result<(), SimError> {
        let option = self.option_mut(label)?;
        if option.kind != ConfigKind::Int {
            return Err(SimError::ConfigValue(format!(
                "config option has non-integer type ({label})"
            )));
        }
        option.value = Some(ConfigValue::Int(value));
        Ok(())
    }

    pub fn is_set(&self, label: &str) -> Result<bool, SimError> {
        Ok(self.option(label)?.value.is_some())
    }

    pub fn labels(&self) -> Vec<String> {
        self.options.keys().cloned().collect()
    }

    pub fn get_int(&self, label: &str) -> Result<i64, SimError> {
        match self.option(label)?.value {
            Some(ConfigValue::Int(v)) => Ok(v),
            Some(_) => Err(SimError::ConfigValue(format!(
                "config option has non-integer type ({label})"
            ))),
            None => Err(SimError::ConfigMissing(label.to_string())),
        }
    }

    pub fn get_double(&self, label: &str) -> Result<f64, SimError> {
        match self.option(label)?.value {
            Some(ConfigValue::Double(v)) => Ok(v),
            Some(_) => Err(SimError::ConfigValue(format!(
                "config option has non-double type ({label})"
            ))),
            None => Err(SimError::ConfigMissing(label.to_string())),
        }
    }

    /// String form of any option's value.
    pub fn get_str(&self, label: &str) -> Result<String, SimError> {
        match &self.option(label)?.value {
            Some(ConfigValue::Str(v)) => Ok(v.clone()),
            Some(ConfigValue::Int(v)) => Ok(v.to_string()),
            Some(ConfigValue::Double(v)) => Ok(v.to_string()),
            None => Err(SimError::ConfigMissing(label.to_string())),
        }
    }
}

/// Read the `key : value` pairs between the config header and footer, in
/// file order. Blank lines are skipped; anything else that does not parse
/// is an error.
pub fn read_config_file(path: &Path) -> Result<Vec<(String, String)>, SimError> {
    let text = fs::read_to_string(path).map_err(|source| SimError::ConfigIo {
        path: path.display().to_string(),
        source,
    })?;
    parse_config_lines(&text)
}

fn parse_config_lines(text: &str) -> Result<Vec<(String, String)>, SimError> {
    let line_re = Regex::new(r"^\s*([\S\t ]*?)\s*:\s*([\S\t ]+?)\s*$")
        .map_err(|e| SimError::ResourceInit(format!("config pattern failed to compile: {e}")))?;

    let mut lines = text.lines().map(str::trim);
    if !lines.any(|line| line == CONFIG_HEADER) {
        return Err(SimError::ConfigFormat("config header is missing".into()));
    }

    let mut pairs = Vec::new();
    for line in &mut lines {
        if line == CONFIG_FOOTER {
            return Ok(pairs);
        }
        if line.is_empty() {
            continue;
        }
        match line_re.captures(line) {
            Some(caps) => pairs.push((caps[1].to_string(), caps[2].to_string())),
            None => {
                return Err(SimError::ConfigFormat(format!(
                    "unable to parse config line: {line}"
                )))
            }
        }
    }
    Err(SimError::ConfigFormat("config footer is missing".into()))
}

/// Fully resolved configuration consumed by the engine.
#[derive(Debug, Clone)]
pub struct Settings {
    pub version: f64,
    pub metadata_path: String,
    pub log_mode: LogMode,
    pub log_file_path: String,
    pub scheduling: SchedPolicy,
    pub processor_cycle_ms: TimeMs,
    pub memory_cycle_ms: TimeMs,
    pub monitor_cycle_ms: TimeMs,
    pub hdd_cycle_ms: TimeMs,
    pub printer_cycle_ms: TimeMs,
    pub keyboard_cycle_ms: TimeMs,
    pub mouse_cycle_ms: TimeMs,
    pub speaker_cycle_ms: TimeMs,
    pub hdd_count: u32,
    pub printer_count: u32,
    pub speaker_count: u32,
    pub quantum_ms: TimeMs,
    pub block_size_kb: u64,
    pub system_memory_kb: u64,
    pub max_blocks: u64,
}

/// The full option registry, with the defaults the simulator ships.
fn registry() -> ConfigStore {
    let mut store = ConfigStore::new();
    store.add_option("Version/Phase", ConfigKind::Double);
    store.add_option("File Path", ConfigKind::Str);
    store.add_option("Processor cycle time (msec)", ConfigKind::Int);
    store.add_option("Monitor display time (msec)", ConfigKind::Int);
    store.add_option("Hard drive cycle time (msec)", ConfigKind::Int);
    store.add_option("Printer cycle time (msec)", ConfigKind::Int);
    store.add_option("Keyboard cycle time (msec)", ConfigKind::Int);
    store.add_option("Mouse cycle time (msec)", ConfigKind::Int);
    store.add_option("Speaker cycle time (msec)", ConfigKind::Int);
    store.add_option("Memory cycle time (msec)", ConfigKind::Int);
    store.add_option("Log", ConfigKind::Str);
    store.add_option("Log File Path", ConfigKind::Str);
    store.add_option("Printer quantity", ConfigKind::Int);
    store.add_option("Hard drive quantity", ConfigKind::Int);
    store.add_option("Speaker quantity", ConfigKind::Int);
    store.add_option("Quantum Number (msec)", ConfigKind::Int);
    store.add_option("Memory block size (kbytes)", ConfigKind::Int);
    store.add_option("System memory (kbytes)", ConfigKind::Int);
    store.add_option("System memory (Mbytes)", ConfigKind::Int);
    store.add_option("System memory (Gbytes)", ConfigKind::Int);
    store.add_option("CPU Scheduling Code", ConfigKind::Str);

    // Defaults; everything else must come from the file.
    let defaults = [
        ("Mouse cycle time (msec)", 1),
        ("Speaker cycle time (msec)", 1),
        ("Speaker quantity", 1),
        ("Hard drive quantity", 1),
        ("System memory (Mbytes)", 0),
        ("System memory (Gbytes)", 0),
    ];
    for (label, value) in defaults {
        // Labels are registered two lines up; this cannot fail.
        let _ = store.set_int(label, value);
    }
    store
}

impl Settings {
    /// Read and resolve a configuration file.
    pub fn load(path: &Path) -> Result<Self, SimError> {
        Self::from_pairs(&read_config_file(path)?)
    }

    /// Apply file pairs to the registry and validate the result.
    /// The first occurrence of a duplicated key wins.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, SimError> {
        let mut store = registry();

        let mut applied: Vec<&str> = Vec::new();
        for (key, value) in pairs {
            if applied.contains(&key.as_str()) {
                continue;
            }
            applied.push(key.as_str());
            store.set_str(key, value)?;

            // Larger memory units promote to kbytes as they are applied.
            if key == "System memory (Mbytes)" {
                let kb = store.get_int("System memory (Mbytes)")? * 10_000;
                store.set_int("System memory (kbytes)", kb)?;
            } else if key == "System memory (Gbytes)" {
                let kb = store.get_int("System memory (Gbytes)")? * 10_000_000;
                store.set_int("System memory (kbytes)", kb)?;
            }
        }

        let mut labels = store.labels();
        labels.sort();
        for label in &labels {
            if !store.is_set(label)? {
                return Err(SimError::ConfigMissing(label.clone()));
            }
        }

        let cycle_labels = [
            "Processor cycle time (msec)",
            "Monitor display time (msec)",
            "Hard drive cycle time (msec)",
            "Printer cycle time (msec)",
            "Keyboard cycle time (msec)",
            "Mouse cycle time (msec)",
            "Speaker cycle time (msec)",
            "Memory cycle time (msec)",
        ];
        for label in cycle_labels {
            if store.get_int(label)? < 1 {
                return Err(SimError::ConfigValue(format!(
                    "{label} must be at least 1"
                )));
            }
        }
        if store.get_int("System memory (kbytes)")? < 1 {
            return Err(SimError::ConfigValue(
                "System memory must be at least 1 kbytes".into(),
            ));
        }
        if store.get_int("Memory block size (kbytes)")? < 1 {
            return Err(SimError::ConfigValue(
                "Memory block size must be at least 1 kbytes".into(),
            ));
        }

        let sched_code = store.get_str("CPU Scheduling Code")?;
        let scheduling = SchedPolicy::from_code(&sched_code).ok_or_else(|| {
            SimError::ConfigValue(format!(
                "{sched_code:?} is an invalid scheduling code; possible codes are RR and SRTF"
            ))
        })?;

        let log_value = store.get_str("Log")?;
        let log_mode = LogMode::from_config(&log_value)
            .ok_or_else(|| SimError::ConfigValue(format!("Log config option is invalid: {log_value}")))?;

        let block_size_kb = store.get_int("Memory block size (kbytes)")? as u64;
        let system_memory_kb = store.get_int("System memory (kbytes)")? as u64;

        let settings = Settings {
            version: store.get_double("Version/Phase")?,
            metadata_path: store.get_str("File Path")?,
            log_mode,
            log_file_path: store.get_str("Log File Path")?,
            scheduling,
            processor_cycle_ms: store.get_int("Processor cycle time (msec)")? as TimeMs,
            memory_cycle_ms: store.get_int("Memory cycle time (msec)")? as TimeMs,
            monitor_cycle_ms: store.get_int("Monitor display time (msec)")? as TimeMs,
            hdd_cycle_ms: store.get_int("Hard drive cycle time (msec)")? as TimeMs,
            printer_cycle_ms: store.get_int("Printer cycle time (msec)")? as TimeMs,
            keyboard_cycle_ms: store.get_int("Keyboard cycle time (msec)")? as TimeMs,
            mouse_cycle_ms: store.get_int("Mouse cycle time (msec)")? as TimeMs,
            speaker_cycle_ms: store.get_int("Speaker cycle time (msec)")? as TimeMs,
            hdd_count: store.get_int("Hard drive quantity")?.max(0) as u32,
            printer_count: store.get_int("Printer quantity")?.max(0) as u32,
            speaker_count: store.get_int("Speaker quantity")?.max(0) as u32,
            quantum_ms: store.get_int("Quantum Number (msec)")?.max(0) as TimeMs,
            block_size_kb,
            system_memory_kb,
            max_blocks: system_memory_kb / block_size_kb,
        };
        debug!(
            "configuration resolved: {:?} scheduling, {} applications file",
            settings.scheduling, settings.metadata_path
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_pairs() -> Vec<(String, String)> {
        [
            ("Version/Phase", "2.0"),
            ("File Path", "programs.mdf"),
            ("Processor cycle time (msec)", "10"),
            ("Monitor display time (msec)", "20"),
            ("Hard drive cycle time (msec)", "15"),
            ("Printer cycle time (msec)", "25"),
            ("Keyboard cycle time (msec)", "50"),
            ("Memory cycle time (msec)", "30"),
            ("System memory (kbytes)", "2048"),
            ("Memory block size (kbytes)", "128"),
            ("Printer quantity", "2"),
            ("Quantum Number (msec)", "50"),
            ("Log", "Log to Monitor"),
            ("Log File Path", "logfile.lgf"),
            ("CPU Scheduling Code", "RR"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_store_coerces_by_registered_kind() {
        let mut store = ConfigStore::new();
        store.add_option("count", ConfigKind::Int);
        store.add_option("ratio", ConfigKind::Double);
        store.set_str("count", "42").unwrap();
        store.set_str("ratio", "2.5").unwrap();
        assert_eq!(store.get_int("count").unwrap(), 42);
        assert_eq!(store.get_double("ratio").unwrap(), 2.5);
        assert!(store.set_str("count", "forty-two").is_err());
    }

    #[test]
    fn test_store_rejects_unknown_labels() {
        let mut store = ConfigStore::new();
        assert!(store.set_str("nope", "1").is_err());
        assert!(store.is_set("nope").is_err());
    }

    #[test]
    fn test_config_line_grammar() {
        let text = format!(
            "{CONFIG_HEADER}\n  File Path : test.mdf  \n\nLog: Log to Both\n{CONFIG_FOOTER}\n"
        );
        let pairs = parse_config_lines(&text).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("File Path".to_string(), "test.mdf".to_string()),
                ("Log".to_string(), "Log to Both".to_string()),
            ]
        );
    }

    #[test]
    fn test_config_requires_header_and_footer() {
        assert!(matches!(
            parse_config_lines("File Path : x\n"),
            Err(SimError::ConfigFormat(_))
        ));
        assert!(matches!(
            parse_config_lines(&format!("{CONFIG_HEADER}\nFile Path : x\n")),
            Err(SimError::ConfigFormat(_))
        ));
    }

    #[test]
    fn test_malformed_config_line_rejected() {
        let text = format!("{CONFIG_HEADER}\nno separator here\n{CONFIG_FOOTER}\n");
        assert!(matches!(
            parse_config_lines(&text),
            Err(SimError::ConfigFormat(_))
        ));
    }

    #[test]
    fn test_settings_resolve() {
        let settings = Settings::from_pairs(&base_pairs()).unwrap();
        assert_eq!(settings.scheduling, SchedPolicy::RoundRobin);
        assert_eq!(settings.processor_cycle_ms, 10);
        assert_eq!(settings.mouse_cycle_ms, 1); // default
        assert_eq!(settings.hdd_count, 1); // default
        assert_eq!(settings.max_blocks, 16);
        assert_eq!(settings.log_mode, LogMode::Monitor);
    }

    #[test]
    fn test_missing_option_is_fatal() {
        let pairs: Vec<_> = base_pairs()
            .into_iter()
            .filter(|(k, _)| k != "Processor cycle time (msec)")
            .collect();
        let err = Settings::from_pairs(&pairs).unwrap_err();
        assert!(matches!(err, SimError::ConfigMissing(label)
            if label == "Processor cycle time (msec)"));
    }

    #[test]
    fn test_megabyte_promotion_multiplier() {
        let mut pairs: Vec<_> = base_pairs()
            .into_iter()
            .filter(|(k, _)| k != "System memory (kbytes)")
            .collect();
        pairs.push(("System memory (Mbytes)".into(), "8".into()));
        let settings = Settings::from_pairs(&pairs).unwrap();
        assert_eq!(settings.system_memory_kb, 80_000);
    }

    #[test]
    fn test_duplicate_key_first_wins() {
        let mut pairs = base_pairs();
        pairs.push(("Processor cycle time (msec)".into(), "99".into()));
        let settings = Settings::from_pairs(&pairs).unwrap();
        assert_eq!(settings.processor_cycle_ms, 10);
    }

    #[test]
    fn test_cycle_time_below_one_rejected() {
        let pairs: Vec<_> = base_pairs()
            .into_iter()
            .map(|(k, v)| {
                if k == "Memory cycle time (msec)" {
                    (k, "0".to_string())
                } else {
                    (k, v)
                }
            })
            .collect();
        assert!(matches!(
            Settings::from_pairs(&pairs),
            Err(SimError::ConfigValue(_))
        ));
    }

    #[test]
    fn test_unknown_scheduling_code_rejected() {
        let pairs: Vec<_> = base_pairs()
            .into_iter()
            .map(|(k, v)| {
                if k == "CPU Scheduling Code" {
                    (k, "FIFO".to_string())
                } else {
                    (k, v)
                }
            })
            .collect();
        assert!(matches!(
            Settings::from_pairs(&pairs),
            Err(SimError::ConfigValue(_))
        ));
    }
}
