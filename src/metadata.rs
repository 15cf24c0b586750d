//! Program metadata parsing.
//!
//! The metadata file describes programs as a stream of events. Structural
//! markers open and close the OS span (`S`) and application spans (`A`);
//! the events between an application's markers become one [`Application`],
//! which the job loader later copies into each process it creates.
//!
//! Stream invariants enforced here: exactly one top-level OS span,
//! application spans may not nest, work events appear only inside an
//! application span, and the stream ends with a period terminator.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use regex::Regex;

use crate::errors::SimError;

pub const METADATA_HEADER: &str = "Start Program Meta-Data Code:";
pub const METADATA_FOOTER: &str = "End Program Meta-Data Code.";

/// Event codes admitted by the metadata grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    /// `S`: OS span marker.
    System,
    /// `A`: application span marker.
    App,
    /// `P`: processor work.
    Compute,
    /// `I`: input on a device.
    Input,
    /// `O`: output on a device.
    Output,
    /// `M`: memory work.
    Memory,
}

impl EventCode {
    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'S' => Some(EventCode::System),
            'A' => Some(EventCode::App),
            'P' => Some(EventCode::Compute),
            'I' => Some(EventCode::Input),
            'O' => Some(EventCode::Output),
            'M' => Some(EventCode::Memory),
            _ => None,
        }
    }

    /// Descriptors this code admits.
    fn valid_descriptor(self, descriptor: &str) -> bool {
        let admitted: &[&str] = match self {
            EventCode::System | EventCode::App => &["start", "end"],
            EventCode::Compute => &["run"],
            EventCode::Input => &["hard drive", "keyboard", "mouse"],
            EventCode::Output => &["hard drive", "monitor", "speaker", "printer"],
            EventCode::Memory => &["block", "allocate"],
        };
        admitted.contains(&descriptor)
    }
}

/// A unit of simulated work from the metadata stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimEvent {
    pub code: EventCode,
    pub descriptor: String,
    pub cycles: i64,
}

/// An ordered run of work events bracketed by application markers.
pub type Application = VecDeque<SimEvent>;

/// Read a metadata file and return its applications in parse order.
pub fn read_metadata_file(path: &Path) -> Result<Vec<Application>, SimError> {
    let text = fs::read_to_string(path).map_err(|source| SimError::ConfigIo {
        path: path.display().to_string(),
        source,
    })?;
    parse_metadata(&extract_body(&text)?)
}

/// Concatenate the lines between the metadata header and footer.
fn extract_body(text: &str) -> Result<String, SimError> {
    let mut lines = text.lines().map(str::trim);
    if !lines.any(|line| line == METADATA_HEADER) {
        return Err(SimError::ConfigFormat("meta-data header is missing".into()));
    }

    let mut body = String::new();
    for line in &mut lines {
        if line == METADATA_FOOTER {
            return Ok(body);
        }
        body.push_str(line);
    }
    Err(SimError::ConfigFormat("meta-data footer is missing".into()))
}

/// Parse a period-terminated, semicolon-separated event stream.
pub fn parse_metadata(body: &str) -> Result<Vec<Application>, SimError> {
    let body = match body.strip_suffix('.') {
        Some(stripped) => stripped,
        None => {
            return Err(SimError::MetadataSyntax(
                "meta-data is missing period at the end of events".into(),
            ))
        }
    };

    let event_re = Regex::new(r"^\s*([A-Z])\s*\(\s*([a-z\s]*)\s*\)\s*(\d+)\s*$")
        .map_err(|e| SimError::ResourceInit(format!("event pattern failed to compile: {e}")))?;

    let mut stream = StreamState::default();
    for token in body.split(';') {
        let caps = event_re.captures(token).ok_or_else(|| {
            SimError::MetadataSyntax(format!("unable to parse following event: {token}"))
        })?;

        let letter = caps[1].chars().next().unwrap_or('?');
        let descriptor = caps[2].to_string();
        let cycles: i64 = caps[3].parse().map_err(|_| {
            SimError::MetadataSyntax(format!("invalid cycles for meta-data event: {token}"))
        })?;

        let code = EventCode::from_letter(letter).ok_or_else(|| {
            SimError::MetadataSemantic(format!(
                "{letter}({descriptor}){cycles} unknown event code for meta-data event"
            ))
        })?;

        stream.add_event(SimEvent {
            code,
            descriptor,
            cycles,
        })?;
    }
    stream.finish()
}

/// State machine over the S/A span structure.
#[derive(Debug, Default)]
struct StreamState {
    os_running: bool,
    current: Option<Application>,
    applications: Vec<Application>,
}

impl StreamState {
    fn add_event(&mut self, event: SimEvent) -> Result<(), SimError> {
        if !event.code.valid_descriptor(&event.descriptor) {
            return Err(SimError::MetadataSemantic(format!(
                "{} invalid descriptor for meta-data event",
                describe(&event)
            )));
        }
        if event.cycles < 0 {
            return Err(SimError::MetadataSemantic(format!(
                "{} invalid cycles for meta-data event",
                describe(&event)
            )));
        }

        match event.code {
            EventCode::System => {
                if event.descriptor == "start" && self.os_running {
                    return Err(SimError::MetadataSemantic(format!(
                        "{} attempt to start OS while it is already running",
                        describe(&event)
                    )));
                }
                if event.descriptor == "end" && !self.os_running {
                    return Err(SimError::MetadataSemantic(format!(
                        "{} attempt to stop OS while it is already stopped",
                        describe(&event)
                    )));
                }
                self.os_running = event.descriptor == "start";
            }
            EventCode::App => {
                if !self.os_running {
                    return Err(SimError::MetadataSemantic(format!(
                        "{} attempt to {} application without OS",
                        describe(&event),
                        event.descriptor
                    )));
                }
                if event.descriptor == "start" {
                    if self.current.is_some() {
                        return Err(SimError::MetadataSemantic(format!(
                            "{} attempt to start new application within running application",
                            describe(&event)
                        )));
                    }
                    self.current = Some(Application::new());
                } else {
                    match self.current.take() {
                        Some(app) => self.applications.push(app),
                        None => {
                            return Err(SimError::MetadataSemantic(format!(
                                "{} attempt to stop non-existing application",
                                describe(&event)
                            )))
                        }
                    }
                }
            }
            EventCode::Compute | EventCode::Input | EventCode::Output | EventCode::Memory => {
                match self.current.as_mut() {
                    Some(app) => app.push_back(event),
                    None => {
                        return Err(SimError::MetadataSemantic(format!(
                            "{} attempt to execute outside of application",
                            describe(&event)
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<Application>, SimError> {
        if self.current.is_some() {
            return Err(SimError::MetadataSemantic(
                "missing meta-data to end last application".into(),
            ));
        }
        if self.os_running {
            return Err(SimError::MetadataSemantic(
                "missing meta-data to end OS".into(),
            ));
        }
        Ok(self.applications)
    }
}

fn describe(event: &SimEvent) -> String {
    let letter = match event.code {
        EventCode::System => 'S',
        EventCode::App => 'A',
        EventCode::Compute => 'P',
        EventCode::Input => 'I',
        EventCode::Output => 'O',
        EventCode::Memory => 'M',
    };
    format!("{letter}({}){}", event.descriptor, event.cycles)
}
