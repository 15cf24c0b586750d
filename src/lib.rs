//! osim: a threaded operating-system scheduling and resource simulator.
//!
//! The simulator ingests a configuration file and a declarative program
//! metadata stream, synthesizes processes from the parsed applications,
//! and drives them through a simulated OS that performs CPU scheduling,
//! preemption, memory allocation, and arbitrated I/O against a fixed
//! inventory of devices. Its product is a chronologically ordered log of
//! scheduling and resource events, timestamped from simulation start.
//!
//! # Architecture
//!
//! - **Engine**: dispatch loop popping the highest-priority job and
//!   running one slice of its head event; job loader and quantum threads
//!   signal it through an atomic interrupt word
//! - **Processes**: PCBs with atomic state and resumable head events
//! - **Resources**: six device classes, counted or exclusive, each
//!   transfer completed by a background worker
//! - **Memory**: a linear block allocator with wrap-around reuse
//! - **Trace**: the serialized, timestamped log sink (monitor and/or file)
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use osim::Simulation;
//!
//! let sim = Arc::new(Simulation::new(Path::new("sim.conf"))?);
//! sim.run()?;
//! # Ok::<(), osim::SimError>(())
//! ```

pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod mem;
pub mod metadata;
pub mod process;
pub mod resource;
pub mod sched;
pub mod trace;
pub mod types;

pub use config::{ConfigKind, ConfigStore, Settings};
pub use engine::{Simulation, INTERRUPT_LOADER, INTERRUPT_QUANTUM};
pub use errors::SimError;
pub use mem::MemAllocator;
pub use metadata::{Application, EventCode, SimEvent};
pub use process::{Pcb, ProcState, ProcessTable};
pub use resource::{DeviceKind, Direction, ResourceInventory};
pub use sched::{Job, SchedPolicy};
pub use trace::{LogMode, TraceSink};
pub use types::{Pid, TimeMs};
