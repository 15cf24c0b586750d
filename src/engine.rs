//! The simulation engine.
//!
//! Owns the process table, the priority job queue, the device inventory,
//! and the interrupt word, and coordinates three kinds of executors: the
//! dispatch loop on the calling thread, the ten-wave job loader thread,
//! and (under round-robin) the quantum thread that pulses the preemption
//! bit. I/O workers are spawned by the resource layer as transfers start.

use std::collections::BinaryHeap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, info};

use crate::clock::{spin_for_ms, spin_interruptible_ms};
use crate::config::Settings;
use crate::errors::SimError;
use crate::mem::MemAllocator;
use crate::metadata::{self, Application, EventCode, SimEvent};
use crate::process::{Pcb, ProcState, ProcessTable};
use crate::resource::{Direction, ResourceInventory};
use crate::sched::{Job, SchedPolicy};
use crate::trace::TraceSink;
use crate::types::{Pid, TimeMs};

/// Interrupt word bit held while the loader runs an ingress wave.
pub const INTERRUPT_LOADER: u16 = 0b01;
/// Interrupt word bit pulsed by the quantum thread under round-robin.
pub const INTERRUPT_QUANTUM: u16 = 0b10;

/// Ingress waves the loader runs before finishing.
const LOADER_WAVES: usize = 10;
/// Delay between consecutive ingress waves.
const LOADER_WAVE_GAP_MS: TimeMs = 100;

/// A complete simulation: configuration, parsed applications, and all
/// scheduler state.
#[derive(Debug)]
pub struct Simulation {
    settings: Settings,
    sink: Arc<TraceSink>,
    resources: ResourceInventory,
    applications: Vec<Application>,
    processes: ProcessTable,
    /// Max-priority job queue. Its lock is the sim mutex: the dispatch
    /// thread holds it across a burst of pops, the loader for each
    /// ingress wave.
    jobs: Mutex<BinaryHeap<Job>>,
    interrupt: AtomicU16,
    loader_finished: AtomicBool,
    quantum_stop: AtomicBool,
    process_counter: AtomicU32,
    memory: Mutex<MemAllocator>,
}

impl Simulation {
    /// Load configuration and metadata and build a ready-to-run
    /// simulation. All initialization errors surface here, before the
    /// first dispatch step.
    pub fn new(config_path: &Path) -> Result<Self, SimError> {
        let settings = Settings::load(config_path)?;
        let sink = Arc::new(TraceSink::new(settings.log_mode, &settings.log_file_path)?);
        let resources = ResourceInventory::new(&settings, Arc::clone(&sink));
        let applications = metadata::read_metadata_file(Path::new(&settings.metadata_path))?;
        let memory = MemAllocator::new(settings.system_memory_kb, settings.block_size_kb);

        info!(
            "simulation ready: {} applications, {:?} scheduling",
            applications.len(),
            settings.scheduling
        );

        Ok(Simulation {
            settings,
            sink,
            resources,
            applications,
            processes: ProcessTable::new(),
            jobs: Mutex::new(BinaryHeap::new()),
            interrupt: AtomicU16::new(0),
            loader_finished: AtomicBool::new(false),
            quantum_stop: AtomicBool::new(false),
            process_counter: AtomicU32::new(0),
            memory: Mutex::new(memory),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the simulation to completion.
    pub fn run(self: Arc<Self>) -> Result<(), SimError> {
        self.sink.reset_clock();
        self.sink.line(format_args!("Simulator program starting"));

        self.process_counter.store(0, Ordering::SeqCst);
        self.loader_finished.store(false, Ordering::SeqCst);
        self.quantum_stop.store(false, Ordering::SeqCst);
        self.interrupt.store(0, Ordering::SeqCst);

        let loader = {
            let sim = Arc::clone(&self);
            thread::Builder::new()
                .name("job-loader".into())
                .spawn(move || sim.loader_main())
                .map_err(|e| {
                    SimError::ResourceInit(format!("unable to create loader thread: {e}"))
                })?
        };

        let quantum = if self.settings.scheduling == SchedPolicy::RoundRobin {
            let sim = Arc::clone(&self);
            Some(
                thread::Builder::new()
                    .name("quantum".into())
                    .spawn(move || sim.quantum_main())
                    .map_err(|e| {
                        SimError::ResourceInit(format!("unable to create quantum thread: {e}"))
                    })?,
            )
        } else {
            None
        };

        while !self.loader_finished.load(Ordering::SeqCst) || !self.jobs.lock().unwrap().is_empty()
        {
            {
                let mut jobs = self.jobs.lock().unwrap();
                loop {
                    if self.interrupt.load(Ordering::SeqCst) & INTERRUPT_LOADER != 0 {
                        break;
                    }
                    let job = match jobs.pop() {
                        Some(job) => job,
                        None => break,
                    };
                    let pcb = match self.processes.get(job.pid) {
                        Some(pcb) => pcb,
                        None => continue,
                    };

                    let state = pcb.state.load();
                    if state == ProcState::Start {
                        pcb.state.store(ProcState::Ready);
                    }
                    if state == ProcState::Ready {
                        self.run_process(&pcb)?;
                    }

                    // The pulse this dispatch round consumed, if any.
                    self.interrupt.fetch_and(!INTERRUPT_QUANTUM, Ordering::SeqCst);

                    if pcb.state.load() != ProcState::Exit {
                        let priority = self
                            .settings
                            .scheduling
                            .requeue_priority(pcb.remaining_events());
                        jobs.push(Job {
                            pid: job.pid,
                            priority,
                        });
                    }
                }
            }
            // Stay off the sim mutex while an ingress wave is running.
            while self.interrupt.load(Ordering::SeqCst) & INTERRUPT_LOADER != 0 {
                std::hint::spin_loop();
            }
        }

        if loader.join().is_err() {
            return Err(SimError::ResourceInit("loader thread panicked".into()));
        }
        if let Some(quantum) = quantum {
            self.quantum_stop.store(true, Ordering::SeqCst);
            if quantum.join().is_err() {
                return Err(SimError::ResourceInit("quantum thread panicked".into()));
            }
        }

        self.sink.line(format_args!("Simulator program ending"));
        Ok(())
    }

    /// Dispatch one process: execute head events until preemption, an I/O
    /// wait, or queue exhaustion.
    fn run_process(&self, pcb: &Arc<Pcb>) -> Result<(), SimError> {
        self.sink
            .line(format_args!("OS: starting process {}", pcb.pid));
        pcb.state.store(ProcState::Running);

        loop {
            let event = {
                let exec = pcb.exec.lock().unwrap();
                match exec.events.front() {
                    Some(event) => event.clone(),
                    None => break,
                }
            };

            match event.code {
                EventCode::Compute => self.handle_compute(pcb, &event),
                EventCode::Memory => self.handle_memory(pcb, &event),
                EventCode::Input | EventCode::Output => self.handle_io(pcb, &event)?,
                // Structural markers never reach a PCB queue.
                EventCode::System | EventCode::App => break,
            }

            if self.interrupt.load(Ordering::SeqCst) != 0 || pcb.state.load() == ProcState::Waiting
            {
                break;
            }
        }

        if pcb.exec.lock().unwrap().events.is_empty() {
            self.sink
                .line(format_args!("Process {} completed", pcb.pid));
            pcb.state.store(ProcState::Exit);
        }
        Ok(())
    }

    /// Run one slice of a compute event.
    ///
    /// Resume protocol: an in-progress event's unexpired remainder is the
    /// slice budget; a fresh event logs its start line and budgets
    /// cycles x cycle time. The busy wait polls the interrupt word, and an
    /// observed interrupt stores the remainder back without popping.
    fn handle_compute(&self, pcb: &Arc<Pcb>, event: &SimEvent) {
        let (in_progress, carried_ms) = {
            let exec = pcb.exec.lock().unwrap();
            (exec.in_progress, exec.remaining_ms)
        };
        let slice_ms = if in_progress {
            carried_ms
        } else {
            self.sink.line(format_args!(
                "Process {}: start processing action",
                pcb.pid
            ));
            event.cycles as TimeMs * self.settings.processor_cycle_ms
        };

        let remaining = spin_interruptible_ms(slice_ms, &self.interrupt);

        let mut exec = pcb.exec.lock().unwrap();
        if self.interrupt.load(Ordering::SeqCst) != 0 {
            exec.in_progress = true;
            exec.remaining_ms = remaining;
            self.sink.line(format_args!(
                "Process {}: interrupt processing action",
                pcb.pid
            ));
        } else {
            self.sink
                .line(format_args!("Process {}: end processing action", pcb.pid));
            exec.in_progress = false;
            exec.events.pop_front();
        }
        pcb.state.store(ProcState::Ready);
    }

    /// Run one slice of a memory event.
    ///
    /// The busy wait here polls only elapsed time: memory work is atomic
    /// within a slice, so preemption is observed on the slice boundary and
    /// the stored remainder is always zero.
    fn handle_memory(&self, pcb: &Arc<Pcb>, event: &SimEvent) {
        let (in_progress, carried_ms) = {
            let exec = pcb.exec.lock().unwrap();
            (exec.in_progress, exec.remaining_ms)
        };
        let slice_ms = if in_progress {
            carried_ms
        } else {
            event.cycles as TimeMs * self.settings.memory_cycle_ms
        };

        match event.descriptor.as_str() {
            "allocate" => {
                if !in_progress {
                    self.sink
                        .line(format_args!("Process {}: allocating memory", pcb.pid));
                }
                spin_for_ms(slice_ms);
                if self.interrupt.load(Ordering::SeqCst) == 0 {
                    let address = self.memory.lock().unwrap().alloc(1);
                    self.sink.line(format_args!(
                        "Process {}: memory allocated at 0x{address:08x}",
                        pcb.pid
                    ));
                }
            }
            "block" => {
                if !in_progress {
                    self.sink
                        .line(format_args!("Process {}: start memory blocking", pcb.pid));
                }
                spin_for_ms(slice_ms);
                if self.interrupt.load(Ordering::SeqCst) == 0 {
                    self.sink
                        .line(format_args!("Process {}: end memory blocking", pcb.pid));
                }
            }
            _ => {}
        }

        let mut exec = pcb.exec.lock().unwrap();
        if self.interrupt.load(Ordering::SeqCst) != 0 {
            self.sink.line(format_args!(
                "Process {}: interrupt processing action",
                pcb.pid
            ));
            exec.in_progress = true;
            exec.remaining_ms = 0;
        } else {
            exec.in_progress = false;
            exec.events.pop_front();
        }
        pcb.state.store(ProcState::Ready);
    }

    /// Start or complete an I/O event.
    ///
    /// An in-progress I/O event means the device worker has run: the event
    /// is done. Otherwise spin on the device's non-blocking acquire until
    /// it succeeds or an interrupt arrives; acquisition parks the process
    /// WAITING for the worker to release.
    fn handle_io(&self, pcb: &Arc<Pcb>, event: &SimEvent) -> Result<(), SimError> {
        {
            let mut exec = pcb.exec.lock().unwrap();
            if exec.in_progress {
                exec.in_progress = false;
                exec.events.pop_front();
                pcb.state.store(ProcState::Ready);
                return Ok(());
            }
        }

        let device = match self.resources.for_descriptor(&event.descriptor) {
            Some(device) => device,
            None => return Ok(()),
        };
        let direction = if event.code == EventCode::Input {
            Direction::Input
        } else {
            Direction::Output
        };

        let mut acquired = false;
        while !acquired && self.interrupt.load(Ordering::SeqCst) == 0 {
            acquired = device.try_run(event.cycles, direction, pcb)?;
        }

        if acquired {
            pcb.exec.lock().unwrap().in_progress = true;
        } else {
            // Interrupted before a slot freed up; the event restarts on
            // the next dispatch.
            pcb.state.store(ProcState::Ready);
        }
        Ok(())
    }

    /// Job loader thread: ten ingress waves, each admitting every parsed
    /// application as a fresh process.
    fn loader_main(&self) {
        for wave in 0..LOADER_WAVES {
            if wave != 0 {
                spin_for_ms(LOADER_WAVE_GAP_MS);
            }

            self.interrupt.fetch_or(INTERRUPT_LOADER, Ordering::SeqCst);
            let mut jobs = self.jobs.lock().unwrap();
            debug!("ingress wave {wave}");

            for application in &self.applications {
                let pid = Pid(self.process_counter.fetch_add(1, Ordering::SeqCst));
                self.sink
                    .line(format_args!("OS: preparing process {pid}"));

                let pcb = Arc::new(Pcb::new(pid, application.clone()));
                let priority = self
                    .settings
                    .scheduling
                    .load_priority(pcb.remaining_events());
                self.processes.insert(Arc::clone(&pcb));
                jobs.push(Job { pid, priority });
            }

            self.interrupt.fetch_and(!INTERRUPT_LOADER, Ordering::SeqCst);
            drop(jobs);
        }

        self.loader_finished.store(true, Ordering::SeqCst);
    }

    /// Quantum thread: pulse the preemption bit every quantum until asked
    /// to stop.
    fn quantum_main(&self) {
        while !self.quantum_stop.load(Ordering::SeqCst) {
            spin_for_ms(self.settings.quantum_ms);
            self.interrupt.fetch_or(INTERRUPT_QUANTUM, Ordering::SeqCst);
        }
    }
}
