//! Process control blocks and the process table.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::metadata::Application;
use crate::types::{Pid, TimeMs};

/// Scheduling states a process moves through.
///
/// The sequence is a prefix of START -> READY -> (RUNNING ->
/// (READY|WAITING))* -> EXIT; EXIT is sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcState {
    Start = 0,
    Ready = 1,
    Running = 2,
    Waiting = 3,
    Exit = 4,
}

/// [`ProcState`] behind an atomic: an I/O worker flips WAITING -> READY
/// while the dispatch thread reads and writes the same slot.
#[derive(Debug)]
pub struct AtomicProcState(AtomicU8);

impl AtomicProcState {
    pub fn new(state: ProcState) -> Self {
        AtomicProcState(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ProcState {
        match self.0.load(Ordering::SeqCst) {
            0 => ProcState::Start,
            1 => ProcState::Ready,
            2 => ProcState::Running,
            3 => ProcState::Waiting,
            _ => ProcState::Exit,
        }
    }

    pub fn store(&self, state: ProcState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Resume bookkeeping for the head event. Only the dispatch thread takes
/// this lock.
#[derive(Debug)]
pub struct ExecState {
    pub events: Application,
    pub in_progress: bool,
    /// Unexpired slice time; meaningful only while `in_progress`.
    pub remaining_ms: TimeMs,
}

/// Process control block.
#[derive(Debug)]
pub struct Pcb {
    pub pid: Pid,
    pub state: AtomicProcState,
    pub exec: Mutex<ExecState>,
}

impl Pcb {
    pub fn new(pid: Pid, events: Application) -> Self {
        Pcb {
            pid,
            state: AtomicProcState::new(ProcState::Start),
            exec: Mutex::new(ExecState {
                events,
                in_progress: false,
                remaining_ms: 0,
            }),
        }
    }

    /// Events still queued; the scheduling remaining-time estimate.
    pub fn remaining_events(&self) -> usize {
        self.exec.lock().unwrap().events.len()
    }
}

pub const INITIAL_TABLE_CAPACITY: usize = 4096;

/// Sparse pid-indexed store of PCBs. PCBs live for the whole simulation.
#[derive(Debug)]
pub struct ProcessTable {
    slots: RwLock<Vec<Option<Arc<Pcb>>>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        ProcessTable {
            slots: RwLock::new(vec![None; INITIAL_TABLE_CAPACITY]),
        }
    }

    /// Place a PCB at its pid's slot, doubling the table as needed.
    pub fn insert(&self, pcb: Arc<Pcb>) {
        let mut slots = self.slots.write().unwrap();
        let index = pcb.pid.0 as usize;
        while index >= slots.len() {
            let grown = slots.len() * 2;
            slots.resize(grown, None);
        }
        slots[index] = Some(pcb);
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<Pcb>> {
        self.slots.read().unwrap().get(pid.0 as usize)?.clone()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_state_round_trip() {
        let state = AtomicProcState::new(ProcState::Start);
        assert_eq!(state.load(), ProcState::Start);
        state.store(ProcState::Waiting);
        assert_eq!(state.load(), ProcState::Waiting);
        state.store(ProcState::Exit);
        assert_eq!(state.load(), ProcState::Exit);
    }

    #[test]
    fn test_table_insert_and_lookup() {
        let table = ProcessTable::new();
        table.insert(Arc::new(Pcb::new(Pid(7), Application::new())));
        assert_eq!(table.get(Pid(7)).unwrap().pid, Pid(7));
        assert!(table.get(Pid(8)).is_none());
    }

    #[test]
    fn test_table_grows_by_doubling() {
        let table = ProcessTable::new();
        table.insert(Arc::new(Pcb::new(
            Pid(INITIAL_TABLE_CAPACITY as u32 + 100),
            Application::new(),
        )));
        let len = table.slots.read().unwrap().len();
        assert_eq!(len, INITIAL_TABLE_CAPACITY * 2);
        assert!(table.get(Pid(INITIAL_TABLE_CAPACITY as u32 + 100)).is_some());
    }

    #[test]
    fn test_remaining_events_tracks_queue() {
        let mut events = Application::new();
        events.push_back(crate::metadata::SimEvent {
            code: crate::metadata::EventCode::Compute,
            descriptor: "run".into(),
            cycles: 1,
        });
        let pcb = Pcb::new(Pid(0), events);
        assert_eq!(pcb.remaining_events(), 1);
        pcb.exec.lock().unwrap().events.pop_front();
        assert_eq!(pcb.remaining_events(), 0);
    }
}
