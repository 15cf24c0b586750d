//! Scheduling policy, job ordering, and priority rules.

use crate::types::Pid;

/// CPU scheduling policies the simulator implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// Round-robin: FIFO over equal priorities, sliced by the quantum
    /// interrupt.
    RoundRobin,
    /// Shortest-remaining-time-first over an event-count estimate.
    Srtf,
}

impl SchedPolicy {
    /// Map an admitted configuration code to a policy. The three
    /// S-variants are synonyms.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "RR" => Some(SchedPolicy::RoundRobin),
            "STR" | "SRT" | "SRTF" => Some(SchedPolicy::Srtf),
            _ => None,
        }
    }

    /// Priority for a process admitted by the loader.
    ///
    /// SRTF ingress uses the raw remaining estimate while re-enqueue uses
    /// the negated one, so a freshly loaded wave wins the heap for one
    /// dispatch cycle.
    pub fn load_priority(self, remaining_events: usize) -> i64 {
        match self {
            SchedPolicy::RoundRobin => 0,
            SchedPolicy::Srtf => remaining_events as i64,
        }
    }

    /// Priority when dispatch re-enqueues a process that has not exited.
    pub fn requeue_priority(self, remaining_events: usize) -> i64 {
        match self {
            SchedPolicy::RoundRobin => 0,
            SchedPolicy::Srtf => -(remaining_events as i64),
        }
    }
}

/// A scheduling-queue entry.
///
/// Ordering is by priority alone; the job queue is a max-heap over it, and
/// ties break by heap internal order.
#[derive(Debug, Clone, Copy)]
pub struct Job {
    pub pid: Pid,
    pub priority: i64,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority.cmp(&other.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn test_scheduling_codes() {
        assert_eq!(SchedPolicy::from_code("RR"), Some(SchedPolicy::RoundRobin));
        assert_eq!(SchedPolicy::from_code("STR"), Some(SchedPolicy::Srtf));
        assert_eq!(SchedPolicy::from_code("SRT"), Some(SchedPolicy::Srtf));
        assert_eq!(SchedPolicy::from_code("SRTF"), Some(SchedPolicy::Srtf));
        assert_eq!(SchedPolicy::from_code("FIFO"), None);
        assert_eq!(SchedPolicy::from_code("rr"), None);
    }

    #[test]
    fn test_heap_pops_highest_priority() {
        let mut jobs = BinaryHeap::new();
        jobs.push(Job { pid: Pid(0), priority: -3 });
        jobs.push(Job { pid: Pid(1), priority: -1 });
        jobs.push(Job { pid: Pid(2), priority: -2 });
        assert_eq!(jobs.pop().unwrap().pid, Pid(1));
        assert_eq!(jobs.pop().unwrap().pid, Pid(2));
        assert_eq!(jobs.pop().unwrap().pid, Pid(0));
    }

    #[test]
    fn test_round_robin_priorities_are_flat() {
        assert_eq!(SchedPolicy::RoundRobin.load_priority(5), 0);
        assert_eq!(SchedPolicy::RoundRobin.requeue_priority(5), 0);
    }

    #[test]
    fn test_srtf_ingress_and_requeue_signs() {
        assert_eq!(SchedPolicy::Srtf.load_priority(3), 3);
        assert_eq!(SchedPolicy::Srtf.requeue_priority(3), -3);
    }
}
