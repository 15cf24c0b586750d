//! Newtype wrappers and type aliases for domain concepts.

use std::fmt;

/// Process identifier, assigned by the job loader in ingress order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Simulated time in milliseconds.
pub type TimeMs = u64;
