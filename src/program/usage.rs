use crate::program::instr::Opcode;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which instruction kinds were emitted anywhere in a batch.
///
/// Shared by every worker of a parallel compile; updates are lock-free `fetch_or`s.
#[derive(Debug, Default)]
pub struct OpcodeUsage {
    bits: AtomicU64,
}

impl OpcodeUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, op: Opcode) {
        self.bits.fetch_or(op.bit(), Ordering::Relaxed);
    }

    /// Flag every opcode set in `bits`.
    pub fn merge(&self, bits: u64) {
        if bits != 0 {
            self.bits.fetch_or(bits, Ordering::Relaxed);
        }
    }

    pub fn contains(&self, op: Opcode) -> bool {
        self.bits.load(Ordering::Relaxed) & op.bit() != 0
    }

    pub fn bits(&self) -> u64 {
        self.bits.load(Ordering::Relaxed)
    }

    pub fn used(&self) -> Vec<Opcode> {
        let bits = self.bits();
        Opcode::ALL
            .iter()
            .copied()
            .filter(|op| bits & op.bit() != 0)
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/program/usage.rs"]
mod tests;
