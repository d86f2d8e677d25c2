use crate::compile::codegen::CodegenError;
use crate::foundation::ids::Slot;

/// Scratch state reserved around bump evaluation when bump and surface run back to back.
pub(crate) const BUMP_EVAL_STATE_SIZE: u16 = 10;

/// Owned claim on a contiguous run of stack slots.
///
/// Not `Clone`: a second claim on the same slots goes through [`Stack::share`], and giving a claim
/// back consumes it, so a released range cannot be read afterwards.
#[must_use = "a slot range must be released back to the stack"]
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SlotRange {
    offset: u16,
    width: u16,
}

impl SlotRange {
    pub(crate) fn offset(&self) -> Slot {
        Slot(self.offset)
    }

    pub(crate) fn width(&self) -> u16 {
        self.width
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StackStats {
    pub(crate) allocations: u64,
    pub(crate) shares: u64,
    pub(crate) releases: u64,
    pub(crate) peak_used: u16,
}

/// Fixed-capacity register file with per-slot user counts.
///
/// A slot is free while its count is zero. Allocation is first fit; a failed allocation sets a
/// sticky flag that the driver turns into a degraded variant.
#[derive(Debug)]
pub(crate) struct Stack {
    users: Vec<u32>,
    stats: StackStats,
    exhausted: bool,
}

impl Stack {
    pub(crate) fn new(capacity: u16) -> Self {
        Self {
            users: vec![0; capacity as usize],
            stats: StackStats::default(),
            exhausted: false,
        }
    }

    pub(crate) fn capacity(&self) -> u16 {
        self.users.len() as u16
    }

    pub(crate) fn stats(&self) -> StackStats {
        self.stats
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.exhausted
    }

    /// Slots currently held by at least one user.
    pub(crate) fn used(&self) -> u16 {
        self.users.iter().filter(|&&u| u > 0).count() as u16
    }

    pub(crate) fn allocate(&mut self, width: u16) -> Result<SlotRange, CodegenError> {
        if width == 0 {
            return Ok(SlotRange {
                offset: 0,
                width: 0,
            });
        }

        let w = width as usize;
        let mut run = 0usize;
        for i in 0..self.users.len() {
            if self.users[i] > 0 {
                run = 0;
                continue;
            }
            run += 1;
            if run == w {
                let start = i + 1 - w;
                for u in &mut self.users[start..=i] {
                    *u = 1;
                }
                self.stats.allocations = self.stats.allocations.saturating_add(1);
                self.stats.peak_used = self.stats.peak_used.max(self.used());
                return Ok(SlotRange {
                    offset: start as u16,
                    width,
                });
            }
        }

        self.exhausted = true;
        Err(CodegenError::StackExhausted {
            requested: width,
            capacity: self.capacity(),
        })
    }

    /// Second claim on a live range; the slots stay used until every claim is released.
    pub(crate) fn share(&mut self, range: &SlotRange) -> SlotRange {
        let start = range.offset as usize;
        for u in &mut self.users[start..start + usize::from(range.width())] {
            *u = u.saturating_add(1);
        }
        self.stats.shares = self.stats.shares.saturating_add(1);
        SlotRange {
            offset: range.offset,
            width: range.width,
        }
    }

    pub(crate) fn release(&mut self, range: SlotRange) {
        let start = range.offset as usize;
        for u in &mut self.users[start..start + usize::from(range.width())] {
            debug_assert!(*u > 0, "slot {} released twice", start);
            *u = u.saturating_sub(1);
        }
        self.stats.releases = self.stats.releases.saturating_add(1);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/stack.rs"]
mod tests;
