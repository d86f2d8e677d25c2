use crate::foundation::ids::Slot;
use crate::program::instr::Instr;

/// Placeholder for a forward jump whose distance is not known yet.
///
/// Returned by [`InstrBuffer::push_jump`] and consumed by [`InstrBuffer::resolve`], so each
/// placeholder is patched exactly once.
#[must_use = "a jump placeholder must be resolved"]
#[derive(Debug)]
pub(crate) struct Patch {
    at: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JumpKind {
    IfZero,
    IfOne,
}

/// Relocatable instruction stream of one variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrBuffer {
    instrs: Vec<Instr>,
}

impl InstrBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    pub(crate) fn push_jump(&mut self, kind: JumpKind, fac: Slot) -> Patch {
        let at = self.instrs.len();
        self.instrs.push(match kind {
            JumpKind::IfZero => Instr::JumpIfZero { fac, skip: 0 },
            JumpKind::IfOne => Instr::JumpIfOne { fac, skip: 0 },
        });
        Patch { at }
    }

    /// Point the jump behind everything emitted since the placeholder.
    pub(crate) fn resolve(&mut self, patch: Patch) {
        let len = self.instrs.len();
        if let Instr::JumpIfZero { skip, .. } | Instr::JumpIfOne { skip, .. } =
            &mut self.instrs[patch.at]
        {
            *skip = (len - patch.at - 1) as u32;
        } else {
            debug_assert!(false, "patch does not point at a jump");
        }
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Drop everything from `len` on. Callers never cut through an unresolved jump.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.instrs.truncate(len);
    }

    pub fn as_slice(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn into_vec(self) -> Vec<Instr> {
        self.instrs
    }
}

#[cfg(test)]
#[path = "../../tests/unit/program/buffer.rs"]
mod tests;
