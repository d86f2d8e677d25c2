use crate::compile::summary::CompileSummary;
use crate::foundation::error::{SvmError, SvmResult};
use crate::foundation::ids::ShaderId;
use crate::program::compiled::{CompileStatus, Diagnostic, JumpTable, ShaderFlags};
use crate::program::fingerprint::{ProgramFingerprint, fingerprint_instrs};
use crate::program::instr::{Instr, Opcode};
use std::fmt::Write as _;

/// Per-shader metadata kept after merge. `jump` is already in global coordinates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShaderRecord {
    pub shader: ShaderId,
    pub name: String,
    pub jump: JumpTable,
    pub flags: ShaderFlags,
    pub summary: CompileSummary,
    pub status: CompileStatus,
    pub fingerprint: ProgramFingerprint,
}

/// Batch-level outcome: every diagnostic raised by any shader, in shader order.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CompileReport {
    pub shaders: usize,
    pub degraded: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub elapsed_ms: f64,
}

/// Concatenated program consumed by the runtime.
///
/// Layout: one [`Instr::ShaderJump`] row per shader (index = shader position in the batch), then
/// every shader's block back to back.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GlobalProgram {
    pub instrs: Vec<Instr>,
    pub shaders: Vec<ShaderRecord>,
    /// Bitset of [`Opcode`]s used anywhere in the batch.
    pub usage: u64,
    /// Shaders whose emission must be re-estimated for importance sampling.
    pub emissive_shaders: Vec<ShaderId>,
    pub report: CompileReport,
}

impl GlobalProgram {
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn jump(&self, index: usize) -> Option<&JumpTable> {
        self.shaders.get(index).map(|s| &s.jump)
    }

    pub fn uses(&self, op: Opcode) -> bool {
        self.usage & op.bit() != 0
    }

    pub fn fingerprint(&self) -> ProgramFingerprint {
        fingerprint_instrs(&self.instrs)
    }

    pub fn to_json_pretty(&self) -> SvmResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SvmError::internal(format!("serialize global program: {e}")))
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "program shaders={} instrs={}",
            self.shaders.len(),
            self.instrs.len()
        );
        for (i, instr) in self.instrs.iter().enumerate() {
            if let Some(rec) = self
                .shaders
                .iter()
                .find(|s| Some(i as u32) == first_offset(&s.jump))
            {
                let _ = writeln!(out, "; {}", rec.name);
            }
            let _ = writeln!(out, "{i:05} {instr:?}");
        }
        out
    }
}

fn first_offset(jt: &JumpTable) -> Option<u32> {
    [jt.bump, jt.surface, jt.volume, jt.displacement]
        .into_iter()
        .flatten()
        .min()
}
