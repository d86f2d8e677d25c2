use crate::program::compiled::{CompiledShader, Severity};
use crate::program::global::{CompileReport, GlobalProgram, ShaderRecord};
use crate::program::instr::Opcode;

/// Concatenate per-shader blocks behind one jump row per shader.
///
/// A shader-local offset `o` of shader `k` becomes `o + n + sum(len of shaders before k)`, where
/// `n` is the number of jump rows.
pub(crate) fn assemble(compiled: Vec<CompiledShader>, usage: u64, elapsed_ms: f64) -> GlobalProgram {
    let rows = compiled.len();
    let body: usize = compiled.iter().map(|c| c.instrs.len()).sum();
    let mut instrs = Vec::with_capacity(rows + body);

    let mut base = rows as u32;
    let mut tables = Vec::with_capacity(rows);
    for c in &compiled {
        let jt = c.jump.rebased(base);
        instrs.push(jt.to_instr());
        tables.push(jt);
        base = base.saturating_add(c.instrs.len() as u32);
    }

    let mut shaders = Vec::with_capacity(rows);
    let mut emissive_shaders = Vec::new();
    let mut report = CompileReport {
        shaders: rows,
        elapsed_ms,
        ..CompileReport::default()
    };
    for (c, jump) in compiled.into_iter().zip(tables) {
        if c.flags.has_surface_emission && c.use_mis {
            tracing::trace!(shader = %c.name, "queued for emission estimation");
            emissive_shaders.push(c.shader);
        }
        if c.status.is_degraded() {
            report.degraded += 1;
        }
        let errors = c
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        if errors > 0 {
            tracing::debug!(shader = %c.name, errors, "shader compiled with errors");
        }
        report.diagnostics.extend(c.diagnostics);
        instrs.extend(c.instrs);
        shaders.push(ShaderRecord {
            shader: c.shader,
            name: c.name,
            jump,
            flags: c.flags,
            summary: c.summary,
            status: c.status,
            fingerprint: c.fingerprint,
        });
    }

    let usage = if rows > 0 {
        usage | Opcode::ShaderJump.bit()
    } else {
        usage
    };
    GlobalProgram {
        instrs,
        shaders,
        usage,
        emissive_shaders,
        report,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/manager/merge.rs"]
mod tests;
