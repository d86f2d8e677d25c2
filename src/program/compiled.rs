use crate::compile::summary::CompileSummary;
use crate::foundation::ids::ShaderId;
use crate::program::fingerprint::ProgramFingerprint;
use crate::program::instr::Instr;
use std::fmt::Write as _;

/// Independently addressable entry point of a compiled shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Variant {
    Bump,
    Surface,
    Volume,
    Displacement,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Self::Bump,
        Self::Surface,
        Self::Volume,
        Self::Displacement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bump => "bump",
            Self::Surface => "surface",
            Self::Volume => "volume",
            Self::Displacement => "displacement",
        }
    }
}

/// Start offset of every variant; `None` when the variant was not compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct JumpTable {
    pub bump: Option<u32>,
    pub surface: Option<u32>,
    pub volume: Option<u32>,
    pub displacement: Option<u32>,
}

impl JumpTable {
    pub fn get(&self, v: Variant) -> Option<u32> {
        match v {
            Variant::Bump => self.bump,
            Variant::Surface => self.surface,
            Variant::Volume => self.volume,
            Variant::Displacement => self.displacement,
        }
    }

    pub(crate) fn set(&mut self, v: Variant, offset: Option<u32>) {
        let slot = match v {
            Variant::Bump => &mut self.bump,
            Variant::Surface => &mut self.surface,
            Variant::Volume => &mut self.volume,
            Variant::Displacement => &mut self.displacement,
        };
        *slot = offset;
    }

    /// Same table with every present offset moved by `base`.
    pub(crate) fn rebased(&self, base: u32) -> Self {
        let shift = |o: Option<u32>| o.map(|o| o.saturating_add(base));
        Self {
            bump: shift(self.bump),
            surface: shift(self.surface),
            volume: shift(self.volume),
            displacement: shift(self.displacement),
        }
    }

    pub(crate) fn to_instr(self) -> Instr {
        Instr::ShaderJump {
            bump: self.bump,
            surface: self.surface,
            volume: self.volume,
            displacement: self.displacement,
        }
    }
}

/// Shader-level summary bits consumed by the runtime to pick fast paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ShaderFlags {
    pub has_surface: bool,
    pub has_volume: bool,
    pub has_displacement: bool,
    pub has_surface_spatial_varying: bool,
    pub has_volume_spatial_varying: bool,
    pub has_volume_attribute_dependency: bool,
    pub has_surface_transparent: bool,
    pub has_surface_bssrdf: bool,
    pub has_bssrdf_bump: bool,
    pub has_bump: bool,
    pub has_surface_emission: bool,
}

impl ShaderFlags {
    pub(crate) fn merge(&mut self, o: &ShaderFlags) {
        self.has_surface |= o.has_surface;
        self.has_volume |= o.has_volume;
        self.has_displacement |= o.has_displacement;
        self.has_surface_spatial_varying |= o.has_surface_spatial_varying;
        self.has_volume_spatial_varying |= o.has_volume_spatial_varying;
        self.has_volume_attribute_dependency |= o.has_volume_attribute_dependency;
        self.has_surface_transparent |= o.has_surface_transparent;
        self.has_surface_bssrdf |= o.has_surface_bssrdf;
        self.has_bssrdf_bump |= o.has_bssrdf_bump;
        self.has_bump |= o.has_bump;
        self.has_surface_emission |= o.has_surface_emission;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum CompileStatus {
    Compiled,
    /// These variants hit a fatal codegen error and were replaced by a lone `End`.
    Degraded { variants: Vec<Variant> },
}

impl CompileStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    pub shader: String,
    pub variant: Option<Variant>,
    pub severity: Severity,
    pub message: String,
}

/// Self-contained output of one shader compile; offsets are local to `instrs`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompiledShader {
    pub shader: ShaderId,
    pub name: String,
    pub instrs: Vec<Instr>,
    pub jump: JumpTable,
    pub flags: ShaderFlags,
    pub use_mis: bool,
    pub summary: CompileSummary,
    pub status: CompileStatus,
    pub diagnostics: Vec<Diagnostic>,
    pub fingerprint: ProgramFingerprint,
}

impl CompiledShader {
    /// Deterministic text dump used for debugging and snapshot comparisons.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "shader {} ({})", self.shader.0, self.name);
        for v in Variant::ALL {
            match self.jump.get(v) {
                Some(o) => {
                    let _ = writeln!(out, "  {}: @{o}", v.as_str());
                }
                None => {
                    let _ = writeln!(out, "  {}: -", v.as_str());
                }
            }
        }
        for (i, instr) in self.instrs.iter().enumerate() {
            let _ = writeln!(out, "  {i:04} {instr:?}");
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/program/compiled.rs"]
mod tests;
