use crate::foundation::ids::Slot;
use crate::graph::node::{BsdfKind, MathOp, VolumeKind};
use crate::program::instr::{AttrComponent, EvalOp, Instr};
use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x5f3a_91c4_d20e_7b68;

/// Stable 128-bit fingerprint of an instruction stream.
///
/// Two streams with equal fingerprints are byte-identical for all practical purposes; hosts use
/// this to skip re-uploading unchanged programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ProgramFingerprint {
    pub hi: u64,
    pub lo: u64,
}

pub fn fingerprint_instrs(instrs: &[Instr]) -> ProgramFingerprint {
    let mut h = StableHasher::new();
    h.write_u32(instrs.len() as u32);
    for i in instrs {
        write_instr(&mut h, i);
    }
    h.finish()
}

/// Key under which an attribute name is encoded in [`Instr::Attribute`].
pub(crate) fn attribute_key(name: &str) -> u64 {
    xxhash_rust::xxh3::xxh3_64_with_seed(name.as_bytes(), XXH3_SEED)
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    fn write_vec3(&mut self, v: [f32; 3]) {
        for c in v {
            self.write_f32(c);
        }
    }

    fn write_slot(&mut self, s: Slot) {
        self.write_u16(s.0);
    }

    fn write_opt_slot(&mut self, s: Option<Slot>) {
        match s {
            Some(s) => {
                self.write_u8(1);
                self.write_slot(s);
            }
            None => self.write_u8(0),
        }
    }

    fn write_opt_u32(&mut self, v: Option<u32>) {
        match v {
            Some(v) => {
                self.write_u8(1);
                self.write_u32(v);
            }
            None => self.write_u8(0),
        }
    }

    fn write_operands(&mut self, ops: &[Option<Slot>]) {
        self.write_u8(ops.len() as u8);
        for s in ops {
            self.write_opt_slot(*s);
        }
    }

    fn finish(self) -> ProgramFingerprint {
        let v = self.inner.digest128();
        ProgramFingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

fn write_instr(h: &mut StableHasher, i: &Instr) {
    h.write_u8(i.opcode() as u8);
    match i {
        Instr::ShaderJump {
            bump,
            surface,
            volume,
            displacement,
        } => {
            h.write_opt_u32(*bump);
            h.write_opt_u32(*surface);
            h.write_opt_u32(*volume);
            h.write_opt_u32(*displacement);
        }
        Instr::End | Instr::AovStart => {}
        Instr::ValueF { value, out } => {
            h.write_f32(*value);
            h.write_slot(*out);
        }
        Instr::ValueV { value, out } => {
            h.write_vec3(*value);
            h.write_slot(*out);
        }
        Instr::Eval {
            op,
            inputs,
            outputs,
        } => {
            write_eval_op(h, *op);
            h.write_operands(inputs);
            h.write_operands(outputs);
        }
        Instr::Attribute {
            key,
            component,
            out,
        } => {
            h.write_u64(*key);
            h.write_u8(match component {
                AttrComponent::Float3 => 0,
                AttrComponent::Float => 1,
                AttrComponent::Alpha => 2,
            });
            h.write_slot(*out);
        }
        Instr::ClosureSetWeight { weight } | Instr::ClosureAddSetWeight { weight } => {
            h.write_vec3(*weight);
        }
        Instr::ClosureWeight { color } | Instr::ClosureAddWeight { color } => {
            h.write_slot(*color);
        }
        Instr::EmissionWeight {
            color,
            strength,
            strength_value,
        } => {
            h.write_slot(*color);
            h.write_opt_slot(*strength);
            h.write_f32(*strength_value);
        }
        Instr::Bsdf {
            kind,
            params,
            mix_weight,
        } => {
            h.write_u8(bsdf_tag(*kind));
            h.write_operands(params);
            h.write_opt_slot(*mix_weight);
        }
        Instr::Emission { mix_weight }
        | Instr::Background { mix_weight }
        | Instr::Holdout { mix_weight } => h.write_opt_slot(*mix_weight),
        Instr::Volume {
            kind,
            density,
            anisotropy,
            mix_weight,
        } => {
            h.write_u8(match kind {
                VolumeKind::Absorption => 0,
                VolumeKind::Scatter => 1,
            });
            h.write_slot(*density);
            h.write_opt_slot(*anisotropy);
            h.write_opt_slot(*mix_weight);
        }
        Instr::MixClosureWeight {
            fac,
            weight,
            weight1,
            weight2,
        } => {
            h.write_slot(*fac);
            h.write_slot(*weight);
            h.write_opt_slot(*weight1);
            h.write_opt_slot(*weight2);
        }
        Instr::SetNormal { direction, out } => {
            h.write_slot(*direction);
            h.write_slot(*out);
        }
        Instr::SetBump {
            normal,
            distance,
            center,
            dx,
            dy,
            strength,
            invert,
            out,
            state,
        } => {
            h.write_opt_slot(*normal);
            for s in [distance, center, dx, dy, strength] {
                h.write_slot(*s);
            }
            h.write_bool(*invert);
            h.write_slot(*out);
            h.write_opt_slot(*state);
        }
        Instr::EnterBumpEval { state } | Instr::LeaveBumpEval { state } => h.write_slot(*state),
        Instr::SetDisplacement { displacement } => h.write_slot(*displacement),
        Instr::JumpIfZero { fac, skip } | Instr::JumpIfOne { fac, skip } => {
            h.write_slot(*fac);
            h.write_u32(*skip);
        }
        Instr::AovColor { color, offset } => {
            h.write_slot(*color);
            h.write_u32(*offset);
        }
        Instr::AovValue { value, offset } => {
            h.write_slot(*value);
            h.write_u32(*offset);
        }
    }
}

fn write_eval_op(h: &mut StableHasher, op: EvalOp) {
    match op {
        EvalOp::Math(m) => {
            h.write_u8(0);
            h.write_u8(match m {
                MathOp::Add => 0,
                MathOp::Subtract => 1,
                MathOp::Multiply => 2,
                MathOp::Divide => 3,
                MathOp::Power => 4,
                MathOp::Minimum => 5,
                MathOp::Maximum => 6,
                MathOp::Absolute => 7,
            });
        }
        EvalOp::MixColor => h.write_u8(1),
        EvalOp::TextureCoordinate => h.write_u8(2),
        EvalOp::Geometry => h.write_u8(3),
        EvalOp::Convert { from, to } => {
            h.write_u8(4);
            h.write_u8(from as u8);
            h.write_u8(to as u8);
        }
    }
}

fn bsdf_tag(kind: BsdfKind) -> u8 {
    match kind {
        BsdfKind::Diffuse => 0,
        BsdfKind::Glossy => 1,
        BsdfKind::Glass => 2,
        BsdfKind::Transparent => 3,
        BsdfKind::Subsurface => 4,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/program/fingerprint.rs"]
mod tests;
