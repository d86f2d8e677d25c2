use crate::foundation::ids::Slot;
use crate::graph::node::{BsdfKind, MathOp, VolumeKind};
use crate::graph::socket::SocketType;
use smallvec::SmallVec;

/// Variable-arity operand list; `None` encodes an absent optional operand.
pub type Operands = SmallVec<[Option<Slot>; 4]>;

/// Computation performed by a generic [`Instr::Eval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum EvalOp {
    Math(MathOp),
    MixColor,
    TextureCoordinate,
    Geometry,
    Convert { from: SocketType, to: SocketType },
}

/// Component read by an [`Instr::Attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum AttrComponent {
    Float3,
    Float,
    Alpha,
}

/// One fixed-size instruction record understood by the shading VM.
///
/// Jump distances count records, not bytes. All slot operands address the VM stack.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Instr {
    /// Global jump table row; only present at the head of a merged program.
    ShaderJump {
        bump: Option<u32>,
        surface: Option<u32>,
        volume: Option<u32>,
        displacement: Option<u32>,
    },
    End,

    ValueF {
        value: f32,
        out: Slot,
    },
    ValueV {
        value: [f32; 3],
        out: Slot,
    },
    Eval {
        op: EvalOp,
        inputs: Operands,
        outputs: Operands,
    },
    Attribute {
        /// xxh3 of the attribute name.
        key: u64,
        component: AttrComponent,
        out: Slot,
    },

    ClosureSetWeight {
        weight: [f32; 3],
    },
    ClosureWeight {
        color: Slot,
    },
    EmissionWeight {
        color: Slot,
        strength: Option<Slot>,
        strength_value: f32,
    },
    /// Accumulate into the pending closure weight (merged volume closures).
    ClosureAddWeight {
        color: Slot,
    },
    ClosureAddSetWeight {
        weight: [f32; 3],
    },
    Bsdf {
        kind: BsdfKind,
        params: Operands,
        mix_weight: Option<Slot>,
    },
    Emission {
        mix_weight: Option<Slot>,
    },
    Background {
        mix_weight: Option<Slot>,
    },
    Holdout {
        mix_weight: Option<Slot>,
    },
    Volume {
        kind: VolumeKind,
        density: Slot,
        anisotropy: Option<Slot>,
        mix_weight: Option<Slot>,
    },
    MixClosureWeight {
        fac: Slot,
        weight: Slot,
        weight1: Option<Slot>,
        weight2: Option<Slot>,
    },

    SetNormal {
        direction: Slot,
        out: Slot,
    },
    SetBump {
        normal: Option<Slot>,
        distance: Slot,
        center: Slot,
        dx: Slot,
        dy: Slot,
        strength: Slot,
        invert: bool,
        out: Slot,
        state: Option<Slot>,
    },
    EnterBumpEval {
        state: Slot,
    },
    LeaveBumpEval {
        state: Slot,
    },
    SetDisplacement {
        displacement: Slot,
    },

    /// Skip the next `skip` records when the factor is exactly 0.
    JumpIfZero {
        fac: Slot,
        skip: u32,
    },
    /// Skip the next `skip` records when the factor is exactly 1.
    JumpIfOne {
        fac: Slot,
        skip: u32,
    },

    /// Ends evaluation unless AOVs are being written.
    AovStart,
    AovColor {
        color: Slot,
        offset: u32,
    },
    AovValue {
        value: Slot,
        offset: u32,
    },
}

/// Instruction kind, used for the cross-shader usage bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[repr(u8)]
pub enum Opcode {
    ShaderJump,
    End,
    ValueF,
    ValueV,
    Eval,
    Attribute,
    ClosureSetWeight,
    ClosureWeight,
    EmissionWeight,
    ClosureAddWeight,
    ClosureAddSetWeight,
    Bsdf,
    Emission,
    Background,
    Holdout,
    Volume,
    MixClosureWeight,
    SetNormal,
    SetBump,
    EnterBumpEval,
    LeaveBumpEval,
    SetDisplacement,
    JumpIfZero,
    JumpIfOne,
    AovStart,
    AovColor,
    AovValue,
}

impl Opcode {
    pub const ALL: [Opcode; 27] = [
        Self::ShaderJump,
        Self::End,
        Self::ValueF,
        Self::ValueV,
        Self::Eval,
        Self::Attribute,
        Self::ClosureSetWeight,
        Self::ClosureWeight,
        Self::EmissionWeight,
        Self::ClosureAddWeight,
        Self::ClosureAddSetWeight,
        Self::Bsdf,
        Self::Emission,
        Self::Background,
        Self::Holdout,
        Self::Volume,
        Self::MixClosureWeight,
        Self::SetNormal,
        Self::SetBump,
        Self::EnterBumpEval,
        Self::LeaveBumpEval,
        Self::SetDisplacement,
        Self::JumpIfZero,
        Self::JumpIfOne,
        Self::AovStart,
        Self::AovColor,
        Self::AovValue,
    ];

    pub(crate) fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

impl Instr {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::ShaderJump { .. } => Opcode::ShaderJump,
            Self::End => Opcode::End,
            Self::ValueF { .. } => Opcode::ValueF,
            Self::ValueV { .. } => Opcode::ValueV,
            Self::Eval { .. } => Opcode::Eval,
            Self::Attribute { .. } => Opcode::Attribute,
            Self::ClosureSetWeight { .. } => Opcode::ClosureSetWeight,
            Self::ClosureWeight { .. } => Opcode::ClosureWeight,
            Self::EmissionWeight { .. } => Opcode::EmissionWeight,
            Self::ClosureAddWeight { .. } => Opcode::ClosureAddWeight,
            Self::ClosureAddSetWeight { .. } => Opcode::ClosureAddSetWeight,
            Self::Bsdf { .. } => Opcode::Bsdf,
            Self::Emission { .. } => Opcode::Emission,
            Self::Background { .. } => Opcode::Background,
            Self::Holdout { .. } => Opcode::Holdout,
            Self::Volume { .. } => Opcode::Volume,
            Self::MixClosureWeight { .. } => Opcode::MixClosureWeight,
            Self::SetNormal { .. } => Opcode::SetNormal,
            Self::SetBump { .. } => Opcode::SetBump,
            Self::EnterBumpEval { .. } => Opcode::EnterBumpEval,
            Self::LeaveBumpEval { .. } => Opcode::LeaveBumpEval,
            Self::SetDisplacement { .. } => Opcode::SetDisplacement,
            Self::JumpIfZero { .. } => Opcode::JumpIfZero,
            Self::JumpIfOne { .. } => Opcode::JumpIfOne,
            Self::AovStart => Opcode::AovStart,
            Self::AovColor { .. } => Opcode::AovColor,
            Self::AovValue { .. } => Opcode::AovValue,
        }
    }

    /// True for instructions that allocate a closure at runtime.
    pub fn is_closure(&self) -> bool {
        matches!(
            self,
            Self::Bsdf { .. }
                | Self::Emission { .. }
                | Self::Background { .. }
                | Self::Holdout { .. }
                | Self::Volume { .. }
        )
    }
}
