//! Shading VM compiler.
//!
//! Lowers validated shader node graphs into the flat instruction stream the shading virtual
//! machine executes:
//!
//! - Build a [`ShaderGraph`] with [`ShaderGraphBuilder`]
//! - Compile one [`Shader`] with [`ShaderCompiler`], or a whole batch with [`ShaderManager`]
//! - Hand the resulting [`GlobalProgram`] to the runtime
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod compile;
pub(crate) mod graph;
pub(crate) mod manager;
pub(crate) mod program;

pub use crate::foundation::error::{SvmError, SvmResult};
pub use crate::foundation::ids::{InputRef, NodeId, OutputRef, ShaderId, Slot};

pub use crate::graph::node::{
    BsdfKind, MathOp, NodeFeatures, NodeKind, NodeRole, ShaderNode, VolumeKind,
};
pub use crate::graph::shader_graph::{ShaderGraph, ShaderGraphBuilder};
pub use crate::graph::socket::{InputSocket, OutputSocket, SocketType, SocketValue};

pub use crate::program::buffer::InstrBuffer;
pub use crate::program::compiled::{
    CompileStatus, CompiledShader, Diagnostic, JumpTable, Severity, ShaderFlags, Variant,
};
pub use crate::program::fingerprint::{ProgramFingerprint, fingerprint_instrs};
pub use crate::program::global::{CompileReport, GlobalProgram, ShaderRecord};
pub use crate::program::instr::{AttrComponent, EvalOp, Instr, Opcode, Operands};
pub use crate::program::usage::OpcodeUsage;

pub use crate::compile::driver::{DisplacementMethod, Shader, ShaderCompiler};
pub use crate::compile::opts::CompilerOpts;
pub use crate::compile::summary::{CompileSummary, VariantSummary};
pub use crate::manager::{CancelFlag, ShaderManager};
