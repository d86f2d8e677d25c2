use super::*;
use crate::compile::driver::{Shader, ShaderCompiler};
use crate::compile::opts::CompilerOpts;
use crate::foundation::ids::ShaderId;
use crate::graph::node::{BsdfKind, ShaderNode};
use crate::graph::shader_graph::{ShaderGraph, ShaderGraphBuilder};
use crate::program::compiled::CompileStatus;
use crate::program::instr::Instr;
use crate::program::usage::OpcodeUsage;

fn surface(node: ShaderNode, out: &str) -> ShaderGraph {
    let mut b = ShaderGraphBuilder::new();
    let n = b.add(node);
    b.connect(n, out, b.output(), "Surface").unwrap();
    b.build().unwrap()
}

fn compile_batch(shaders: &[Shader], opts: &CompilerOpts) -> GlobalProgram {
    let usage = OpcodeUsage::new();
    let compiler = ShaderCompiler::new(opts, &usage);
    let compiled = shaders.iter().map(|s| compiler.compile(s)).collect();
    assemble(compiled, usage.bits(), 0.0)
}

fn pair(mis: bool) -> Vec<Shader> {
    vec![
        Shader::new(
            ShaderId(0),
            "diffuse",
            surface(ShaderNode::bsdf(BsdfKind::Diffuse), "BSDF"),
        ),
        Shader::new(ShaderId(1), "lamp", surface(ShaderNode::emission(), "Emission"))
            .with_mis(mis),
    ]
}

#[test]
fn jump_rows_point_past_the_table() {
    let p = compile_batch(&pair(true), &CompilerOpts::default());

    assert_eq!(p.len(), 2 + 4 + 3);
    assert_eq!(
        p.instrs[0],
        Instr::ShaderJump {
            bump: None,
            surface: Some(2),
            volume: None,
            displacement: None,
        }
    );
    assert_eq!(
        p.instrs[1],
        Instr::ShaderJump {
            bump: None,
            surface: Some(6),
            volume: None,
            displacement: None,
        }
    );
    assert_eq!(p.jump(1).and_then(|j| j.surface), Some(6));
    assert!(matches!(p.instrs[6], Instr::ClosureSetWeight { .. }));
    assert_eq!(p.instrs[5], Instr::End);
    assert_eq!(p.instrs[8], Instr::End);
    assert!(p.uses(Opcode::ShaderJump));
    assert!(p.uses(Opcode::Emission));
}

#[test]
fn emissive_list_respects_mis() {
    let p = compile_batch(&pair(true), &CompilerOpts::default());
    assert_eq!(p.emissive_shaders, vec![ShaderId(1)]);

    let p = compile_batch(&pair(false), &CompilerOpts::default());
    assert!(p.emissive_shaders.is_empty());
    assert!(p.shaders[1].flags.has_surface_emission);
}

#[test]
fn report_counts_degraded_shaders() {
    let opts = CompilerOpts {
        stack_size: 1,
        ..CompilerOpts::default()
    };
    let p = compile_batch(&pair(true), &opts);
    assert_eq!(p.report.shaders, 2);
    // A single slot still fits a constant roughness.
    assert_eq!(p.report.degraded, 0);

    let mut b = ShaderGraphBuilder::new();
    let c = b.add(ShaderNode::color([1.0; 3]));
    let d = b.add(ShaderNode::bsdf(BsdfKind::Diffuse));
    b.connect(c, "Color", d, "Color").unwrap();
    b.connect(d, "BSDF", b.output(), "Surface").unwrap();
    let starved = Shader::new(ShaderId(2), "starved", b.build().unwrap());
    let mut shaders = pair(true);
    shaders.push(starved);

    let p = compile_batch(&shaders, &opts);
    assert_eq!(p.report.degraded, 1);
    assert!(p.shaders[2].status.is_degraded());
    assert_eq!(p.shaders[0].status, CompileStatus::Compiled);
    assert_eq!(p.report.diagnostics.len(), 1);
    assert_eq!(p.instrs.last(), Some(&Instr::End));
}

#[test]
fn empty_batch_is_an_empty_program() {
    let p = assemble(Vec::new(), 0, 0.0);
    assert!(p.is_empty());
    assert!(p.shaders.is_empty());
    assert_eq!(p.usage, 0);
    assert_eq!(p.report.shaders, 0);
}

#[test]
fn dump_marks_each_shader_block() {
    let p = compile_batch(&pair(true), &CompilerOpts::default());
    let dump = p.dump();
    assert!(dump.starts_with("program shaders=2 instrs=9"));
    assert!(dump.contains("; diffuse\n00002"));
    assert!(dump.contains("; lamp\n00006"));
}
