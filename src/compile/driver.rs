use crate::compile::codegen::{Codegen, CodegenError, VariantOutput};
use crate::compile::opts::CompilerOpts;
use crate::compile::stack::BUMP_EVAL_STATE_SIZE;
use crate::compile::summary::{CompileSummary, VariantSummary};
use crate::foundation::ids::ShaderId;
use crate::graph::shader_graph::ShaderGraph;
use crate::program::compiled::{
    CompileStatus, CompiledShader, Diagnostic, JumpTable, Severity, ShaderFlags, Variant,
};
use crate::program::fingerprint::fingerprint_instrs;
use crate::program::instr::{Instr, Opcode};
use crate::program::usage::OpcodeUsage;
use std::time::Instant;

/// How surface displacement is realised.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
pub enum DisplacementMethod {
    /// Shading normal perturbation only.
    #[default]
    Bump,
    /// Geometric displacement only.
    True,
    /// Geometric displacement plus bump for the remaining detail.
    Both,
}

/// One shader of a batch: a validated graph plus the metadata the compiler needs.
#[derive(Debug, Clone)]
pub struct Shader {
    pub id: ShaderId,
    pub name: String,
    pub graph: ShaderGraph,
    pub displacement_method: DisplacementMethod,
    /// Emission is importance sampled.
    pub use_mis: bool,
}

impl Shader {
    pub fn new(id: ShaderId, name: &str, graph: ShaderGraph) -> Self {
        Self {
            id,
            name: name.to_owned(),
            graph,
            displacement_method: DisplacementMethod::default(),
            use_mis: true,
        }
    }

    pub fn with_displacement_method(mut self, method: DisplacementMethod) -> Self {
        self.displacement_method = method;
        self
    }

    pub fn with_mis(mut self, use_mis: bool) -> Self {
        self.use_mis = use_mis;
        self
    }
}

/// Which variants a shader needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VariantPlan {
    pub(crate) bump: bool,
    pub(crate) surface: bool,
    pub(crate) volume: bool,
    pub(crate) displacement: bool,
    /// Bracket the bump variant with saved evaluation state.
    pub(crate) bump_state: bool,
}

impl VariantPlan {
    pub(crate) fn for_shader(shader: &Shader) -> Self {
        let g = &shader.graph;
        let linked = |name: &str| {
            g.output_input(name)
                .is_some_and(|r| g.producer(r).is_some())
        };
        let method = shader.displacement_method;
        let bump = method != DisplacementMethod::True && linked("Surface") && linked("Normal");
        Self {
            bump,
            surface: true,
            volume: linked("Volume"),
            displacement: linked("Displacement") && method != DisplacementMethod::Bump,
            bump_state: bump && method == DisplacementMethod::Both,
        }
    }

    pub(crate) fn wants(&self, v: Variant) -> bool {
        match v {
            Variant::Bump => self.bump,
            Variant::Surface => self.surface,
            Variant::Volume => self.volume,
            Variant::Displacement => self.displacement,
        }
    }

    /// Bump code falls through into surface code instead of terminating.
    fn terminates(&self, v: Variant) -> bool {
        !(v == Variant::Bump && self.surface)
    }
}

fn root_input_name(v: Variant) -> &'static str {
    match v {
        Variant::Bump => "Normal",
        Variant::Surface => "Surface",
        Variant::Volume => "Volume",
        Variant::Displacement => "Displacement",
    }
}

/// Compiles one shader into a self-contained block with a local jump table.
///
/// Holds no per-shader state, so one instance can be shared by every worker of a batch.
#[derive(Debug, Clone, Copy)]
pub struct ShaderCompiler<'a> {
    opts: &'a CompilerOpts,
    usage: &'a OpcodeUsage,
}

impl<'a> ShaderCompiler<'a> {
    pub fn new(opts: &'a CompilerOpts, usage: &'a OpcodeUsage) -> Self {
        Self { opts, usage }
    }

    #[tracing::instrument(skip_all, fields(shader = %shader.name, id = shader.id.0))]
    pub fn compile(&self, shader: &Shader) -> CompiledShader {
        let started = Instant::now();
        let plan = VariantPlan::for_shader(shader);

        let mut instrs: Vec<Instr> = Vec::new();
        let mut jump = JumpTable::default();
        let mut flags = ShaderFlags::default();
        let mut summary = CompileSummary::default();
        let mut diagnostics = Vec::new();
        let mut degraded = Vec::new();

        for variant in Variant::ALL {
            if !plan.wants(variant) {
                continue;
            }
            let t0 = Instant::now();
            let diag = |severity, message| Diagnostic {
                shader: shader.name.clone(),
                variant: Some(variant),
                severity,
                message,
            };

            let (block, peak_stack, closures, failed) =
                match self.compile_variant(shader, variant, &plan) {
                    Ok(out) => {
                        let VariantOutput {
                            instrs: block,
                            flags: vflags,
                            peak_stack,
                            closures,
                            notes,
                        } = out;
                        flags.merge(&vflags);
                        diagnostics.extend(notes.into_iter().map(|(s, m)| diag(s, m)));
                        if closures > self.opts.max_closures {
                            tracing::warn!(
                                variant = variant.as_str(),
                                closures,
                                max = self.opts.max_closures,
                                "closure budget exceeded"
                            );
                            diagnostics.push(diag(
                                Severity::Warning,
                                format!(
                                    "{closures} closures exceed the budget of {}; the runtime drops the rest",
                                    self.opts.max_closures
                                ),
                            ));
                        }
                        (block, peak_stack, closures, false)
                    }
                    Err(e) => {
                        tracing::warn!(variant = variant.as_str(), "variant discarded: {e}");
                        diagnostics.push(diag(Severity::Error, e.to_string()));
                        degraded.push(variant);
                        let block = if plan.terminates(variant) {
                            self.usage.mark(Opcode::End);
                            vec![Instr::End]
                        } else {
                            Vec::new()
                        };
                        (block, 0, 0, true)
                    }
                };

            summary.record(VariantSummary {
                variant,
                instrs: block.len(),
                peak_stack,
                closures,
                time_ms: t0.elapsed().as_secs_f64() * 1000.0,
                degraded: failed,
            });
            jump.set(variant, Some(instrs.len() as u32));
            instrs.extend(block);
        }

        flags.has_bump |= plan.bump;
        summary.time_total_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            instrs = summary.total_instrs,
            peak_stack = summary.peak_stack,
            "compiled shader"
        );

        let status = if degraded.is_empty() {
            CompileStatus::Compiled
        } else {
            CompileStatus::Degraded { variants: degraded }
        };
        let fingerprint = fingerprint_instrs(&instrs);
        CompiledShader {
            shader: shader.id,
            name: shader.name.clone(),
            instrs,
            jump,
            flags,
            use_mis: shader.use_mis,
            summary,
            status,
            diagnostics,
            fingerprint,
        }
    }

    fn compile_variant(
        &self,
        shader: &Shader,
        variant: Variant,
        plan: &VariantPlan,
    ) -> Result<VariantOutput, CodegenError> {
        let graph = &shader.graph;
        let mut cg = Codegen::new(graph, variant, self.opts.stack_capacity(), self.usage);

        let state = if variant == Variant::Bump && plan.bump_state {
            let state = cg.reserve(BUMP_EVAL_STATE_SIZE)?;
            cg.emit(Instr::EnterBumpEval { state });
            cg.bump_state = Some(state);
            Some(state)
        } else {
            None
        };

        if variant == Variant::Surface {
            cg.find_aov_nodes();
        }

        let root_input = graph.output_input(root_input_name(variant));
        let root = root_input.and_then(|r| graph.producer(r));
        match variant {
            Variant::Surface => cg.flags.has_surface = root.is_some(),
            Variant::Volume => cg.flags.has_volume = root.is_some(),
            Variant::Displacement => cg.flags.has_displacement = root.is_some(),
            Variant::Bump => {}
        }

        if let Some(root) = root {
            cg.generate_multi_closure(root, root)?;
        }

        // Output node.
        if variant == Variant::Displacement
            && let Some(r) = root_input
            && graph.input(r).is_linked()
        {
            let displacement = cg.input_slot(r)?;
            cg.emit(Instr::SetDisplacement { displacement });
        }

        if !cg.aov_nodes.is_empty() {
            cg.emit(Instr::AovStart);
            let aov = std::mem::take(&mut cg.aov_nodes);
            cg.generate_nodes(&aov)?;
        }

        if let Some(state) = state {
            cg.emit(Instr::LeaveBumpEval { state });
        }
        if plan.terminates(variant) {
            cg.emit(Instr::End);
        }
        Ok(cg.finish())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/driver.rs"]
mod tests;
