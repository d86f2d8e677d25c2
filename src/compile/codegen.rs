use crate::compile::stack::{SlotRange, Stack};
use crate::foundation::ids::{InputRef, NodeId, OutputRef, Slot};
use crate::graph::node::{NodeFeatures, ShaderNode};
use crate::graph::shader_graph::ShaderGraph;
use crate::program::buffer::{InstrBuffer, JumpKind, Patch};
use crate::program::compiled::{Severity, ShaderFlags, Variant};
use crate::program::instr::Instr;
use crate::program::usage::OpcodeUsage;
use std::collections::{BTreeMap, BTreeSet};

/// Failure while generating one variant.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CodegenError {
    /// No free run of slots; fatal for the variant being compiled.
    #[error("stack exhausted: no free run of {requested} slots in a stack of {capacity}")]
    StackExhausted { requested: u16, capacity: u16 },

    /// The node cannot be compiled; only that node is skipped.
    #[error("{0}")]
    Malformed(String),
}

/// Node sets are ordered by id so emission never depends on hashing.
pub(crate) type NodeSet = BTreeSet<NodeId>;

pub(crate) fn feature_mask(variant: Variant) -> NodeFeatures {
    match variant {
        Variant::Bump => NodeFeatures::MASK_BUMP,
        Variant::Surface => NodeFeatures::MASK_SURFACE,
        Variant::Volume => NodeFeatures::MASK_VOLUME,
        Variant::Displacement => NodeFeatures::MASK_DISPLACEMENT,
    }
}

/// Result of one successful variant pass.
#[derive(Debug)]
pub(crate) struct VariantOutput {
    pub(crate) instrs: Vec<Instr>,
    pub(crate) flags: ShaderFlags,
    pub(crate) peak_stack: u16,
    pub(crate) closures: u32,
    pub(crate) notes: Vec<(Severity, String)>,
}

/// Mutable state of one variant pass over a graph.
///
/// Everything here is created fresh per variant and dropped at the end, so nothing leaks between
/// variants or shaders.
pub(crate) struct Codegen<'a> {
    pub(crate) graph: &'a ShaderGraph,
    pub(crate) variant: Variant,
    mask: NodeFeatures,
    usage: &'a OpcodeUsage,
    stack: Stack,
    buf: InstrBuffer,
    outputs: BTreeMap<OutputRef, SlotRange>,
    temps: BTreeMap<InputRef, SlotRange>,
    reserved: Vec<SlotRange>,
    pub(crate) done: NodeSet,
    pub(crate) closure_done: NodeSet,
    pub(crate) aov_nodes: NodeSet,
    /// Bound while a closure node is being emitted.
    pub(crate) mix_weight: Option<Slot>,
    pub(crate) bump_state: Option<Slot>,
    pub(crate) flags: ShaderFlags,
    notes: Vec<(Severity, String)>,
}

impl<'a> Codegen<'a> {
    pub(crate) fn new(
        graph: &'a ShaderGraph,
        variant: Variant,
        stack_size: u16,
        usage: &'a OpcodeUsage,
    ) -> Self {
        Self {
            graph,
            variant,
            mask: feature_mask(variant),
            usage,
            stack: Stack::new(stack_size),
            buf: InstrBuffer::new(),
            outputs: BTreeMap::new(),
            temps: BTreeMap::new(),
            reserved: Vec::new(),
            done: NodeSet::new(),
            closure_done: NodeSet::new(),
            aov_nodes: NodeSet::new(),
            mix_weight: None,
            bump_state: None,
            flags: ShaderFlags::default(),
            notes: Vec::new(),
        }
    }

    pub(crate) fn emit(&mut self, instr: Instr) {
        self.buf.push(instr);
    }

    pub(crate) fn push_jump(&mut self, kind: JumpKind, fac: Slot) -> Patch {
        self.buf.push_jump(kind, fac)
    }

    pub(crate) fn buf_len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn resolve(&mut self, patch: Patch) {
        self.buf.resolve(patch);
    }

    pub(crate) fn note(&mut self, severity: Severity, message: String) {
        self.notes.push((severity, message));
    }

    /// Hold a range for the whole pass (bump evaluation state).
    pub(crate) fn reserve(&mut self, width: u16) -> Result<Slot, CodegenError> {
        let range = self.stack.allocate(width)?;
        let slot = range.offset();
        self.reserved.push(range);
        Ok(slot)
    }

    /// Slot holding the value of an input.
    ///
    /// A linked input reads its producer's range. Anything else (unlinked, or a producer that
    /// left no value in this variant) gets a temporary loaded with the default constant.
    pub(crate) fn input_slot(&mut self, r: InputRef) -> Result<Slot, CodegenError> {
        let graph = self.graph;
        let input = graph.input(r);
        if let Some(link) = input.link
            && let Some(range) = self.outputs.get(&link)
        {
            return Ok(range.offset());
        }
        if let Some(range) = self.temps.get(&r) {
            return Ok(range.offset());
        }

        let width = input.ty.width();
        if width == 0 {
            return Err(CodegenError::Malformed(format!(
                "input '{}' of {} carries no stack value",
                input.name,
                graph.node(r.node).label()
            )));
        }
        let range = self.stack.allocate(width)?;
        let out = range.offset();
        if width == 1 {
            self.emit(Instr::ValueF {
                value: input.default.as_f32(),
                out,
            });
        } else {
            self.emit(Instr::ValueV {
                value: input.default.as_vec3(),
                out,
            });
        }
        self.temps.insert(r, range);
        Ok(out)
    }

    /// Like [`Self::input_slot`] but absent for unlinked inputs.
    pub(crate) fn input_slot_if_linked(&mut self, r: InputRef) -> Result<Option<Slot>, CodegenError> {
        if self.graph.input(r).is_linked() {
            self.input_slot(r).map(Some)
        } else {
            Ok(None)
        }
    }

    pub(crate) fn output_slot(&mut self, o: OutputRef) -> Result<Slot, CodegenError> {
        if let Some(range) = self.outputs.get(&o) {
            return Ok(range.offset());
        }
        let graph = self.graph;
        let socket = graph.output_socket(o);
        let width = socket.ty.width();
        if width == 0 {
            return Err(CodegenError::Malformed(format!(
                "output '{}' of {} carries no stack value",
                socket.name,
                graph.node(o.node).label()
            )));
        }
        let range = self.stack.allocate(width)?;
        let slot = range.offset();
        self.outputs.insert(o, range);
        Ok(slot)
    }

    /// Output slot, or absent when nothing reads the output.
    pub(crate) fn output_slot_if_used(&mut self, o: OutputRef) -> Result<Option<Slot>, CodegenError> {
        if self.graph.consumers(o).is_empty() {
            Ok(None)
        } else {
            self.output_slot(o).map(Some)
        }
    }

    /// Make `output` alias the value of `input` without emitting a copy.
    pub(crate) fn link_passthrough(
        &mut self,
        input: InputRef,
        output: OutputRef,
    ) -> Result<(), CodegenError> {
        let graph = self.graph;
        if let Some(link) = graph.input(input).link
            && let Some(src) = self.outputs.get(&link)
        {
            let alias = self.stack.share(src);
            self.outputs.insert(output, alias);
            return Ok(());
        }

        self.input_slot(input)?;
        if let Some(tmp) = self.temps.get(&input) {
            let alias = self.stack.share(tmp);
            self.outputs.insert(output, alias);
        }
        Ok(())
    }

    /// Release producer ranges whose consumers are now all compiled, plus the node's own
    /// outputs that nothing reads.
    pub(crate) fn clear_users(&mut self, node: NodeId) {
        let graph = self.graph;
        for r in graph.input_refs(node) {
            let Some(link) = graph.input(r).link else {
                continue;
            };
            if !self.outputs.contains_key(&link) {
                continue;
            }
            let all_done = graph
                .consumers(link)
                .iter()
                .all(|c| c.node == node || self.done.contains(&c.node));
            if all_done && let Some(range) = self.outputs.remove(&link) {
                self.stack.release(range);
            }
        }

        for i in 0..graph.node(node).outputs.len() {
            let o = OutputRef {
                node,
                socket: i as u16,
            };
            if graph.consumers(o).is_empty()
                && let Some(range) = self.outputs.remove(&o)
            {
                self.stack.release(range);
            }
        }
    }

    /// Release the constants loaded for this node's unlinked inputs.
    pub(crate) fn clear_temporaries(&mut self, node: NodeId) {
        let graph = self.graph;
        for r in graph.input_refs(node) {
            if let Some(range) = self.temps.remove(&r) {
                self.stack.release(range);
            }
        }
    }

    fn discard_outputs(&mut self, node: NodeId) {
        for i in 0..self.graph.node(node).outputs.len() {
            let o = OutputRef {
                node,
                socket: i as u16,
            };
            if let Some(range) = self.outputs.remove(&o) {
                self.stack.release(range);
            }
        }
    }

    pub(crate) fn finish_node(&mut self, id: NodeId) {
        self.done.insert(id);
        self.clear_users(id);
        self.clear_temporaries(id);
    }

    pub(crate) fn supports(&self, node: &ShaderNode) -> bool {
        self.mask.contains(node.features)
    }

    /// Emit one node whose linked producers are already done.
    pub(crate) fn generate_node(&mut self, id: NodeId) -> Result<(), CodegenError> {
        let start = self.buf.len();
        self.generate_node_from(id, start)
    }

    /// Like [`Self::generate_node`]; a skipped node drops everything emitted since `start`.
    pub(crate) fn generate_node_from(
        &mut self,
        id: NodeId,
        start: usize,
    ) -> Result<(), CodegenError> {
        let graph = self.graph;
        let node = graph.node(id);
        if !self.supports(node) {
            tracing::trace!(node = %node.label(), variant = self.variant.as_str(), "filtered");
            self.finish_node(id);
            return Ok(());
        }

        match self.emit_node(node) {
            Ok(()) => self.record_node_flags(node),
            Err(CodegenError::Malformed(msg)) => {
                tracing::warn!(
                    node = %node.label(),
                    variant = self.variant.as_str(),
                    "skipping node: {msg}"
                );
                self.note(Severity::Warning, format!("{}: {msg}", node.label()));
                self.buf.truncate(start);
                self.discard_outputs(id);
            }
            Err(e) => return Err(e),
        }
        self.finish_node(id);
        Ok(())
    }

    pub(crate) fn record_node_flags(&mut self, node: &ShaderNode) {
        match self.variant {
            Variant::Surface => {
                self.flags.has_surface_spatial_varying |= node.has_spatial_varying();
            }
            Variant::Volume => {
                self.flags.has_volume_spatial_varying |= node.has_spatial_varying();
                self.flags.has_volume_attribute_dependency |= node.has_attribute_dependency();
            }
            Variant::Bump | Variant::Displacement => {}
        }
    }

    /// Emit every node of `set` in dependency order, sweeping until nothing is pending.
    pub(crate) fn generate_nodes(&mut self, set: &NodeSet) -> Result<(), CodegenError> {
        let graph = self.graph;
        loop {
            let mut pending = false;
            let mut progressed = false;
            for &id in set {
                if self.done.contains(&id) {
                    continue;
                }
                let ready = graph.node(id).inputs.iter().all(|i| match i.link {
                    Some(l) => self.done.contains(&l.node),
                    None => true,
                });
                if ready {
                    self.generate_node(id)?;
                    progressed = true;
                } else {
                    pending = true;
                }
            }
            if !pending {
                return Ok(());
            }
            if !progressed {
                let stuck: Vec<String> = set
                    .iter()
                    .filter(|&&id| !self.done.contains(&id))
                    .map(|&id| graph.node(id).label())
                    .collect();
                self.note(
                    Severity::Error,
                    format!("unsatisfied dependencies: {}", stuck.join(", ")),
                );
                return Ok(());
            }
        }
    }

    /// Collect every not-yet-compiled node upstream of `input`, stopping at `skip`.
    pub(crate) fn find_dependencies(&self, deps: &mut NodeSet, input: InputRef, skip: Option<NodeId>) {
        let graph = self.graph;
        let Some(node) = graph.producer(input) else {
            return;
        };
        if self.done.contains(&node) || Some(node) == skip || deps.contains(&node) {
            return;
        }
        for r in graph.input_refs(node) {
            self.find_dependencies(deps, r, skip);
        }
        deps.insert(node);
    }

    /// Close the pass and publish its opcodes to the batch usage flags.
    ///
    /// Only called for a pass that succeeded, so discarded variants never flag anything.
    pub(crate) fn finish(self) -> VariantOutput {
        let mut used = 0u64;
        let mut closures = 0u32;
        for instr in self.buf.as_slice() {
            used |= instr.opcode().bit();
            closures += u32::from(instr.is_closure());
        }
        self.usage.merge(used);

        let stats = self.stack.stats();
        tracing::trace!(
            variant = self.variant.as_str(),
            allocations = stats.allocations,
            shares = stats.shares,
            releases = stats.releases,
            peak = stats.peak_used,
            exhausted = self.stack.exhausted(),
            "stack stats"
        );
        VariantOutput {
            instrs: self.buf.into_vec(),
            flags: self.flags,
            peak_stack: stats.peak_used,
            closures,
            notes: self.notes,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/codegen.rs"]
mod tests;
