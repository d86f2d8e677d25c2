//! Lowering of the closure tree into conditionally skipped regions.
//!
//! A mix combiner becomes `load fac; JumpIfOne; <Closure1>; JumpIfZero; <Closure2>`. Only the
//! nodes a branch needs exclusively go inside its region. Everything else it needs (nodes shared
//! with the other branch, with an enclosing tree or with an active AOV) is emitted once before
//! the first jump.

use crate::compile::codegen::{Codegen, CodegenError, NodeSet};
use crate::foundation::ids::{InputRef, NodeId};
use crate::graph::node::{NodeKind, NodeRole, ShaderNode};
use crate::program::buffer::JumpKind;
use crate::program::compiled::Variant;

impl Codegen<'_> {
    /// Compile the closure subtree at `node`; `root` is the top of the tree being compiled.
    pub(crate) fn generate_multi_closure(
        &mut self,
        root: NodeId,
        node: NodeId,
    ) -> Result<(), CodegenError> {
        if !self.closure_done.insert(node) {
            return Ok(());
        }

        let graph = self.graph;
        let n = graph.node(node);
        match n.role() {
            NodeRole::ClosureCombiner
                if self.variant == Variant::Volume && n.kind == NodeKind::AddClosure =>
            {
                self.generate_volume_adds(root, node)?;
            }
            NodeRole::ClosureCombiner => self.generate_combiner(root, n)?,
            _ => self.generate_closure_node(node)?,
        }

        if !self.done.contains(&node) {
            self.finish_node(node);
        }
        Ok(())
    }

    fn generate_combiner(&mut self, root: NodeId, n: &ShaderNode) -> Result<(), CodegenError> {
        let graph = self.graph;
        let id = n.id();
        let socket = |name: &str| n.input_index(name).map(|socket| InputRef { node: id, socket });

        let (Some(cl1), Some(cl2)) = (socket("Closure1"), socket("Closure2")) else {
            return Err(CodegenError::Malformed(format!(
                "{} lacks closure inputs",
                n.label()
            )));
        };
        let a = graph.producer(cl1);
        let b = graph.producer(cl2);
        if a.is_none() && b.is_none() {
            return Ok(());
        }

        let fac = match socket("Fac") {
            Some(fac) if graph.input(fac).is_linked() => Some(fac),
            Some(fac) => {
                let v = graph.input(fac).default.as_f32();
                if v <= 0.0 {
                    return self.generate_branch(root, a);
                }
                if v >= 1.0 {
                    return self.generate_branch(root, b);
                }
                if a == b {
                    return self.generate_branch(root, a);
                }
                Some(fac)
            }
            None => None,
        };

        let Some(fac) = fac else {
            // Add combiner: both branches always run.
            self.generate_branch(root, a)?;
            return self.generate_branch(root, b);
        };

        if graph.input(fac).is_linked() {
            let mut fac_deps = NodeSet::new();
            self.find_dependencies(&mut fac_deps, fac, None);
            self.generate_nodes(&fac_deps)?;
        }

        let shared = self.shared_dependencies(root, id, cl1, cl2);
        if !shared.is_empty() {
            if let Some(a) = a {
                self.generate_shared_closure_nodes(root, a, &shared)?;
            }
            if let Some(b) = b {
                self.generate_shared_closure_nodes(root, b, &shared)?;
            }
            self.generate_nodes(&shared)?;
        }

        let fac_slot = self.input_slot(fac)?;
        if let Some(a) = a {
            let skip = self.push_jump(JumpKind::IfOne, fac_slot);
            self.generate_multi_closure(root, a)?;
            self.resolve(skip);
        }
        if let Some(b) = b {
            let skip = self.push_jump(JumpKind::IfZero, fac_slot);
            self.generate_multi_closure(root, b)?;
            self.resolve(skip);
        }
        Ok(())
    }

    fn generate_branch(&mut self, root: NodeId, node: Option<NodeId>) -> Result<(), CodegenError> {
        match node {
            Some(node) => self.generate_multi_closure(root, node),
            None => Ok(()),
        }
    }

    /// Nodes both branches of `combiner` may need, which must therefore run unconditionally.
    fn shared_dependencies(
        &self,
        root: NodeId,
        combiner: NodeId,
        cl1: InputRef,
        cl2: InputRef,
    ) -> NodeSet {
        let graph = self.graph;
        let mut d1 = NodeSet::new();
        let mut d2 = NodeSet::new();
        self.find_dependencies(&mut d1, cl1, None);
        self.find_dependencies(&mut d2, cl2, None);

        let mut shared: NodeSet = d1.intersection(&d2).copied().collect();

        // Reached from elsewhere in the enclosing tree without passing through this combiner.
        if root != combiner {
            for r in graph.input_refs(root) {
                let mut root_deps = NodeSet::new();
                self.find_dependencies(&mut root_deps, r, Some(combiner));
                shared.extend(root_deps.intersection(&d1).copied());
                shared.extend(root_deps.intersection(&d2).copied());
            }
        }

        // AOV writes do not depend on which branch is taken.
        if !self.aov_nodes.is_empty() {
            shared.extend(self.aov_nodes.intersection(&d1).copied());
            shared.extend(self.aov_nodes.intersection(&d2).copied());
        }
        shared
    }

    /// Compile closure nodes that landed in the shared set before the branches.
    fn generate_shared_closure_nodes(
        &mut self,
        root: NodeId,
        node: NodeId,
        shared: &NodeSet,
    ) -> Result<(), CodegenError> {
        if shared.contains(&node) {
            return self.generate_multi_closure(root, node);
        }
        let graph = self.graph;
        for r in graph.input_refs(node) {
            let input = graph.input(r);
            if input.ty.is_closure()
                && let Some(link) = input.link
            {
                self.generate_shared_closure_nodes(root, link.node, shared)?;
            }
        }
        Ok(())
    }

    /// Emit a closure leaf (or the non-closure root of the bump and displacement variants)
    /// after its dependencies, with its mix weight bound.
    pub(crate) fn generate_closure_node(&mut self, id: NodeId) -> Result<(), CodegenError> {
        if self.done.contains(&id) {
            return Ok(());
        }
        let graph = self.graph;
        let node = graph.node(id);
        if !self.supports(node) {
            self.finish_node(id);
            return Ok(());
        }

        for r in graph.input_refs(id) {
            if graph.input(r).is_linked() {
                let mut deps = NodeSet::new();
                self.find_dependencies(&mut deps, r, None);
                self.generate_nodes(&deps)?;
            }
        }

        let start = self.buf_len();
        self.bind_mix_weight(node)?;
        let res = self.generate_node_from(id, start);
        self.mix_weight = None;
        res?;

        self.record_closure_flags(node);
        Ok(())
    }

    /// Bind the variant's mix-weight input when it can differ from 1.
    pub(crate) fn bind_mix_weight(&mut self, node: &ShaderNode) -> Result<(), CodegenError> {
        let name = if self.variant == Variant::Volume {
            "VolumeMixWeight"
        } else {
            "SurfaceMixWeight"
        };
        self.mix_weight = None;
        if let Some(socket) = node.input_index(name) {
            let input = &node.inputs[socket as usize];
            if input.is_linked() || input.default.as_f32() != 1.0 {
                let slot = self.input_slot(InputRef {
                    node: node.id(),
                    socket,
                })?;
                self.mix_weight = Some(slot);
            }
        }
        Ok(())
    }

    fn record_closure_flags(&mut self, node: &ShaderNode) {
        if self.variant != Variant::Surface {
            return;
        }
        let bump = self.graph.has_bump(node);
        self.flags.has_surface_transparent |= node.has_surface_transparent();
        self.flags.has_surface_emission |= node.has_surface_emission();
        if node.has_surface_bssrdf() {
            self.flags.has_surface_bssrdf = true;
            self.flags.has_bssrdf_bump |= bump;
        }
        self.flags.has_bump |= bump;
    }

    /// Active AOV outputs plus everything upstream of them.
    pub(crate) fn find_aov_nodes(&mut self) {
        let graph = self.graph;
        let mut aov = NodeSet::new();
        for node in graph.nodes() {
            if let NodeKind::OutputAov {
                offset: Some(_), ..
            } = node.kind
            {
                aov.insert(node.id());
                for r in graph.input_refs(node.id()) {
                    self.find_dependencies(&mut aov, r, None);
                }
            }
        }
        self.aov_nodes = aov;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/closure.rs"]
mod tests;
