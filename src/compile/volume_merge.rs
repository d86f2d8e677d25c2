use crate::compile::codegen::{Codegen, CodegenError, NodeSet};
use crate::foundation::ids::{NodeId, OutputRef};
use crate::graph::node::{NodeKind, ShaderNode, VolumeKind};

/// Everything about a volume closure except its weight.
#[derive(Debug, PartialEq)]
struct VolumeSignature {
    kind: VolumeKind,
    inputs: Vec<InputSignature>,
}

#[derive(Debug, PartialEq)]
enum InputSignature {
    Linked(OutputRef),
    Const([u32; 3]),
}

impl VolumeSignature {
    fn of(node: &ShaderNode) -> Option<Self> {
        let NodeKind::Volume(kind) = &node.kind else {
            return None;
        };
        let inputs = node
            .inputs
            .iter()
            .filter(|i| i.name != "Color")
            .map(|i| match i.link {
                Some(link) => InputSignature::Linked(link),
                None => InputSignature::Const(i.default.as_vec3().map(f32::to_bits)),
            })
            .collect();
        Some(Self {
            kind: *kind,
            inputs,
        })
    }
}

enum Step {
    Single(NodeId),
    Group(usize),
}

impl Codegen<'_> {
    /// Compile an add-only region of a volume closure tree, folding volume closures that differ
    /// only by weight into one closure with an accumulated weight.
    pub(crate) fn generate_volume_adds(
        &mut self,
        root: NodeId,
        node: NodeId,
    ) -> Result<(), CodegenError> {
        let mut leaves = Vec::new();
        let mut adds = Vec::new();
        self.collect_add_region(node, &mut leaves, &mut adds);

        let graph = self.graph;
        let mut groups: Vec<(VolumeSignature, Vec<NodeId>)> = Vec::new();
        let mut steps = Vec::new();
        for &leaf in &leaves {
            let n = graph.node(leaf);
            let sig = if self.supports(n) && !self.done.contains(&leaf) {
                VolumeSignature::of(n)
            } else {
                None
            };
            let Some(sig) = sig else {
                steps.push(Step::Single(leaf));
                continue;
            };
            match groups.iter().position(|(s, _)| *s == sig) {
                Some(g) => groups[g].1.push(leaf),
                None => {
                    steps.push(Step::Group(groups.len()));
                    groups.push((sig, vec![leaf]));
                }
            }
        }

        for step in steps {
            match step {
                Step::Single(id) => self.generate_multi_closure(root, id)?,
                Step::Group(g) => match groups[g].1.as_slice() {
                    [single] => self.generate_multi_closure(root, *single)?,
                    members => {
                        tracing::trace!(members = members.len(), "merging volume closures");
                        self.generate_merged_volume(members)?;
                    }
                },
            }
        }

        for add in adds {
            if !self.done.contains(&add) {
                self.finish_node(add);
            }
        }
        Ok(())
    }

    /// Leaves under a run of add combiners, in Closure1-first order.
    fn collect_add_region(&mut self, node: NodeId, leaves: &mut Vec<NodeId>, adds: &mut Vec<NodeId>) {
        let graph = self.graph;
        let n = graph.node(node);
        for name in ["Closure1", "Closure2"] {
            let Some(link) = n.input(name).and_then(|i| i.link) else {
                continue;
            };
            let p = link.node;
            if self.closure_done.contains(&p) || leaves.contains(&p) {
                continue;
            }
            if matches!(graph.node(p).kind, NodeKind::AddClosure) {
                self.closure_done.insert(p);
                adds.push(p);
                self.collect_add_region(p, leaves, adds);
            } else {
                leaves.push(p);
            }
        }
    }

    fn generate_merged_volume(&mut self, members: &[NodeId]) -> Result<(), CodegenError> {
        let graph = self.graph;
        let Some(&first) = members.first() else {
            return Ok(());
        };

        for &m in members {
            for r in graph.input_refs(m) {
                if graph.input(r).is_linked() {
                    let mut deps = NodeSet::new();
                    self.find_dependencies(&mut deps, r, None);
                    self.generate_nodes(&deps)?;
                }
            }
        }

        let lead = graph.node(first);
        self.bind_mix_weight(lead)?;
        for (i, &m) in members.iter().enumerate() {
            if let Err(e) = self.emit_closure_weight(graph.node(m), i > 0) {
                self.mix_weight = None;
                return Err(e);
            }
        }
        let res = self.emit_volume_closure(lead);
        self.mix_weight = None;
        res?;

        for &m in members {
            self.closure_done.insert(m);
            self.record_node_flags(graph.node(m));
            self.finish_node(m);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/volume_merge.rs"]
mod tests;
