use crate::foundation::error::{SvmError, SvmResult};
use crate::foundation::ids::{InputRef, NodeId, OutputRef};
use crate::graph::node::{NodeKind, ShaderNode};
use crate::graph::socket::{InputSocket, OutputSocket, SocketType};
use std::collections::BTreeSet;

/// Validated, read-only shader graph consumed by the compiler.
///
/// Nodes live in an arena indexed by [`NodeId`]; the designated output node is created by the
/// builder. The fan-out table (output -> consuming inputs) is derived once at build time.
#[derive(Debug, Clone)]
pub struct ShaderGraph {
    nodes: Vec<ShaderNode>,
    output: NodeId,
    consumers: Vec<Vec<Vec<InputRef>>>,
}

impl ShaderGraph {
    pub fn builder() -> ShaderGraphBuilder {
        ShaderGraphBuilder::new()
    }

    pub fn nodes(&self) -> &[ShaderNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &ShaderNode {
        &self.nodes[id.index()]
    }

    pub fn output(&self) -> &ShaderNode {
        self.node(self.output)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Input of the output node by name (`Surface`, `Volume`, `Displacement`, `Normal`).
    pub fn output_input(&self, name: &str) -> Option<InputRef> {
        let socket = self.output().input_index(name)?;
        Some(InputRef {
            node: self.output,
            socket,
        })
    }

    pub(crate) fn input(&self, r: InputRef) -> &InputSocket {
        &self.node(r.node).inputs[r.socket as usize]
    }

    pub(crate) fn output_socket(&self, r: OutputRef) -> &OutputSocket {
        &self.node(r.node).outputs[r.socket as usize]
    }

    pub(crate) fn producer(&self, r: InputRef) -> Option<NodeId> {
        self.input(r).link.map(|o| o.node)
    }

    pub(crate) fn consumers(&self, r: OutputRef) -> &[InputRef] {
        &self.consumers[r.node.index()][r.socket as usize]
    }

    pub(crate) fn input_refs(&self, node: NodeId) -> impl Iterator<Item = InputRef> + '_ {
        (0..self.node(node).inputs.len()).map(move |i| InputRef {
            node,
            socket: i as u16,
        })
    }

    /// True when anything other than plain geometry drives the node's `Normal` input.
    pub(crate) fn has_bump(&self, node: &ShaderNode) -> bool {
        let Some(normal) = node.input("Normal") else {
            return false;
        };
        match normal.link {
            Some(o) => !matches!(self.node(o.node).kind, NodeKind::Geometry),
            None => false,
        }
    }
}

fn check_link_types(
    out_ty: SocketType,
    in_ty: SocketType,
    output: &str,
    input: &str,
) -> SvmResult<()> {
    if out_ty.is_closure() != in_ty.is_closure() {
        return Err(SvmError::validation(format!(
            "cannot link {out_ty:?} output '{output}' to {in_ty:?} input '{input}'"
        )));
    }
    if out_ty.width() != in_ty.width() {
        return Err(SvmError::validation(format!(
            "{out_ty:?} -> {in_ty:?} link on '{input}' needs a convert node"
        )));
    }
    Ok(())
}

/// Authoring-side builder. `build` is the validation boundary: everything it accepts is
/// acyclic and type-consistent.
#[derive(Debug, Clone)]
pub struct ShaderGraphBuilder {
    nodes: Vec<ShaderNode>,
    output: NodeId,
}

impl Default for ShaderGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderGraphBuilder {
    pub fn new() -> Self {
        let mut b = Self {
            nodes: Vec::new(),
            output: NodeId(0),
        };
        b.output = b.add(ShaderNode::output_node().named("output"));
        b
    }

    /// The output node created with the builder.
    pub fn output(&self) -> NodeId {
        self.output
    }

    pub fn add(&mut self, mut node: ShaderNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.id = id;
        self.nodes.push(node);
        id
    }

    pub fn connect(&mut self, from: NodeId, output: &str, to: NodeId, input: &str) -> SvmResult<()> {
        let src = self.node(from)?;
        let Some(out_idx) = src.output_index(output) else {
            return Err(SvmError::validation(format!(
                "{} has no output '{output}'",
                src.label()
            )));
        };
        let out_ty = src.outputs[out_idx as usize].ty;

        let dst = self.node(to)?;
        let Some(in_idx) = dst.input_index(input) else {
            return Err(SvmError::validation(format!(
                "{} has no input '{input}'",
                dst.label()
            )));
        };
        let socket = &dst.inputs[in_idx as usize];
        if socket.link.is_some() {
            return Err(SvmError::validation(format!(
                "{}.{input} is already linked",
                dst.label()
            )));
        }
        check_link_types(out_ty, socket.ty, output, input)?;

        self.nodes[to.index()].inputs[in_idx as usize].link = Some(OutputRef {
            node: from,
            socket: out_idx,
        });
        Ok(())
    }

    fn node(&self, id: NodeId) -> SvmResult<&ShaderNode> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| SvmError::validation(format!("unknown node id {}", id.0)))
    }

    /// Re-check links stored on the nodes, including any set without [`Self::connect`].
    fn check_links(&self) -> SvmResult<()> {
        for node in &self.nodes {
            for input in &node.inputs {
                let Some(link) = input.link else {
                    continue;
                };
                let src = self.node(link.node)?;
                let Some(out) = src.outputs.get(link.socket as usize) else {
                    return Err(SvmError::validation(format!(
                        "{}.{} links to missing output #{} of {}",
                        node.label(),
                        input.name,
                        link.socket,
                        src.label()
                    )));
                };
                check_link_types(out.ty, input.ty, &out.name, &input.name)?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(nodes = self.nodes.len()))]
    pub fn build(self) -> SvmResult<ShaderGraph> {
        self.check_links()?;
        let n = self.nodes.len();
        let mut consumers: Vec<Vec<Vec<InputRef>>> = self
            .nodes
            .iter()
            .map(|node| vec![Vec::new(); node.outputs.len()])
            .collect();

        // Edges point producer -> consumer.
        let mut indeg = vec![0u32; n];
        let mut outs: Vec<Vec<u32>> = vec![Vec::new(); n];
        for node in &self.nodes {
            for (i, input) in node.inputs.iter().enumerate() {
                let Some(link) = input.link else {
                    continue;
                };
                consumers[link.node.index()][link.socket as usize].push(InputRef {
                    node: node.id,
                    socket: i as u16,
                });
                outs[link.node.index()].push(node.id.0);
                indeg[node.id.index()] = indeg[node.id.index()].saturating_add(1);
            }
        }

        // Kahn with deterministic tie-break on node id.
        let mut ready: BTreeSet<u32> = BTreeSet::new();
        for (i, &d) in indeg.iter().enumerate() {
            if d == 0 {
                ready.insert(i as u32);
            }
        }
        let mut seen = 0usize;
        while let Some(i) = ready.pop_first() {
            seen += 1;
            for &j in &outs[i as usize] {
                let dj = &mut indeg[j as usize];
                *dj = dj.saturating_sub(1);
                if *dj == 0 {
                    ready.insert(j);
                }
            }
        }

        if seen != n {
            let cycle = find_cycle(&self.nodes, &outs);
            if cycle.is_empty() {
                return Err(SvmError::validation("shader graph cycle detected"));
            }
            let path = cycle.join(" -> ");
            return Err(SvmError::validation(format!(
                "shader graph cycle detected: {path}"
            )));
        }

        Ok(ShaderGraph {
            nodes: self.nodes,
            output: self.output,
            consumers,
        })
    }
}

fn find_cycle(nodes: &[ShaderNode], outs: &[Vec<u32>]) -> Vec<String> {
    let n = nodes.len();
    let mut state = vec![0u8; n]; // 0=unvisited,1=visiting,2=done
    let mut stack: Vec<u32> = Vec::new();

    fn dfs(
        v: u32,
        nodes: &[ShaderNode],
        outs: &[Vec<u32>],
        state: &mut [u8],
        stack: &mut Vec<u32>,
    ) -> Option<Vec<String>> {
        state[v as usize] = 1;
        stack.push(v);
        for &to in &outs[v as usize] {
            let st = state[to as usize];
            if st == 0 {
                if let Some(c) = dfs(to, nodes, outs, state, stack) {
                    return Some(c);
                }
            } else if st == 1 {
                let pos = stack.iter().position(|&x| x == to).unwrap_or(0);
                let mut cycle: Vec<String> = stack[pos..]
                    .iter()
                    .map(|&i| nodes[i as usize].label())
                    .collect();
                cycle.push(nodes[to as usize].label());
                return Some(cycle);
            }
        }
        stack.pop();
        state[v as usize] = 2;
        None
    }

    for i in 0..n {
        if state[i] == 0
            && let Some(c) = dfs(i as u32, nodes, outs, &mut state, &mut stack)
        {
            return c;
        }
    }
    Vec::new()
}

#[cfg(test)]
#[path = "../../tests/unit/graph/shader_graph.rs"]
mod tests;
