pub(crate) mod node;
pub(crate) mod shader_graph;
pub(crate) mod socket;
