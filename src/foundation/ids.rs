/// Stable per-graph node handle (index into the graph's node arena).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a shader inside a batch; also its row in the global jump table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ShaderId(pub u32);

/// Reference to one output socket of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    /// Producing node.
    pub node: NodeId,
    /// Output index on that node.
    pub socket: u16,
}

/// Reference to one input socket of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputRef {
    /// Consuming node.
    pub node: NodeId,
    /// Input index on that node.
    pub socket: u16,
}

/// First slot of a stack range, as encoded into instructions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Slot(pub u16);
