use crate::foundation::error::{SvmError, SvmResult};
use crate::foundation::ids::NodeId;
use crate::graph::socket::{InputSocket, OutputSocket, SocketType, SocketValue};

/// Runtime capability bitmask a node needs. A variant only emits nodes whose requirement is a
/// subset of its own mask.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct NodeFeatures(pub u32);

impl NodeFeatures {
    pub const NONE: Self = Self(0);
    pub const BASIC: Self = Self(1 << 0);
    pub const ATTRIBUTE: Self = Self(1 << 1);
    pub const BSDF: Self = Self(1 << 2);
    pub const EMISSION: Self = Self(1 << 3);
    pub const VOLUME: Self = Self(1 << 4);
    pub const BUMP: Self = Self(1 << 5);
    pub const AOV: Self = Self(1 << 6);
    pub const EXTERNAL: Self = Self(1 << 7);

    pub const MASK_BUMP: Self = Self(Self::BASIC.0 | Self::ATTRIBUTE.0 | Self::BUMP.0);
    pub const MASK_DISPLACEMENT: Self = Self(Self::BASIC.0 | Self::ATTRIBUTE.0);
    pub const MASK_SURFACE: Self = Self(
        Self::BASIC.0
            | Self::ATTRIBUTE.0
            | Self::BSDF.0
            | Self::EMISSION.0
            | Self::BUMP.0
            | Self::AOV.0
            | Self::EXTERNAL.0,
    );
    pub const MASK_VOLUME: Self = Self(
        Self::BASIC.0 | Self::ATTRIBUTE.0 | Self::EMISSION.0 | Self::VOLUME.0 | Self::EXTERNAL.0,
    );

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for NodeFeatures {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// How the compiler treats a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Plain,
    Closure,
    ClosureCombiner,
    Output,
    AovOutput,
    BumpMarker,
    PassthroughProxy,
    OpaqueExternal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Minimum,
    Maximum,
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BsdfKind {
    Diffuse,
    Glossy,
    Glass,
    Transparent,
    Subsurface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum VolumeKind {
    Absorption,
    Scatter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Output,
    OutputAov {
        name: String,
        is_color: bool,
        /// Film offset; `None` when the AOV is not written by the film.
        offset: Option<u32>,
    },
    Value(f32),
    Color([f32; 3]),
    Attribute {
        name: String,
    },
    TextureCoordinate,
    Geometry,
    Math(MathOp),
    MixColor,
    Convert {
        from: SocketType,
        to: SocketType,
    },
    Proxy,
    Bump {
        invert: bool,
    },
    SetNormal,
    MixClosureWeight,
    Bsdf(BsdfKind),
    Emission,
    Background,
    Holdout,
    Volume(VolumeKind),
    MixClosure,
    AddClosure,
    /// Foreign node the SVM cannot evaluate.
    External {
        name: String,
    },
}

impl NodeKind {
    pub fn role(&self) -> NodeRole {
        match self {
            Self::Output => NodeRole::Output,
            Self::OutputAov { .. } => NodeRole::AovOutput,
            Self::Bsdf(_) | Self::Emission | Self::Background | Self::Holdout | Self::Volume(_) => {
                NodeRole::Closure
            }
            Self::MixClosure | Self::AddClosure => NodeRole::ClosureCombiner,
            Self::Bump { .. } => NodeRole::BumpMarker,
            Self::Proxy => NodeRole::PassthroughProxy,
            Self::External { .. } => NodeRole::OpaqueExternal,
            _ => NodeRole::Plain,
        }
    }

    fn features(&self) -> NodeFeatures {
        match self {
            Self::Attribute { .. } => NodeFeatures::ATTRIBUTE,
            Self::Bump { .. } | Self::SetNormal => NodeFeatures::BUMP,
            Self::OutputAov { .. } => NodeFeatures::AOV,
            Self::Bsdf(_) | Self::Holdout => NodeFeatures::BSDF,
            Self::Emission | Self::Background => NodeFeatures::EMISSION,
            Self::Volume(_) => NodeFeatures::VOLUME,
            Self::External { .. } => NodeFeatures::EXTERNAL,
            _ => NodeFeatures::BASIC,
        }
    }
}

/// A node of a shader graph: a kind plus its fixed input/output socket sets.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderNode {
    pub(crate) id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub inputs: Vec<InputSocket>,
    pub outputs: Vec<OutputSocket>,
    pub features: NodeFeatures,
}

impl ShaderNode {
    fn new(kind: NodeKind, inputs: Vec<InputSocket>, outputs: Vec<OutputSocket>) -> Self {
        let features = kind.features();
        Self {
            id: NodeId(u32::MAX),
            name: String::new(),
            kind,
            inputs,
            outputs,
            features,
        }
    }

    pub(crate) fn output_node() -> Self {
        Self::new(
            NodeKind::Output,
            vec![
                InputSocket::closure("Surface"),
                InputSocket::closure("Volume"),
                InputSocket::vector("Displacement", SocketType::Vector),
                InputSocket::vector("Normal", SocketType::Normal),
            ],
            vec![],
        )
    }

    pub fn output_aov(name: &str, is_color: bool, offset: Option<u32>) -> Self {
        Self::new(
            NodeKind::OutputAov {
                name: name.to_owned(),
                is_color,
                offset,
            },
            vec![
                InputSocket::color("Color", [0.0; 3]),
                InputSocket::float("Value", 0.0),
            ],
            vec![],
        )
    }

    pub fn value(v: f32) -> Self {
        Self::new(
            NodeKind::Value(v),
            vec![],
            vec![OutputSocket::new("Value", SocketType::Float)],
        )
    }

    pub fn color(rgb: [f32; 3]) -> Self {
        Self::new(
            NodeKind::Color(rgb),
            vec![],
            vec![OutputSocket::new("Color", SocketType::Color)],
        )
    }

    pub fn attribute(name: &str) -> Self {
        Self::new(
            NodeKind::Attribute {
                name: name.to_owned(),
            },
            vec![],
            vec![
                OutputSocket::new("Color", SocketType::Color),
                OutputSocket::new("Vector", SocketType::Vector),
                OutputSocket::new("Fac", SocketType::Float),
                OutputSocket::new("Alpha", SocketType::Float),
            ],
        )
    }

    pub fn texture_coordinate() -> Self {
        Self::new(
            NodeKind::TextureCoordinate,
            vec![],
            vec![
                OutputSocket::new("Generated", SocketType::Vector),
                OutputSocket::new("Normal", SocketType::Normal),
                OutputSocket::new("UV", SocketType::Vector),
                OutputSocket::new("Object", SocketType::Vector),
            ],
        )
    }

    pub fn geometry() -> Self {
        Self::new(
            NodeKind::Geometry,
            vec![],
            vec![
                OutputSocket::new("Position", SocketType::Point),
                OutputSocket::new("Normal", SocketType::Normal),
                OutputSocket::new("Incoming", SocketType::Vector),
            ],
        )
    }

    pub fn math(op: MathOp) -> Self {
        Self::new(
            NodeKind::Math(op),
            vec![
                InputSocket::float("Value1", 0.5),
                InputSocket::float("Value2", 0.5),
            ],
            vec![OutputSocket::new("Value", SocketType::Float)],
        )
    }

    pub fn mix_color(fac: f32) -> Self {
        Self::new(
            NodeKind::MixColor,
            vec![
                InputSocket::float("Fac", fac),
                InputSocket::color("Color1", [0.0; 3]),
                InputSocket::color("Color2", [0.0; 3]),
            ],
            vec![OutputSocket::new("Color", SocketType::Color)],
        )
    }

    pub fn convert(from: SocketType, to: SocketType) -> Self {
        let default = if from.is_vector_like() {
            SocketValue::Vec3([0.0; 3])
        } else if from == SocketType::Int {
            SocketValue::Int(0)
        } else {
            SocketValue::Float(0.0)
        };
        Self::new(
            NodeKind::Convert { from, to },
            vec![InputSocket::new("In", from, default)],
            vec![OutputSocket::new("Out", to)],
        )
    }

    pub fn proxy(ty: SocketType) -> Self {
        let default = if ty.is_vector_like() {
            SocketValue::Vec3([0.0; 3])
        } else {
            SocketValue::Float(0.0)
        };
        Self::new(
            NodeKind::Proxy,
            vec![InputSocket::new("In", ty, default)],
            vec![OutputSocket::new("Out", ty)],
        )
    }

    pub fn bump(invert: bool) -> Self {
        Self::new(
            NodeKind::Bump { invert },
            vec![
                InputSocket::float("SampleCenter", 0.0),
                InputSocket::float("SampleX", 0.0),
                InputSocket::float("SampleY", 0.0),
                InputSocket::vector("Normal", SocketType::Normal),
                InputSocket::float("Strength", 1.0),
                InputSocket::float("Distance", 0.1),
            ],
            vec![OutputSocket::new("Normal", SocketType::Normal)],
        )
    }

    pub fn set_normal() -> Self {
        Self::new(
            NodeKind::SetNormal,
            vec![InputSocket::vector("Direction", SocketType::Vector)],
            vec![OutputSocket::new("Normal", SocketType::Normal)],
        )
    }

    pub fn mix_closure_weight() -> Self {
        Self::new(
            NodeKind::MixClosureWeight,
            vec![
                InputSocket::float("Weight", 1.0),
                InputSocket::float("Fac", 1.0),
            ],
            vec![
                OutputSocket::new("Weight1", SocketType::Float),
                OutputSocket::new("Weight2", SocketType::Float),
            ],
        )
    }

    pub fn bsdf(kind: BsdfKind) -> Self {
        let mut inputs = vec![InputSocket::color("Color", [0.8, 0.8, 0.8])];
        match kind {
            BsdfKind::Transparent => {
                inputs[0].default = SocketValue::Vec3([1.0; 3]);
            }
            BsdfKind::Diffuse => {
                inputs.push(InputSocket::vector("Normal", SocketType::Normal));
                inputs.push(InputSocket::float("Roughness", 0.0));
            }
            BsdfKind::Glossy => {
                inputs.push(InputSocket::vector("Normal", SocketType::Normal));
                inputs.push(InputSocket::float("Roughness", 0.5));
            }
            BsdfKind::Glass => {
                inputs.push(InputSocket::vector("Normal", SocketType::Normal));
                inputs.push(InputSocket::float("Roughness", 0.0));
                inputs.push(InputSocket::float("IOR", 1.45));
            }
            BsdfKind::Subsurface => {
                inputs.push(InputSocket::vector("Normal", SocketType::Normal));
                inputs.push(InputSocket::float("Scale", 1.0));
                inputs.push(InputSocket::color("Radius", [1.0, 0.2, 0.1]));
            }
        }
        inputs.push(InputSocket::float("SurfaceMixWeight", 1.0).internal());
        Self::new(
            NodeKind::Bsdf(kind),
            inputs,
            vec![OutputSocket::new("BSDF", SocketType::Closure)],
        )
    }

    pub fn emission() -> Self {
        Self::new(
            NodeKind::Emission,
            vec![
                InputSocket::color("Color", [0.8, 0.8, 0.8]),
                InputSocket::float("Strength", 10.0),
                InputSocket::float("SurfaceMixWeight", 1.0).internal(),
                InputSocket::float("VolumeMixWeight", 1.0).internal(),
            ],
            vec![OutputSocket::new("Emission", SocketType::Closure)],
        )
    }

    pub fn background() -> Self {
        Self::new(
            NodeKind::Background,
            vec![
                InputSocket::color("Color", [0.8, 0.8, 0.8]),
                InputSocket::float("Strength", 1.0),
                InputSocket::float("SurfaceMixWeight", 1.0).internal(),
            ],
            vec![OutputSocket::new("Background", SocketType::Closure)],
        )
    }

    pub fn holdout() -> Self {
        Self::new(
            NodeKind::Holdout,
            vec![InputSocket::float("SurfaceMixWeight", 1.0).internal()],
            vec![OutputSocket::new("Holdout", SocketType::Closure)],
        )
    }

    pub fn volume(kind: VolumeKind) -> Self {
        let mut inputs = vec![
            InputSocket::color("Color", [0.8, 0.8, 0.8]),
            InputSocket::float("Density", 1.0),
        ];
        if kind == VolumeKind::Scatter {
            inputs.push(InputSocket::float("Anisotropy", 0.0));
        }
        inputs.push(InputSocket::float("VolumeMixWeight", 1.0).internal());
        Self::new(
            NodeKind::Volume(kind),
            inputs,
            vec![OutputSocket::new("Volume", SocketType::Closure)],
        )
    }

    pub fn mix_closure(fac: f32) -> Self {
        Self::new(
            NodeKind::MixClosure,
            vec![
                InputSocket::float("Fac", fac),
                InputSocket::closure("Closure1"),
                InputSocket::closure("Closure2"),
            ],
            vec![OutputSocket::new("Closure", SocketType::Closure)],
        )
    }

    pub fn add_closure() -> Self {
        Self::new(
            NodeKind::AddClosure,
            vec![
                InputSocket::closure("Closure1"),
                InputSocket::closure("Closure2"),
            ],
            vec![OutputSocket::new("Closure", SocketType::Closure)],
        )
    }

    pub fn external(name: &str, inputs: Vec<InputSocket>, outputs: Vec<OutputSocket>) -> Self {
        Self::new(
            NodeKind::External {
                name: name.to_owned(),
            },
            inputs,
            outputs,
        )
    }

    /// Set a display name used in diagnostics.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    /// Replace the default constant of an input.
    pub fn with_default(mut self, input: &str, value: SocketValue) -> SvmResult<Self> {
        let Some(idx) = self.input_index(input) else {
            return Err(SvmError::validation(format!(
                "node {:?} has no input '{input}'",
                self.kind
            )));
        };
        self.inputs[idx as usize].default = value;
        Ok(self)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn role(&self) -> NodeRole {
        self.kind.role()
    }

    pub fn input_index(&self, name: &str) -> Option<u16> {
        self.inputs
            .iter()
            .position(|s| s.name == name)
            .map(|i| i as u16)
    }

    pub fn output_index(&self, name: &str) -> Option<u16> {
        self.outputs
            .iter()
            .position(|s| s.name == name)
            .map(|i| i as u16)
    }

    pub fn input(&self, name: &str) -> Option<&InputSocket> {
        self.inputs.iter().find(|s| s.name == name)
    }

    pub(crate) fn label(&self) -> String {
        if self.name.is_empty() {
            format!("{:?}#{}", self.kind, self.id.0)
        } else {
            format!("{}#{}", self.name, self.id.0)
        }
    }

    pub(crate) fn has_spatial_varying(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Attribute { .. }
                | NodeKind::TextureCoordinate
                | NodeKind::Geometry
                | NodeKind::Bump { .. }
        )
    }

    pub(crate) fn has_attribute_dependency(&self) -> bool {
        matches!(self.kind, NodeKind::Attribute { .. })
    }

    pub(crate) fn has_surface_transparent(&self) -> bool {
        matches!(self.kind, NodeKind::Bsdf(BsdfKind::Transparent))
    }

    pub(crate) fn has_surface_bssrdf(&self) -> bool {
        matches!(self.kind, NodeKind::Bsdf(BsdfKind::Subsurface))
    }

    pub(crate) fn has_surface_emission(&self) -> bool {
        matches!(self.kind, NodeKind::Emission)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/node.rs"]
mod tests;
