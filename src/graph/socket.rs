use crate::foundation::ids::OutputRef;

/// Value type carried by a socket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum SocketType {
    Float,
    Int,
    Color,
    Vector,
    Point,
    Normal,
    /// Closures are produced as side effects of weight accumulation, never stack resident.
    Closure,
    String,
}

impl SocketType {
    /// Number of stack slots a value of this type occupies.
    pub fn width(self) -> u16 {
        match self {
            Self::Float | Self::Int => 1,
            Self::Color | Self::Vector | Self::Point | Self::Normal => 3,
            Self::Closure | Self::String => 0,
        }
    }

    pub fn is_vector_like(self) -> bool {
        self.width() == 3
    }

    pub fn is_closure(self) -> bool {
        matches!(self, Self::Closure)
    }
}

/// Embedded default constant of an unlinked input.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SocketValue {
    Float(f32),
    Int(i32),
    Vec3([f32; 3]),
    Str(String),
    None,
}

impl SocketValue {
    /// Scalar view of the value; vectors collapse to their average.
    pub fn as_f32(&self) -> f32 {
        match self {
            Self::Float(v) => *v,
            Self::Int(v) => *v as f32,
            Self::Vec3(v) => (v[0] + v[1] + v[2]) / 3.0,
            Self::Str(_) | Self::None => 0.0,
        }
    }

    /// Vector view of the value; scalars splat.
    pub fn as_vec3(&self) -> [f32; 3] {
        match self {
            Self::Vec3(v) => *v,
            other => {
                let s = other.as_f32();
                [s, s, s]
            }
        }
    }
}

/// Input socket of a node: unlinked (default constant) or linked to exactly one output.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSocket {
    pub name: String,
    pub ty: SocketType,
    pub default: SocketValue,
    pub link: Option<OutputRef>,
    /// Compiler-internal input that is always materialised, even when unlinked.
    pub internal: bool,
}

impl InputSocket {
    pub fn new(name: &str, ty: SocketType, default: SocketValue) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            default,
            link: None,
            internal: false,
        }
    }

    pub fn float(name: &str, v: f32) -> Self {
        Self::new(name, SocketType::Float, SocketValue::Float(v))
    }

    pub fn color(name: &str, v: [f32; 3]) -> Self {
        Self::new(name, SocketType::Color, SocketValue::Vec3(v))
    }

    pub fn vector(name: &str, ty: SocketType) -> Self {
        Self::new(name, ty, SocketValue::Vec3([0.0; 3]))
    }

    pub fn closure(name: &str) -> Self {
        Self::new(name, SocketType::Closure, SocketValue::None)
    }

    pub(crate) fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }
}

/// Output socket of a node. Consumers are tracked by the owning graph.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSocket {
    pub name: String,
    pub ty: SocketType,
}

impl OutputSocket {
    pub fn new(name: &str, ty: SocketType) -> Self {
        Self {
            name: name.to_owned(),
            ty,
        }
    }
}
