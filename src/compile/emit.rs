use crate::compile::codegen::{Codegen, CodegenError};
use crate::foundation::ids::{InputRef, OutputRef, Slot};
use crate::graph::node::{NodeKind, NodeRole, ShaderNode, VolumeKind};
use crate::program::fingerprint::attribute_key;
use crate::program::instr::{AttrComponent, EvalOp, Instr, Operands};
use smallvec::smallvec;

impl Codegen<'_> {
    fn in_ref(&self, node: &ShaderNode, name: &str) -> Result<InputRef, CodegenError> {
        node.input_index(name)
            .map(|socket| InputRef {
                node: node.id(),
                socket,
            })
            .ok_or_else(|| {
                CodegenError::Malformed(format!("{} has no input '{name}'", node.label()))
            })
    }

    fn out_ref(&self, node: &ShaderNode, name: &str) -> Result<OutputRef, CodegenError> {
        node.output_index(name)
            .map(|socket| OutputRef {
                node: node.id(),
                socket,
            })
            .ok_or_else(|| {
                CodegenError::Malformed(format!("{} has no output '{name}'", node.label()))
            })
    }

    fn slot_in(&mut self, node: &ShaderNode, name: &str) -> Result<Slot, CodegenError> {
        let r = self.in_ref(node, name)?;
        self.input_slot(r)
    }

    fn slot_out(&mut self, node: &ShaderNode, name: &str) -> Result<Slot, CodegenError> {
        let o = self.out_ref(node, name)?;
        self.output_slot(o)
    }

    /// Lower one node into instructions. Closure combiners and the output node are handled by
    /// the closure compiler and the driver; they emit nothing here.
    pub(crate) fn emit_node(&mut self, node: &ShaderNode) -> Result<(), CodegenError> {
        match node.role() {
            NodeRole::Output | NodeRole::ClosureCombiner => Ok(()),
            NodeRole::Closure => self.emit_closure(node),
            NodeRole::PassthroughProxy => {
                let input = self.in_ref(node, "In")?;
                let output = self.out_ref(node, "Out")?;
                self.link_passthrough(input, output)
            }
            NodeRole::OpaqueExternal => Err(CodegenError::Malformed(format!(
                "opaque node {} has no SVM lowering",
                node.label()
            ))),
            NodeRole::AovOutput | NodeRole::BumpMarker | NodeRole::Plain => {
                self.emit_value_node(node)
            }
        }
    }

    fn emit_value_node(&mut self, node: &ShaderNode) -> Result<(), CodegenError> {
        match &node.kind {
            NodeKind::OutputAov {
                is_color, offset, ..
            } => {
                let Some(offset) = *offset else {
                    return Ok(());
                };
                if *is_color {
                    let color = self.slot_in(node, "Color")?;
                    self.emit(Instr::AovColor { color, offset });
                } else {
                    let value = self.slot_in(node, "Value")?;
                    self.emit(Instr::AovValue { value, offset });
                }
            }
            NodeKind::Value(v) => {
                let out = self.slot_out(node, "Value")?;
                self.emit(Instr::ValueF { value: *v, out });
            }
            NodeKind::Color(rgb) => {
                let out = self.slot_out(node, "Color")?;
                self.emit(Instr::ValueV { value: *rgb, out });
            }
            NodeKind::Attribute { name } => {
                let key = attribute_key(name);
                for (socket, component) in [
                    ("Color", AttrComponent::Float3),
                    ("Vector", AttrComponent::Float3),
                    ("Fac", AttrComponent::Float),
                    ("Alpha", AttrComponent::Alpha),
                ] {
                    let o = self.out_ref(node, socket)?;
                    if let Some(out) = self.output_slot_if_used(o)? {
                        self.emit(Instr::Attribute {
                            key,
                            component,
                            out,
                        });
                    }
                }
            }
            NodeKind::TextureCoordinate => self.emit_eval_outputs(node, EvalOp::TextureCoordinate)?,
            NodeKind::Geometry => self.emit_eval_outputs(node, EvalOp::Geometry)?,
            NodeKind::Math(op) => {
                let a = self.slot_in(node, "Value1")?;
                let b = self.slot_in(node, "Value2")?;
                let out = self.slot_out(node, "Value")?;
                self.emit(Instr::Eval {
                    op: EvalOp::Math(*op),
                    inputs: smallvec![Some(a), Some(b)],
                    outputs: smallvec![Some(out)],
                });
            }
            NodeKind::MixColor => {
                let fac = self.slot_in(node, "Fac")?;
                let c1 = self.slot_in(node, "Color1")?;
                let c2 = self.slot_in(node, "Color2")?;
                let out = self.slot_out(node, "Color")?;
                self.emit(Instr::Eval {
                    op: EvalOp::MixColor,
                    inputs: smallvec![Some(fac), Some(c1), Some(c2)],
                    outputs: smallvec![Some(out)],
                });
            }
            NodeKind::Convert { from, to } => {
                let input = self.in_ref(node, "In")?;
                let output = self.out_ref(node, "Out")?;
                if from == to || (from.is_vector_like() && to.is_vector_like()) {
                    self.link_passthrough(input, output)?;
                } else {
                    let src = self.input_slot(input)?;
                    let out = self.output_slot(output)?;
                    self.emit(Instr::Eval {
                        op: EvalOp::Convert {
                            from: *from,
                            to: *to,
                        },
                        inputs: smallvec![Some(src)],
                        outputs: smallvec![Some(out)],
                    });
                }
            }
            NodeKind::Bump { invert } => {
                let normal_in = self.in_ref(node, "Normal")?;
                let normal = self.input_slot_if_linked(normal_in)?;
                let distance = self.slot_in(node, "Distance")?;
                let center = self.slot_in(node, "SampleCenter")?;
                let dx = self.slot_in(node, "SampleX")?;
                let dy = self.slot_in(node, "SampleY")?;
                let strength = self.slot_in(node, "Strength")?;
                let out = self.slot_out(node, "Normal")?;
                self.emit(Instr::SetBump {
                    normal,
                    distance,
                    center,
                    dx,
                    dy,
                    strength,
                    invert: *invert,
                    out,
                    state: self.bump_state,
                });
            }
            NodeKind::SetNormal => {
                let direction = self.slot_in(node, "Direction")?;
                let out = self.slot_out(node, "Normal")?;
                self.emit(Instr::SetNormal { direction, out });
            }
            NodeKind::MixClosureWeight => {
                let fac = self.slot_in(node, "Fac")?;
                let weight = self.slot_in(node, "Weight")?;
                let w1 = self.out_ref(node, "Weight1")?;
                let w2 = self.out_ref(node, "Weight2")?;
                let weight1 = self.output_slot_if_used(w1)?;
                let weight2 = self.output_slot_if_used(w2)?;
                self.emit(Instr::MixClosureWeight {
                    fac,
                    weight,
                    weight1,
                    weight2,
                });
            }
            _ => {
                return Err(CodegenError::Malformed(format!(
                    "{} does not produce stack values",
                    node.label()
                )));
            }
        }
        Ok(())
    }

    fn emit_eval_outputs(&mut self, node: &ShaderNode, op: EvalOp) -> Result<(), CodegenError> {
        let mut outputs = Operands::new();
        for i in 0..node.outputs.len() {
            let o = OutputRef {
                node: node.id(),
                socket: i as u16,
            };
            outputs.push(self.output_slot_if_used(o)?);
        }
        self.emit(Instr::Eval {
            op,
            inputs: Operands::new(),
            outputs,
        });
        Ok(())
    }

    fn emit_closure(&mut self, node: &ShaderNode) -> Result<(), CodegenError> {
        match &node.kind {
            NodeKind::Bsdf(kind) => {
                self.emit_closure_weight(node, false)?;
                let mut params = Operands::new();
                for (i, input) in node.inputs.iter().enumerate() {
                    if input.internal || input.name == "Color" {
                        continue;
                    }
                    let r = InputRef {
                        node: node.id(),
                        socket: i as u16,
                    };
                    let slot = if input.name == "Normal" {
                        self.input_slot_if_linked(r)?
                    } else {
                        Some(self.input_slot(r)?)
                    };
                    params.push(slot);
                }
                self.emit(Instr::Bsdf {
                    kind: *kind,
                    params,
                    mix_weight: self.mix_weight,
                });
            }
            NodeKind::Emission => {
                self.emit_emission_weight(node)?;
                self.emit(Instr::Emission {
                    mix_weight: self.mix_weight,
                });
            }
            NodeKind::Background => {
                self.emit_emission_weight(node)?;
                self.emit(Instr::Background {
                    mix_weight: self.mix_weight,
                });
            }
            NodeKind::Holdout => {
                self.emit(Instr::ClosureSetWeight { weight: [1.0; 3] });
                self.emit(Instr::Holdout {
                    mix_weight: self.mix_weight,
                });
            }
            NodeKind::Volume(_) => {
                self.emit_closure_weight(node, false)?;
                self.emit_volume_closure(node)?;
            }
            _ => {
                return Err(CodegenError::Malformed(format!(
                    "{} is not a closure",
                    node.label()
                )));
            }
        }
        Ok(())
    }

    /// Closure weight from the `Color` input; `accumulate` adds onto the pending weight instead
    /// of replacing it.
    pub(crate) fn emit_closure_weight(
        &mut self,
        node: &ShaderNode,
        accumulate: bool,
    ) -> Result<(), CodegenError> {
        let r = self.in_ref(node, "Color")?;
        let input = &node.inputs[r.socket as usize];
        if input.is_linked() {
            let color = self.input_slot(r)?;
            self.emit(if accumulate {
                Instr::ClosureAddWeight { color }
            } else {
                Instr::ClosureWeight { color }
            });
        } else {
            let weight = input.default.as_vec3();
            self.emit(if accumulate {
                Instr::ClosureAddSetWeight { weight }
            } else {
                Instr::ClosureSetWeight { weight }
            });
        }
        Ok(())
    }

    fn emit_emission_weight(&mut self, node: &ShaderNode) -> Result<(), CodegenError> {
        let color_in = self.in_ref(node, "Color")?;
        let strength_in = self.in_ref(node, "Strength")?;
        let color = &node.inputs[color_in.socket as usize];
        let strength = &node.inputs[strength_in.socket as usize];
        let strength_value = strength.default.as_f32();

        if color.is_linked() || strength.is_linked() {
            let color = self.input_slot(color_in)?;
            let strength = self.input_slot_if_linked(strength_in)?;
            self.emit(Instr::EmissionWeight {
                color,
                strength,
                strength_value,
            });
        } else {
            let c = color.default.as_vec3();
            self.emit(Instr::ClosureSetWeight {
                weight: c.map(|v| v * strength_value),
            });
        }
        Ok(())
    }

    /// Volume closure instruction, reading the weight accumulated before it.
    pub(crate) fn emit_volume_closure(&mut self, node: &ShaderNode) -> Result<(), CodegenError> {
        let &NodeKind::Volume(kind) = &node.kind else {
            return Err(CodegenError::Malformed(format!(
                "{} is not a volume closure",
                node.label()
            )));
        };
        let density = self.slot_in(node, "Density")?;
        let anisotropy = match kind {
            VolumeKind::Scatter => Some(self.slot_in(node, "Anisotropy")?),
            VolumeKind::Absorption => None,
        };
        self.emit(Instr::Volume {
            kind,
            density,
            anisotropy,
            mix_weight: self.mix_weight,
        });
        Ok(())
    }
}
