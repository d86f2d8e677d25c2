use super::*;
use crate::foundation::ids::Slot;
use crate::graph::shader_graph::{ShaderGraph, ShaderGraphBuilder};
use crate::graph::socket::SocketValue;
use crate::program::compiled::Variant;
use crate::program::fingerprint::attribute_key;
use crate::program::instr::{AttrComponent, Instr};
use crate::program::usage::OpcodeUsage;

fn absorption(b: &mut ShaderGraphBuilder, color: f32, density: f32) -> NodeId {
    b.add(
        ShaderNode::volume(VolumeKind::Absorption)
            .with_default("Color", SocketValue::Vec3([color; 3]))
            .unwrap()
            .with_default("Density", SocketValue::Float(density))
            .unwrap(),
    )
}

fn add(b: &mut ShaderGraphBuilder, c1: NodeId, c2: NodeId) -> NodeId {
    let a = b.add(ShaderNode::add_closure());
    b.connect(c1, "Volume", a, "Closure1").unwrap();
    b.connect(c2, "Volume", a, "Closure2").unwrap();
    a
}

fn lower_volume(g: &ShaderGraph, root: NodeId) -> (Vec<Instr>, NodeSet) {
    let usage = OpcodeUsage::new();
    let mut cg = Codegen::new(g, Variant::Volume, 255, &usage);
    cg.generate_multi_closure(root, root).unwrap();
    let done = cg.done.clone();
    (cg.finish().instrs, done)
}

fn volumes(instrs: &[Instr]) -> usize {
    instrs
        .iter()
        .filter(|i| matches!(i, Instr::Volume { .. }))
        .count()
}

#[test]
fn signature_ignores_weight_only() {
    let a = ShaderNode::volume(VolumeKind::Absorption);
    let b = ShaderNode::volume(VolumeKind::Absorption)
        .with_default("Color", SocketValue::Vec3([0.1; 3]))
        .unwrap();
    let c = ShaderNode::volume(VolumeKind::Absorption)
        .with_default("Density", SocketValue::Float(2.0))
        .unwrap();
    let s = ShaderNode::volume(VolumeKind::Scatter);

    assert_eq!(VolumeSignature::of(&a), VolumeSignature::of(&b));
    assert_ne!(VolumeSignature::of(&a), VolumeSignature::of(&c));
    assert_ne!(VolumeSignature::of(&a), VolumeSignature::of(&s));
    assert!(VolumeSignature::of(&ShaderNode::emission()).is_none());
}

#[test]
fn equal_volumes_fold_into_one_closure() {
    let mut b = ShaderGraphBuilder::new();
    let v1 = absorption(&mut b, 0.1, 1.0);
    let v2 = absorption(&mut b, 0.2, 1.0);
    let root = add(&mut b, v1, v2);
    let g = b.build().unwrap();

    let (instrs, done) = lower_volume(&g, root);
    assert_eq!(
        instrs,
        vec![
            Instr::ClosureSetWeight { weight: [0.1; 3] },
            Instr::ClosureAddSetWeight { weight: [0.2; 3] },
            Instr::ValueF {
                value: 1.0,
                out: Slot(0)
            },
            Instr::Volume {
                kind: VolumeKind::Absorption,
                density: Slot(0),
                anisotropy: None,
                mix_weight: None,
            },
        ]
    );
    assert!(done.contains(&v1) && done.contains(&v2) && done.contains(&root));
}

#[test]
fn different_densities_stay_separate() {
    let mut b = ShaderGraphBuilder::new();
    let v1 = absorption(&mut b, 0.1, 1.0);
    let v2 = absorption(&mut b, 0.2, 2.0);
    let root = add(&mut b, v1, v2);
    let g = b.build().unwrap();

    let (instrs, _) = lower_volume(&g, root);
    assert_eq!(volumes(&instrs), 2);
    assert_eq!(instrs[0], Instr::ClosureSetWeight { weight: [0.1; 3] });
    assert_eq!(
        instrs[3],
        Instr::ClosureSetWeight { weight: [0.2; 3] }
    );
    assert_eq!(
        instrs[4],
        Instr::ValueF {
            value: 2.0,
            out: Slot(0)
        }
    );
}

#[test]
fn nested_adds_form_one_region() {
    let mut b = ShaderGraphBuilder::new();
    let v1 = absorption(&mut b, 0.1, 1.0);
    let s = b.add(ShaderNode::volume(VolumeKind::Scatter));
    let v3 = absorption(&mut b, 0.3, 1.0);
    let inner = add(&mut b, v1, s);
    let outer = b.add(ShaderNode::add_closure());
    b.connect(inner, "Closure", outer, "Closure1").unwrap();
    b.connect(v3, "Volume", outer, "Closure2").unwrap();
    let g = b.build().unwrap();

    let (instrs, done) = lower_volume(&g, outer);
    assert_eq!(volumes(&instrs), 2);
    assert_eq!(
        &instrs[..2],
        &[
            Instr::ClosureSetWeight { weight: [0.1; 3] },
            Instr::ClosureAddSetWeight { weight: [0.3; 3] },
        ]
    );
    assert!(matches!(
        instrs.last(),
        Some(Instr::Volume {
            kind: VolumeKind::Scatter,
            anisotropy: Some(_),
            ..
        })
    ));
    assert!(done.contains(&inner) && done.contains(&outer));
}

#[test]
fn linked_weights_accumulate_after_their_producers() {
    let mut b = ShaderGraphBuilder::new();
    let a = b.add(ShaderNode::attribute("col"));
    let v1 = absorption(&mut b, 0.1, 1.0);
    let v2 = absorption(&mut b, 0.2, 1.0);
    b.connect(a, "Color", v1, "Color").unwrap();
    let root = add(&mut b, v1, v2);
    let g = b.build().unwrap();

    let usage = OpcodeUsage::new();
    let mut cg = Codegen::new(&g, Variant::Volume, 255, &usage);
    cg.generate_multi_closure(root, root).unwrap();
    assert!(cg.flags.has_volume_attribute_dependency);
    assert!(cg.flags.has_volume_spatial_varying);
    assert_eq!(
        cg.finish().instrs,
        vec![
            Instr::Attribute {
                key: attribute_key("col"),
                component: AttrComponent::Float3,
                out: Slot(0)
            },
            Instr::ClosureWeight { color: Slot(0) },
            Instr::ClosureAddSetWeight { weight: [0.2; 3] },
            Instr::ValueF {
                value: 1.0,
                out: Slot(3)
            },
            Instr::Volume {
                kind: VolumeKind::Absorption,
                density: Slot(3),
                anisotropy: None,
                mix_weight: None,
            },
        ]
    );
}
