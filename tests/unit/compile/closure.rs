use super::*;
use crate::foundation::ids::Slot;
use crate::graph::node::BsdfKind;
use crate::graph::shader_graph::{ShaderGraph, ShaderGraphBuilder};
use crate::graph::socket::SocketValue;
use crate::program::fingerprint::attribute_key;
use crate::program::instr::{AttrComponent, Instr};
use crate::program::usage::OpcodeUsage;
use smallvec::smallvec;

fn lower<'a>(
    g: &'a ShaderGraph,
    usage: &'a OpcodeUsage,
    root: NodeId,
    variant: Variant,
) -> Codegen<'a> {
    let mut cg = Codegen::new(g, variant, 255, usage);
    if variant == Variant::Surface {
        cg.find_aov_nodes();
    }
    cg.generate_multi_closure(root, root).unwrap();
    cg
}

fn lower_surface(g: &ShaderGraph, root: NodeId) -> Vec<Instr> {
    let usage = OpcodeUsage::new();
    lower(g, &usage, root, Variant::Surface).finish().instrs
}

fn attr(out: u16) -> Instr {
    Instr::Attribute {
        key: attribute_key("col"),
        component: AttrComponent::Float3,
        out: Slot(out),
    }
}

fn value(v: f32, out: u16) -> Instr {
    Instr::ValueF {
        value: v,
        out: Slot(out),
    }
}

fn bsdf(kind: BsdfKind, roughness: u16) -> Instr {
    Instr::Bsdf {
        kind,
        params: smallvec![None, Some(Slot(roughness))],
        mix_weight: None,
    }
}

const GREY: Instr = Instr::ClosureSetWeight { weight: [0.8; 3] };

/// attribute -> (diffuse, glossy) -> mix(fac) -> Surface
fn two_lobes(fac: f32) -> (ShaderGraph, NodeId) {
    let mut b = ShaderGraphBuilder::new();
    let a = b.add(ShaderNode::attribute("col"));
    let d = b.add(ShaderNode::bsdf(BsdfKind::Diffuse));
    let s = b.add(ShaderNode::bsdf(BsdfKind::Glossy));
    let m = b.add(ShaderNode::mix_closure(fac));
    b.connect(a, "Color", d, "Color").unwrap();
    b.connect(a, "Color", s, "Color").unwrap();
    b.connect(d, "BSDF", m, "Closure1").unwrap();
    b.connect(s, "BSDF", m, "Closure2").unwrap();
    b.connect(m, "Closure", b.output(), "Surface").unwrap();
    (b.build().unwrap(), m)
}

#[test]
fn mix_hoists_shared_attribute_ahead_of_both_branches() {
    let (g, m) = two_lobes(0.5);
    assert_eq!(
        lower_surface(&g, m),
        vec![
            attr(0),
            value(0.5, 3),
            Instr::JumpIfOne {
                fac: Slot(3),
                skip: 3
            },
            Instr::ClosureWeight { color: Slot(0) },
            value(0.0, 4),
            bsdf(BsdfKind::Diffuse, 4),
            Instr::JumpIfZero {
                fac: Slot(3),
                skip: 3
            },
            Instr::ClosureWeight { color: Slot(0) },
            value(0.5, 4),
            bsdf(BsdfKind::Glossy, 4),
        ]
    );
}

#[test]
fn constant_factor_at_the_ends_keeps_one_branch() {
    let (g, m) = two_lobes(0.0);
    assert_eq!(
        lower_surface(&g, m),
        vec![
            attr(0),
            Instr::ClosureWeight { color: Slot(0) },
            value(0.0, 3),
            bsdf(BsdfKind::Diffuse, 3),
        ]
    );

    let (g, m) = two_lobes(1.0);
    assert_eq!(
        lower_surface(&g, m),
        vec![
            attr(0),
            Instr::ClosureWeight { color: Slot(0) },
            value(0.5, 3),
            bsdf(BsdfKind::Glossy, 3),
        ]
    );
}

#[test]
fn identical_branches_collapse() {
    let mut b = ShaderGraphBuilder::new();
    let d = b.add(ShaderNode::bsdf(BsdfKind::Diffuse));
    let m = b.add(ShaderNode::mix_closure(0.5));
    b.connect(d, "BSDF", m, "Closure1").unwrap();
    b.connect(d, "BSDF", m, "Closure2").unwrap();
    let g = b.build().unwrap();

    assert_eq!(
        lower_surface(&g, m),
        vec![GREY, value(0.0, 0), bsdf(BsdfKind::Diffuse, 0)]
    );
}

#[test]
fn combiner_without_closures_emits_nothing() {
    let mut b = ShaderGraphBuilder::new();
    let m = b.add(ShaderNode::mix_closure(0.5));
    let g = b.build().unwrap();
    let usage = OpcodeUsage::new();
    let cg = lower(&g, &usage, m, Variant::Surface);
    assert!(cg.done.contains(&m));
    assert!(cg.finish().instrs.is_empty());
}

#[test]
fn aov_inputs_are_never_hidden_inside_a_branch() {
    let mut b = ShaderGraphBuilder::new();
    let a = b.add(ShaderNode::attribute("col"));
    let d1 = b.add(ShaderNode::bsdf(BsdfKind::Diffuse));
    let d2 = b.add(ShaderNode::bsdf(BsdfKind::Diffuse));
    let m = b.add(ShaderNode::mix_closure(0.5));
    let aov = b.add(ShaderNode::output_aov("col", true, Some(0)));
    b.connect(a, "Color", d1, "Color").unwrap();
    b.connect(a, "Color", aov, "Color").unwrap();
    b.connect(d1, "BSDF", m, "Closure1").unwrap();
    b.connect(d2, "BSDF", m, "Closure2").unwrap();
    let g = b.build().unwrap();

    let usage = OpcodeUsage::new();
    let cg = lower(&g, &usage, m, Variant::Surface);
    assert_eq!(cg.aov_nodes, NodeSet::from([a, aov]));
    assert_eq!(
        cg.finish().instrs,
        vec![
            attr(0),
            value(0.5, 3),
            Instr::JumpIfOne {
                fac: Slot(3),
                skip: 3
            },
            Instr::ClosureWeight { color: Slot(0) },
            value(0.0, 4),
            bsdf(BsdfKind::Diffuse, 4),
            Instr::JumpIfZero {
                fac: Slot(3),
                skip: 3
            },
            GREY,
            value(0.0, 4),
            bsdf(BsdfKind::Diffuse, 4),
        ]
    );
}

#[test]
fn linked_factor_is_computed_first_and_read_in_place() {
    let mut b = ShaderGraphBuilder::new();
    let f = b.add(ShaderNode::value(0.3));
    let d1 = b.add(ShaderNode::bsdf(BsdfKind::Diffuse));
    let d2 = b.add(ShaderNode::bsdf(BsdfKind::Diffuse));
    let m = b.add(ShaderNode::mix_closure(0.5));
    b.connect(f, "Value", m, "Fac").unwrap();
    b.connect(d1, "BSDF", m, "Closure1").unwrap();
    b.connect(d2, "BSDF", m, "Closure2").unwrap();
    let g = b.build().unwrap();

    assert_eq!(
        lower_surface(&g, m),
        vec![
            value(0.3, 0),
            Instr::JumpIfOne {
                fac: Slot(0),
                skip: 3
            },
            GREY,
            value(0.0, 1),
            bsdf(BsdfKind::Diffuse, 1),
            Instr::JumpIfZero {
                fac: Slot(0),
                skip: 3
            },
            GREY,
            value(0.0, 1),
            bsdf(BsdfKind::Diffuse, 1),
        ]
    );
}

#[test]
fn nodes_needed_outside_a_nested_mix_are_emitted_before_it() {
    let mut b = ShaderGraphBuilder::new();
    let x = b.add(ShaderNode::attribute("col"));
    let d1 = b.add(ShaderNode::bsdf(BsdfKind::Diffuse));
    let d2 = b.add(ShaderNode::bsdf(BsdfKind::Diffuse));
    let d3 = b.add(ShaderNode::bsdf(BsdfKind::Diffuse));
    let inner = b.add(ShaderNode::mix_closure(0.5));
    let add = b.add(ShaderNode::add_closure());
    b.connect(x, "Color", d1, "Color").unwrap();
    b.connect(x, "Color", d3, "Color").unwrap();
    b.connect(d1, "BSDF", inner, "Closure1").unwrap();
    b.connect(d2, "BSDF", inner, "Closure2").unwrap();
    b.connect(inner, "Closure", add, "Closure1").unwrap();
    b.connect(d3, "BSDF", add, "Closure2").unwrap();
    let g = b.build().unwrap();

    let instrs = lower_surface(&g, add);
    let attrs = instrs
        .iter()
        .filter(|i| matches!(i, Instr::Attribute { .. }))
        .count();
    assert_eq!(attrs, 1);
    assert_eq!(
        instrs,
        vec![
            attr(0),
            value(0.5, 3),
            Instr::JumpIfOne {
                fac: Slot(3),
                skip: 3
            },
            Instr::ClosureWeight { color: Slot(0) },
            value(0.0, 4),
            bsdf(BsdfKind::Diffuse, 4),
            Instr::JumpIfZero {
                fac: Slot(3),
                skip: 3
            },
            GREY,
            value(0.0, 4),
            bsdf(BsdfKind::Diffuse, 4),
            Instr::ClosureWeight { color: Slot(0) },
            value(0.0, 3),
            bsdf(BsdfKind::Diffuse, 3),
        ]
    );
}

#[test]
fn mix_weight_binds_only_when_not_one() {
    let mut b = ShaderGraphBuilder::new();
    let d = b.add(
        ShaderNode::bsdf(BsdfKind::Diffuse)
            .with_default("SurfaceMixWeight", SocketValue::Float(0.5))
            .unwrap(),
    );
    let g = b.build().unwrap();

    assert_eq!(
        lower_surface(&g, d),
        vec![
            value(0.5, 0),
            GREY,
            value(0.0, 1),
            Instr::Bsdf {
                kind: BsdfKind::Diffuse,
                params: smallvec![None, Some(Slot(1))],
                mix_weight: Some(Slot(0)),
            },
        ]
    );
}

#[test]
fn emission_folds_constant_strength_into_the_weight() {
    let mut b = ShaderGraphBuilder::new();
    let e = b.add(
        ShaderNode::emission()
            .with_default("Color", SocketValue::Vec3([0.5; 3]))
            .unwrap()
            .with_default("Strength", SocketValue::Float(2.0))
            .unwrap(),
    );
    let g = b.build().unwrap();

    let usage = OpcodeUsage::new();
    let cg = lower(&g, &usage, e, Variant::Surface);
    assert!(cg.flags.has_surface_emission);
    assert_eq!(
        cg.finish().instrs,
        vec![
            Instr::ClosureSetWeight { weight: [1.0; 3] },
            Instr::Emission { mix_weight: None },
        ]
    );
}

#[test]
fn bumped_subsurface_sets_bssrdf_flags() {
    let mut b = ShaderGraphBuilder::new();
    let bump = b.add(ShaderNode::bump(false));
    let sss = b.add(ShaderNode::bsdf(BsdfKind::Subsurface));
    b.connect(bump, "Normal", sss, "Normal").unwrap();
    let g = b.build().unwrap();

    let usage = OpcodeUsage::new();
    let cg = lower(&g, &usage, sss, Variant::Surface);
    assert!(cg.flags.has_surface_bssrdf);
    assert!(cg.flags.has_bssrdf_bump);
    assert!(cg.flags.has_bump);
    assert!(cg.flags.has_surface_spatial_varying);
}

#[test]
fn surface_closures_vanish_from_volume_code() {
    let (g, m) = two_lobes(0.5);
    let usage = OpcodeUsage::new();
    let cg = lower(&g, &usage, m, Variant::Volume);
    assert!(cg.finish().instrs.iter().all(|i| !i.is_closure()));
}
