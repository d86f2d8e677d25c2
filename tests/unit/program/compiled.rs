use super::*;

#[test]
fn rebase_moves_present_offsets_only() {
    let jt = JumpTable {
        bump: None,
        surface: Some(0),
        volume: Some(4),
        displacement: None,
    };
    let r = jt.rebased(10);
    assert_eq!(r.surface, Some(10));
    assert_eq!(r.volume, Some(14));
    assert_eq!(r.bump, None);
    assert_eq!(r.displacement, None);
}

#[test]
fn set_and_get_address_the_same_entry() {
    let mut jt = JumpTable::default();
    for (i, v) in Variant::ALL.into_iter().enumerate() {
        jt.set(v, Some(i as u32 * 3));
    }
    for (i, v) in Variant::ALL.into_iter().enumerate() {
        assert_eq!(jt.get(v), Some(i as u32 * 3));
    }
    assert_eq!(
        jt.to_instr(),
        Instr::ShaderJump {
            bump: Some(0),
            surface: Some(3),
            volume: Some(6),
            displacement: Some(9),
        }
    );
}

#[test]
fn degraded_status_reports_itself() {
    assert!(!CompileStatus::Compiled.is_degraded());
    assert!(
        CompileStatus::Degraded {
            variants: vec![Variant::Surface]
        }
        .is_degraded()
    );
}
