use super::*;

#[test]
fn marks_are_idempotent_and_ordered() {
    let usage = OpcodeUsage::new();
    usage.mark(Opcode::JumpIfOne);
    usage.mark(Opcode::End);
    usage.mark(Opcode::End);

    assert!(usage.contains(Opcode::End));
    assert!(!usage.contains(Opcode::Bsdf));
    assert_eq!(usage.used(), vec![Opcode::End, Opcode::JumpIfOne]);
}

#[test]
fn merge_ors_whole_masks() {
    let usage = OpcodeUsage::new();
    usage.merge(0);
    assert_eq!(usage.bits(), 0);
    usage.merge(Opcode::Bsdf.bit() | Opcode::End.bit());
    usage.mark(Opcode::End);
    assert_eq!(usage.used(), vec![Opcode::End, Opcode::Bsdf]);
}

#[test]
fn concurrent_marks_are_all_visible() {
    let usage = OpcodeUsage::new();
    std::thread::scope(|s| {
        for op in Opcode::ALL {
            let usage = &usage;
            s.spawn(move || usage.mark(op));
        }
    });
    assert_eq!(usage.used().len(), Opcode::ALL.len());
}
