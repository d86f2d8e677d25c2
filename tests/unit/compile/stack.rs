use super::*;
use proptest::prelude::*;

#[test]
fn first_fit_reuses_the_lowest_hole() {
    let mut s = Stack::new(8);
    let a = s.allocate(3).unwrap();
    let b = s.allocate(1).unwrap();
    let c = s.allocate(3).unwrap();
    assert_eq!((a.offset(), b.offset(), c.offset()), (Slot(0), Slot(3), Slot(4)));

    s.release(a);
    let d = s.allocate(1).unwrap();
    assert_eq!(d.offset(), Slot(0));
    let e = s.allocate(2).unwrap();
    assert_eq!(e.offset(), Slot(1));

    s.release(b);
    s.release(c);
    s.release(d);
    s.release(e);
    assert_eq!(s.used(), 0);
    assert_eq!(s.stats().peak_used, 7);
}

#[test]
fn shared_ranges_stay_live_until_the_last_claim() {
    let mut s = Stack::new(4);
    let a = s.allocate(3).unwrap();
    let alias = s.share(&a);
    s.release(a);
    assert_eq!(s.used(), 3);
    assert!(s.allocate(3).is_err());
    s.release(alias);
    assert_eq!(s.used(), 0);
}

#[test]
fn exhaustion_is_sticky_and_reports_the_request() {
    let mut s = Stack::new(2);
    let err = s.allocate(3).unwrap_err();
    assert!(matches!(
        err,
        CodegenError::StackExhausted {
            requested: 3,
            capacity: 2
        }
    ));
    assert!(s.exhausted());

    let ok = s.allocate(1).unwrap();
    assert!(s.exhausted());
    s.release(ok);
}

#[test]
fn fragmented_stack_rejects_wide_request() {
    let mut s = Stack::new(5);
    let a = s.allocate(1).unwrap();
    let b = s.allocate(1).unwrap();
    let c = s.allocate(1).unwrap();
    s.release(b);
    // Free slots are 1 and 3..5: no run of three.
    assert!(s.allocate(3).is_err());
    s.release(a);
    s.release(c);
}

#[derive(Debug, Clone)]
enum Op {
    Alloc(u16),
    Share(usize),
    Release(usize),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (1u16..=3).prop_map(Op::Alloc),
            any::<usize>().prop_map(Op::Share),
            any::<usize>().prop_map(Op::Release),
        ],
        0..64,
    )
}

proptest! {
    #[test]
    fn live_ranges_never_overlap_and_nothing_leaks(seq in ops()) {
        let mut s = Stack::new(16);
        // Each entry is one live claim.
        let mut live: Vec<SlotRange> = Vec::new();

        for op in seq {
            match op {
                Op::Alloc(w) => {
                    if let Ok(r) = s.allocate(w) {
                        let start = r.offset().0;
                        for other in &live {
                            let o = other.offset().0;
                            let disjoint = start + w <= o || o + other.width() <= start;
                            let same = o == start && other.width() == w;
                            prop_assert!(disjoint, "fresh range overlaps a live one");
                            prop_assert!(!same);
                        }
                        live.push(r);
                    }
                }
                Op::Share(i) if !live.is_empty() => {
                    let i = i % live.len();
                    let alias = s.share(&live[i]);
                    live.push(alias);
                }
                Op::Release(i) if !live.is_empty() => {
                    let i = i % live.len();
                    s.release(live.swap_remove(i));
                }
                _ => {}
            }
        }

        for r in live.drain(..) {
            s.release(r);
        }
        prop_assert_eq!(s.used(), 0);
        let all = s.allocate(16);
        prop_assert!(all.is_ok());
        if let Ok(r) = all {
            s.release(r);
        }
    }
}
