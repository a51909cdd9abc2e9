use crate::route::{AddrDecoder, AddrRule};

fn four_ranges() -> AddrDecoder {
    AddrDecoder::new((0..4).map(|i| AddrRule::sized(i << 12, 0x1000)).collect())
        .expect("disjoint ranges")
}

#[test]
fn decodes_each_range() {
    let decoder = four_ranges();
    for (addr, idx) in [(0x0000, 0), (0x0fff, 0), (0x1000, 1), (0x2abc, 2), (0x3ff8, 3)] {
        let hit = decoder.decode(addr);
        assert!(hit.matched, "{:#x} should match", addr);
        assert_eq!(idx, hit.idx);
        assert_eq!(1u64 << idx, hit.onehot);
    }
}

#[test]
fn miss_reports_index_zero_without_match() {
    let decoder = four_ranges();
    let miss = decoder.decode(0x4000);
    assert!(!miss.matched);
    assert_eq!(0, miss.idx);
    assert_eq!(0, miss.onehot);
}

#[test]
fn disabled_slot_never_matches() {
    let decoder = AddrDecoder::new(vec![AddrRule::new(0, 0), AddrRule::sized(0x1000, 0x1000)])
        .expect("a disabled slot overlaps nothing");
    assert!(!decoder.decode(0).matched);
    assert_eq!(1, decoder.decode(0x1004).idx);
}

#[test]
fn non_contiguous_mask_matches_interleaved_addresses() {
    let rule = AddrRule::new(0x10, 0xf00f);
    assert!(rule.matches(0x0010));
    assert!(rule.matches(0xa01f));
    assert!(!rule.matches(0x0020));
}

#[test]
fn overlapping_rules_are_rejected() {
    let err = AddrDecoder::new(vec![AddrRule::sized(0x0000, 0x2000), AddrRule::sized(0x1000, 0x1000)])
        .unwrap_err();
    assert!(err.to_string().contains("overlap"), "{}", err);
}

#[test]
fn base_under_mask_is_rejected() {
    let err = AddrDecoder::new(vec![AddrRule::new(0x1010, 0x0fff)]).unwrap_err();
    assert!(err.to_string().contains("never match"), "{}", err);
}
