use crate::route::{Bind, BindReject, IdTable};

#[test]
fn free_id_accepts_any_destination() {
    let table: IdTable<usize> = IdTable::new(4, 2);
    assert_eq!(Bind::Accept, table.try_bind(5, 0));
    assert_eq!(Bind::Accept, table.try_bind(5, 3));
    assert_eq!(None, table.lookup(5));
}

#[test]
fn bound_id_rejects_other_destination() {
    let mut table: IdTable<usize> = IdTable::new(4, 4);
    table.bind(5, 1);
    assert_eq!(Bind::Reject(BindReject::Conflict { bound: 1 }), table.try_bind(5, 2));
    assert_eq!(Bind::Accept, table.try_bind(5, 1));
    assert_eq!(Bind::Accept, table.try_bind(6, 2), "other ids are independent");
}

#[test]
fn saturated_id_stalls_even_for_same_destination() {
    let mut table: IdTable<usize> = IdTable::new(2, 2);
    table.bind(1, 0);
    table.bind(1, 0);
    assert_eq!(Bind::Reject(BindReject::Saturated), table.try_bind(1, 0));
    assert_eq!(2, table.pending(1));
    table.retire(1);
    assert!(table.try_bind(1, 0).accepted());
}

#[test]
fn retiring_everything_frees_the_slot() {
    let mut table: IdTable<usize> = IdTable::new(4, 8);
    for _ in 0..5 {
        table.bind(9, 3);
    }
    assert_eq!(5, table.outstanding());
    for _ in 0..5 {
        assert_eq!(3, table.retire(9));
    }
    assert_eq!(0, table.pending(9));
    assert!(table.is_empty());
    assert_eq!(Bind::Accept, table.try_bind(9, 1));
}

#[test]
fn look_bits_alias_high_ids() {
    let mut table: IdTable<usize> = IdTable::new(2, 4);
    table.bind(0b0110, 1);
    assert_eq!(1, table.pending(0b1010), "0b0110 and 0b1010 share the low two bits");
    assert!(!table.try_bind(0b1010, 0).accepted());
}

#[test]
fn stores_arbitrary_bound_values() {
    let mut table: IdTable<u32> = IdTable::new(3, 2);
    table.bind(2, 0xab);
    assert_eq!(Some(0xab), table.lookup(2));
    assert_eq!(0xab, table.retire(2));
}

#[test]
fn clear_drops_all_pending() {
    let mut table: IdTable<usize> = IdTable::new(2, 2);
    table.bind(0, 1);
    table.bind(3, 1);
    table.clear();
    assert!(table.is_empty());
    assert_eq!(0, table.pending(3));
}

#[test]
#[should_panic(expected = "nothing pending")]
fn retire_of_idle_id_panics() {
    let mut table: IdTable<usize> = IdTable::new(2, 2);
    table.retire(1);
}

#[test]
#[should_panic(expected = "after reject")]
fn bind_after_reject_panics() {
    let mut table: IdTable<usize> = IdTable::new(2, 2);
    table.bind(1, 0);
    table.bind(1, 1);
}
