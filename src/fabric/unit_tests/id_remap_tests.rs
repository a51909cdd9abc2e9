use crate::base::behavior::ModuleBehaviors;
use crate::fabric::{IdRemap, IdRemapConfig};
use crate::protocol::{connect, AxReq, BResp, MasterPort, RBeat, Resp, SlavePort, WBeat};

struct Bench {
    remap: IdRemap,
    req: MasterPort,
    rsp: SlavePort,
}

impl Bench {
    fn new(max_trans: u32) -> Self {
        let mut remap = IdRemap::new(
            "remap",
            IdRemapConfig {
                slv_id_width: 8,
                mst_id_width: 4,
                max_trans,
            },
        )
        .expect("valid config");
        let mut req = MasterPort::default();
        let mut rsp = SlavePort::default();
        connect(&mut req, &mut remap.slave, 1);
        connect(&mut remap.master, &mut rsp, 1);
        Self { remap, req, rsp }
    }

    fn tick(&mut self, n: usize) {
        for _ in 0..n {
            self.remap.tick_one();
        }
    }
}

#[test]
fn write_id_is_truncated_and_restored() {
    let mut tb = Bench::new(2);
    assert!(tb.req.aw.put(AxReq::new(0xa5, 0x1000, 0)));
    assert!(tb.req.w.put(WBeat::new(1, true)));
    tb.tick(1);
    assert_eq!(0x5, tb.rsp.aw.get().expect("downstream write").id);
    assert!(tb.rsp.w.get().expect("data passes through").last);
    assert!(tb.rsp.b.put(BResp::new(0x5, Resp::Okay)));
    tb.tick(1);
    assert_eq!(0xa5, tb.req.b.get().expect("restored response").id);
    assert_eq!((0, 0), tb.remap.outstanding());
}

#[test]
fn every_wide_id_round_trips_through_a_free_slot() {
    let mut tb = Bench::new(1);
    for wide in [0x00u32, 0x1f, 0xf3, 0x80, 0xff, 0x4c] {
        assert!(tb.req.ar.put(AxReq::new(wide, 0, 0)));
        tb.tick(1);
        let down = tb.rsp.ar.get().expect("downstream read");
        assert_eq!(wide & 0xf, down.id);
        assert!(tb.rsp.r.put(RBeat::new(down.id, 0, Resp::Okay, true)));
        tb.tick(1);
        assert_eq!(wide, tb.req.r.get().expect("restored read").id);
    }
}

#[test]
fn conflicting_high_bits_wait_for_retirement() {
    let mut tb = Bench::new(2);
    assert!(tb.req.ar.put(AxReq::new(0x35, 0, 0)));
    tb.tick(1);
    assert_eq!(0x5, tb.rsp.ar.get().expect("first").id);

    assert!(tb.req.ar.put(AxReq::new(0x46, 0, 0)));
    tb.tick(1);
    assert_eq!(0x6, tb.rsp.ar.get().expect("other slot is free").id);

    assert!(tb.req.ar.put(AxReq::new(0x75, 0, 0)));
    tb.tick(3);
    assert!(tb.rsp.ar.peek().is_none(), "0x75 shares slot 5 with 0x35");
    assert!(tb.remap.stats().ar_id_stalls > 0);

    assert!(tb.rsp.r.put(RBeat::new(0x5, 0, Resp::Okay, true)));
    tb.tick(1);
    assert_eq!(0x35, tb.req.r.get().expect("first completes").id);
    assert!(tb.rsp.ar.peek().is_none());
    tb.tick(1);
    assert_eq!(0x5, tb.rsp.ar.get().expect("released").id);
}

#[test]
fn burst_keeps_its_slot_until_last_beat() {
    let mut tb = Bench::new(2);
    assert!(tb.req.ar.put(AxReq::new(0x92, 0, 1)));
    tb.tick(1);
    assert!(tb.rsp.ar.get().is_some());
    assert!(tb.rsp.r.put(RBeat::new(0x2, 0, Resp::Okay, false)));
    tb.tick(1);
    let first = tb.req.r.get().expect("first beat");
    assert_eq!((0x92, false), (first.id, first.last));
    assert_eq!((0, 1), tb.remap.outstanding());
    assert!(tb.rsp.r.put(RBeat::new(0x2, 0, Resp::Okay, true)));
    tb.tick(1);
    assert_eq!(0x92, tb.req.r.get().expect("last beat").id);
    assert_eq!((0, 0), tb.remap.outstanding());
}

#[test]
fn same_wide_id_pipelines_until_saturated() {
    let mut tb = Bench::new(2);
    for _ in 0..2 {
        assert!(tb.req.ar.put(AxReq::new(0x13, 0, 0)));
        tb.tick(1);
        assert!(tb.rsp.ar.get().is_some());
    }
    assert!(tb.req.ar.put(AxReq::new(0x13, 0, 0)));
    tb.tick(2);
    assert!(tb.rsp.ar.peek().is_none(), "two already pending");
}

#[test]
fn rejects_widening() {
    let config = IdRemapConfig {
        slv_id_width: 4,
        mst_id_width: 6,
        max_trans: 1,
    };
    assert!(IdRemap::new("wide", config).is_err());
}

#[test]
fn reset_frees_every_slot() {
    let mut tb = Bench::new(1);
    assert!(tb.req.ar.put(AxReq::new(0x21, 0, 0)));
    tb.tick(1);
    assert!(tb.rsp.ar.get().is_some());
    assert_eq!((0, 1), tb.remap.outstanding());
    tb.remap.reset();
    assert_eq!((0, 0), tb.remap.outstanding());
    assert_eq!(0, tb.remap.stats().ar_accepted);

    assert!(tb.req.ar.put(AxReq::new(0x31, 0, 0)));
    tb.tick(1);
    assert_eq!(0x1, tb.rsp.ar.get().expect("slot 1 is free after reset").id);
}
