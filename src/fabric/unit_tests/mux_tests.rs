use crate::base::behavior::ModuleBehaviors;
use crate::fabric::{Mux, MuxConfig};
use crate::protocol::{connect, AxReq, BResp, MasterPort, RBeat, Resp, SlavePort, WBeat};

struct Bench {
    mux: Mux,
    reqs: Vec<MasterPort>,
    rsp: SlavePort,
}

impl Bench {
    fn new(num_ports: usize, depth: usize) -> Self {
        let mut mux = Mux::new(
            "mux",
            MuxConfig {
                num_ports,
                slv_id_width: 8,
                mst_id_width: 9,
            },
        )
        .expect("valid config");
        let reqs = mux
            .slaves
            .iter_mut()
            .map(|s| {
                let mut m = MasterPort::default();
                connect(&mut m, s, depth);
                m
            })
            .collect();
        let mut rsp = SlavePort::default();
        connect(&mut mux.master, &mut rsp, 1);
        Self { mux, reqs, rsp }
    }

    fn tick(&mut self, n: usize) {
        for _ in 0..n {
            self.mux.tick_one();
        }
    }
}

#[test]
fn repeated_contention_alternates_winner() {
    let mut tb = Bench::new(2, 1);
    let mut winners = Vec::new();
    for _round in 0..2 {
        assert!(tb.reqs[0].ar.put(AxReq::new(0x05, 0x100, 0)));
        assert!(tb.reqs[1].ar.put(AxReq::new(0x05, 0x200, 0)));
        for _ in 0..4 {
            tb.tick(1);
            if let Some(req) = tb.rsp.ar.get() {
                winners.push(req.id >> 8);
                assert_eq!(0x05, req.id & 0xff);
            }
        }
    }
    assert_eq!(vec![0, 1, 0, 1], winners);
    assert_eq!(vec![2, 2], tb.mux.stats().ar_grants);
}

#[test]
fn write_data_stays_with_address_winner() {
    let mut tb = Bench::new(2, 4);
    for (port, req) in tb.reqs.iter_mut().enumerate() {
        assert!(req.aw.put(AxReq::new(1, 0x40, 2)));
        for beat in 0..3 {
            assert!(req.w.put(WBeat::new(beat, beat == 2).with_user(port as u64)));
        }
    }
    let mut aw_ids = Vec::new();
    let mut w_owners = Vec::new();
    for _ in 0..20 {
        tb.tick(1);
        if let Some(req) = tb.rsp.aw.get() {
            aw_ids.push(req.id);
        }
        if let Some(beat) = tb.rsp.w.get() {
            w_owners.push((beat.user, beat.last));
        }
    }
    assert_eq!(vec![0x001, 0x101], aw_ids);
    assert_eq!(
        vec![(0, false), (0, false), (0, true), (1, false), (1, false), (1, true)],
        w_owners
    );
    assert_eq!(6, tb.mux.stats().w_beats);
}

#[test]
fn responses_are_steered_by_id_prefix() {
    let mut tb = Bench::new(2, 1);
    assert!(tb.rsp.b.put(BResp::new(0x105, Resp::Okay)));
    assert!(tb.rsp.r.put(RBeat::new(0x005, 9, Resp::Okay, true)));
    tb.tick(1);
    assert_eq!(0x05, tb.reqs[1].b.get().expect("b to port 1").id);
    assert!(tb.reqs[0].b.get().is_none());
    let beat = tb.reqs[0].r.get().expect("r to port 0");
    assert_eq!((0x05, true), (beat.id, beat.last));
    assert!(tb.reqs[1].r.get().is_none());
}

#[test]
fn full_upstream_channel_holds_response() {
    let mut tb = Bench::new(2, 1);
    assert!(tb.rsp.b.put(BResp::new(0x003, Resp::Okay)));
    tb.tick(1);
    assert!(tb.rsp.b.put(BResp::new(0x004, Resp::Okay)));
    tb.tick(3);
    assert!(!tb.rsp.b.ready(), "second response waits for port 0 to drain");
    assert!(tb.mux.stats().resp_stalls > 0);
    assert_eq!(3, tb.reqs[0].b.get().expect("first").id);
    tb.tick(1);
    assert_eq!(4, tb.reqs[0].b.get().expect("second").id);
}

#[test]
fn id_prefix_round_trips() {
    let tb = Bench::new(2, 1);
    for port in 0..2 {
        for id in [0u32, 0x5a, 0xff] {
            let wide = tb.mux.extend_id(port, id);
            assert_eq!((port, id), tb.mux.split_id(wide));
        }
    }
}

#[test]
fn rejects_narrow_downstream_ids() {
    let config = MuxConfig {
        num_ports: 3,
        slv_id_width: 8,
        mst_id_width: 9,
    };
    let err = Mux::new("narrow", config).err().expect("needs 10 bits");
    assert!(err.to_string().contains("10-bit"), "{}", err);
}

#[test]
fn single_port_passes_ids_through() {
    let mut mux = Mux::new(
        "one",
        MuxConfig {
            num_ports: 1,
            slv_id_width: 4,
            mst_id_width: 4,
        },
    )
    .expect("valid config");
    let mut req = MasterPort::default();
    let mut rsp = SlavePort::default();
    connect(&mut req, &mut mux.slaves[0], 1);
    connect(&mut mux.master, &mut rsp, 1);
    assert!(req.ar.put(AxReq::new(0xa, 0, 0)));
    mux.tick_one();
    assert_eq!(0xa, rsp.ar.get().expect("forwarded").id);
}

#[test]
fn reset_restarts_arbitration_priority() {
    let mut tb = Bench::new(2, 1);
    assert!(tb.reqs[0].ar.put(AxReq::new(1, 0, 0)));
    tb.tick(1);
    assert_eq!(0x001, tb.rsp.ar.get().expect("port 0 granted").id);

    tb.mux.reset();
    assert_eq!(vec![0, 0], tb.mux.stats().ar_grants);
    assert!(tb.reqs[0].ar.put(AxReq::new(2, 0, 0)));
    assert!(tb.reqs[1].ar.put(AxReq::new(3, 0, 0)));
    tb.tick(1);
    assert_eq!(0x002, tb.rsp.ar.get().expect("priority starts at port 0 again").id);
    assert_eq!(vec![1, 0], tb.mux.stats().ar_grants);
}
