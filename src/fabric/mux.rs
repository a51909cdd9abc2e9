use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::fabric::config::MuxConfig;
use crate::protocol::{MasterPort, SlavePort};
use crate::route::{onehot_to_bin, Lock, PortMask, RrArbiter};

#[derive(Debug, Default, Clone, Serialize)]
pub struct MuxStats {
    /// Write address grants per slave port.
    pub aw_grants: Vec<u64>,
    /// Read address grants per slave port.
    pub ar_grants: Vec<u64>,
    pub w_beats: u64,
    pub b_forwarded: u64,
    pub r_beats: u64,
    /// Cycles a response waited on a full upstream channel.
    pub resp_stalls: u64,
}

#[derive(Debug)]
pub struct MuxState {
    aw_arb: RrArbiter,
    ar_arb: RrArbiter,
    aw_lock: Lock,
    w_lock: Lock,
    ar_lock: Lock,
    stats: MuxStats,
}

impl MuxState {
    fn new(num_ports: usize) -> Self {
        Self {
            aw_arb: RrArbiter::new(num_ports),
            ar_arb: RrArbiter::new(num_ports),
            aw_lock: Lock::Idle,
            w_lock: Lock::Idle,
            ar_lock: Lock::Idle,
            stats: MuxStats {
                aw_grants: vec![0; num_ports],
                ar_grants: vec![0; num_ports],
                ..MuxStats::default()
            },
        }
    }
}

/// Merges `num_ports` requesters onto one responder.
///
/// Address phases are arbitrated round-robin. The winner stays locked on the address channel
/// until its request is taken downstream, and on the write data channel until its last beat.
/// The slave port index is prepended to the identifier on the way down, and responses are
/// steered back by those high bits.
pub struct Mux {
    base: ModuleBase<MuxState, MuxConfig>,
    name: String,
    pub slaves: Vec<SlavePort>,
    pub master: MasterPort,
}

module!(Mux, MuxState, MuxConfig,);

impl Mux {
    pub fn new(name: impl Into<String>, config: MuxConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let mut me = Self {
            base: ModuleBase::with_state(MuxState::new(config.num_ports)),
            name: name.into(),
            slaves: (0..config.num_ports).map(|_| SlavePort::default()).collect(),
            master: MasterPort::default(),
        };
        me.init_conf(Arc::new(config));
        Ok(me)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &MuxStats {
        &self.state().stats
    }

    /// Downstream identifier for `id` arriving on slave port `port`.
    pub fn extend_id(&self, port: usize, id: u32) -> u32 {
        let width = self.conf().slv_id_width;
        debug_assert!(
            width >= 32 || id >> width == 0,
            "id {:#x} wider than {} bits",
            id,
            width
        );
        ((port as u64) << width) as u32 | id
    }

    /// Split a downstream identifier into (slave port, original id).
    pub fn split_id(&self, id: u32) -> (usize, u32) {
        let width = self.conf().slv_id_width;
        if width >= 32 {
            return (0, id);
        }
        ((id >> width) as usize, id & ((1 << width) - 1))
    }

    fn aw_requests(&self) -> PortMask {
        self.slaves
            .iter()
            .enumerate()
            .filter(|(_, port)| port.aw.valid())
            .fold(0, |mask, (idx, _)| mask | 1 << idx)
    }

    fn ar_requests(&self) -> PortMask {
        self.slaves
            .iter()
            .enumerate()
            .filter(|(_, port)| port.ar.valid())
            .fold(0, |mask, (idx, _)| mask | 1 << idx)
    }

    fn forward_w(&mut self, lock: Lock) {
        let Some(src) = lock.holder() else {
            return;
        };
        if !self.slaves[src].w.valid() || !self.master.w.ready() {
            return;
        }
        let beat = self.slaves[src].w.get().expect("valid just checked");
        let last = beat.last;
        self.master.w.put(beat);
        let state = self.state_mut();
        state.stats.w_beats += 1;
        if last {
            state.w_lock.release();
        }
    }

    fn forward_aw(&mut self, w_lock: Lock) {
        if self.state().aw_lock.is_idle() {
            // a new write may only win once the previous burst has fully passed
            let enable = w_lock.is_idle();
            let request = self.aw_requests();
            let grant = self.state_mut().aw_arb.arbitrate(request, enable);
            let Some(winner) = onehot_to_bin(grant) else {
                return;
            };
            let state = self.state_mut();
            state.aw_lock.lock(winner);
            state.stats.aw_grants[winner] += 1;
            debug!("{} @{}: write grant to port {}", self.name, self.now(), winner);
        }
        let src = self.state().aw_lock.holder().expect("locked above");
        if !self.master.aw.ready() {
            return;
        }
        let mut req = self.slaves[src].aw.get().expect("locked port holds its request");
        req.id = self.extend_id(src, req.id);
        self.master.aw.put(req);
        let state = self.state_mut();
        state.aw_lock.release();
        state.w_lock.lock(src);
    }

    fn forward_ar(&mut self) {
        if self.state().ar_lock.is_idle() {
            let request = self.ar_requests();
            let grant = self.state_mut().ar_arb.arbitrate(request, true);
            let Some(winner) = onehot_to_bin(grant) else {
                return;
            };
            let state = self.state_mut();
            state.ar_lock.lock(winner);
            state.stats.ar_grants[winner] += 1;
            debug!("{} @{}: read grant to port {}", self.name, self.now(), winner);
        }
        let src = self.state().ar_lock.holder().expect("locked above");
        if !self.master.ar.ready() {
            return;
        }
        let mut req = self.slaves[src].ar.get().expect("locked port holds its request");
        req.id = self.extend_id(src, req.id);
        self.master.ar.put(req);
        self.state_mut().ar_lock.release();
    }

    fn return_b(&mut self) {
        let Some(resp) = self.master.b.peek() else {
            return;
        };
        let (dst, id) = self.split_id(resp.id);
        assert!(dst < self.slaves.len(), "{}: response id {:#x} names no port", self.name, resp.id);
        if !self.slaves[dst].b.ready() {
            self.state_mut().stats.resp_stalls += 1;
            return;
        }
        let mut resp = self.master.b.get().expect("peeked above");
        resp.id = id;
        self.slaves[dst].b.put(resp);
        self.state_mut().stats.b_forwarded += 1;
    }

    fn return_r(&mut self) {
        let Some(beat) = self.master.r.peek() else {
            return;
        };
        let (dst, id) = self.split_id(beat.id);
        assert!(dst < self.slaves.len(), "{}: read id {:#x} names no port", self.name, beat.id);
        if !self.slaves[dst].r.ready() {
            self.state_mut().stats.resp_stalls += 1;
            return;
        }
        let mut beat = self.master.r.get().expect("peeked above");
        beat.id = id;
        self.slaves[dst].r.put(beat);
        self.state_mut().stats.r_beats += 1;
    }
}

impl ModuleBehaviors for Mux {
    fn tick_one(&mut self) {
        let w_lock = self.state().w_lock;
        self.forward_w(w_lock);
        self.forward_aw(w_lock);
        self.forward_ar();
        self.return_b();
        self.return_r();
        self.advance();
    }

    fn reset(&mut self) {
        let num_ports = self.conf().num_ports;
        let state = self.state_mut();
        state.aw_arb.reset();
        state.ar_arb.reset();
        state.aw_lock = Lock::Idle;
        state.w_lock = Lock::Idle;
        state.ar_lock = Lock::Idle;
        state.stats = MuxStats {
            aw_grants: vec![0; num_ports],
            ar_grants: vec![0; num_ports],
            ..MuxStats::default()
        };
    }
}
