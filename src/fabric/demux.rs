use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::fabric::config::DemuxConfig;
use crate::fabric::err_slave::{ErrorSlave, ErrorSlaveConfig};
use crate::protocol::{connect, MasterPort, Resp, SlavePort};
use crate::route::{onehot_to_bin, AddrDecoder, Bind, IdTable, Lock, PortMask, RrArbiter};

#[derive(Debug, Default, Clone, Serialize)]
pub struct DemuxStats {
    pub aw_accepted: u64,
    pub ar_accepted: u64,
    /// Cycles an address phase waited on its identifier's table entry.
    pub aw_id_stalls: u64,
    pub ar_id_stalls: u64,
    /// Cycles an address phase waited on a full downstream channel.
    pub aw_port_stalls: u64,
    pub ar_port_stalls: u64,
    /// Cycles a write address waited for the previous write burst to finish.
    pub aw_w_stalls: u64,
    pub decode_errors: u64,
    pub w_beats: u64,
    pub b_forwarded: u64,
    pub r_beats: u64,
}

#[derive(Debug)]
pub struct DemuxState {
    w_table: IdTable<usize>,
    r_table: IdTable<usize>,
    w_lock: Lock,
    r_lock: Lock,
    b_arb: RrArbiter,
    r_arb: RrArbiter,
    stats: DemuxStats,
}

impl DemuxState {
    fn new(config: &DemuxConfig) -> Self {
        let destinations = config.num_ports + 1;
        Self {
            w_table: IdTable::new(config.look_bits, config.max_trans),
            r_table: IdTable::new(config.look_bits, config.max_trans),
            w_lock: Lock::Idle,
            r_lock: Lock::Idle,
            b_arb: RrArbiter::new(destinations),
            r_arb: RrArbiter::new(destinations),
            stats: DemuxStats::default(),
        }
    }
}

/// Routes one requester to `num_ports` destinations by address.
///
/// Address phases are gated by a write-side and a read-side ordering table: a request is only
/// forwarded when its identifier is free or already bound to the destination the address
/// decodes to. Write data follows the address phase it belongs to under a lock that holds until
/// the last beat. Responses from all destinations are merged by two independent round-robin
/// arbiters, one per response channel.
///
/// Undecodable requests go to an internal error responder at index `num_ports`.
pub struct Demux {
    base: ModuleBase<DemuxState, DemuxConfig>,
    name: String,
    decoder: AddrDecoder,
    pub slave: SlavePort,
    pub masters: Vec<MasterPort>,
    err_port: MasterPort,
    err_slave: ErrorSlave,
}

module!(Demux, DemuxState, DemuxConfig,);

impl Demux {
    pub fn new(
        name: impl Into<String>,
        config: DemuxConfig,
        decoder: AddrDecoder,
        err_resp: Resp,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        anyhow::ensure!(
            decoder.rules().len() <= config.num_ports,
            "{} address rules for {} ports",
            decoder.rules().len(),
            config.num_ports
        );
        let name = name.into();
        let mut err_port = MasterPort::default();
        let mut err_slave = ErrorSlave::new(
            format!("{}.err", name),
            Arc::new(ErrorSlaveConfig {
                resp: err_resp,
                max_trans: config.max_trans as usize,
            }),
        );
        connect(&mut err_port, &mut err_slave.slave, 1);

        let mut me = Self {
            base: ModuleBase::with_state(DemuxState::new(&config)),
            name,
            decoder,
            slave: SlavePort::default(),
            masters: (0..config.num_ports).map(|_| MasterPort::default()).collect(),
            err_port,
            err_slave,
        };
        me.init_conf(Arc::new(config));
        Ok(me)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &DemuxStats {
        &self.state().stats
    }

    /// Index of the internal error responder.
    pub fn err_index(&self) -> usize {
        self.conf().num_ports
    }

    /// Transactions accepted but not yet answered, writes and reads.
    pub fn outstanding(&self) -> (usize, usize) {
        (self.state().w_table.outstanding(), self.state().r_table.outstanding())
    }

    /// Destination of an address: the matching rule if this requester may reach it, else the
    /// default port, else the error responder.
    pub fn route(&self, addr: u64) -> usize {
        let conf = self.conf();
        let decoded = self.decoder.decode(addr);
        if decoded.matched && conf.connected(decoded.idx) {
            decoded.idx
        } else if let (false, Some(port)) = (decoded.matched, conf.default_port) {
            port
        } else {
            conf.num_ports
        }
    }

    fn master(&mut self, idx: usize) -> &mut MasterPort {
        if idx == self.conf().num_ports {
            &mut self.err_port
        } else {
            &mut self.masters[idx]
        }
    }

    fn destinations(&self) -> impl Iterator<Item = &MasterPort> {
        self.masters.iter().chain(std::iter::once(&self.err_port))
    }

    fn forward_w(&mut self, lock: Lock) {
        let Some(dest) = lock.holder() else {
            return;
        };
        if !self.slave.w.valid() || !self.master(dest).w.ready() {
            return;
        }
        let beat = self.slave.w.get().expect("valid just checked");
        let last = beat.last;
        self.master(dest).w.put(beat);
        let state = self.state_mut();
        state.stats.w_beats += 1;
        if last {
            state.w_lock.release();
        }
    }

    fn forward_aw(&mut self, lock: Lock) {
        let Some(req) = self.slave.aw.peek() else {
            return;
        };
        if !lock.is_idle() {
            self.state_mut().stats.aw_w_stalls += 1;
            return;
        }
        let dest = self.route(req.addr);
        if let Bind::Reject(reason) = self.state().w_table.try_bind(req.id, dest) {
            debug!(
                "{} @{}: stall write id {:#x} to port {}: {:?}",
                self.name,
                self.now(),
                req.id,
                dest,
                reason
            );
            self.state_mut().stats.aw_id_stalls += 1;
            return;
        }
        if !self.master(dest).aw.ready() {
            self.state_mut().stats.aw_port_stalls += 1;
            return;
        }
        let req = self.slave.aw.get().expect("peeked above");
        debug!("{} @{}: write {} -> port {}", self.name, self.now(), req, dest);
        let id = req.id;
        self.master(dest).aw.put(req);
        let err = dest == self.err_index();
        let state = self.state_mut();
        state.w_table.bind(id, dest);
        state.w_lock.lock(dest);
        state.stats.aw_accepted += 1;
        state.stats.decode_errors += err as u64;
    }

    fn forward_ar(&mut self) {
        let Some(req) = self.slave.ar.peek() else {
            return;
        };
        let dest = self.route(req.addr);
        if let Bind::Reject(reason) = self.state().r_table.try_bind(req.id, dest) {
            debug!(
                "{} @{}: stall read id {:#x} to port {}: {:?}",
                self.name,
                self.now(),
                req.id,
                dest,
                reason
            );
            self.state_mut().stats.ar_id_stalls += 1;
            return;
        }
        if !self.master(dest).ar.ready() {
            self.state_mut().stats.ar_port_stalls += 1;
            return;
        }
        let req = self.slave.ar.get().expect("peeked above");
        debug!("{} @{}: read {} -> port {}", self.name, self.now(), req, dest);
        let id = req.id;
        self.master(dest).ar.put(req);
        let err = dest == self.err_index();
        let state = self.state_mut();
        state.r_table.bind(id, dest);
        state.stats.ar_accepted += 1;
        state.stats.decode_errors += err as u64;
    }

    fn return_b(&mut self) {
        // upstream not ready: leave the arbiter untouched
        if !self.slave.b.ready() {
            return;
        }
        let request = self
            .destinations()
            .enumerate()
            .filter(|(_, port)| port.b.valid())
            .fold(0 as PortMask, |mask, (idx, _)| mask | 1 << idx);
        let grant = self.state_mut().b_arb.arbitrate(request, true);
        let Some(src) = onehot_to_bin(grant) else {
            return;
        };
        let resp = self.master(src).b.get().expect("requesting port has a response");
        let bound = self.state_mut().w_table.retire(resp.id);
        debug_assert_eq!(
            bound, src,
            "write response for id {:#x} from port {} but id is bound to {}",
            resp.id, src, bound
        );
        self.slave.b.put(resp);
        self.state_mut().stats.b_forwarded += 1;
    }

    fn return_r(&mut self) {
        if !self.slave.r.ready() {
            return;
        }
        let held = self.state().r_lock;
        let request = self
            .destinations()
            .enumerate()
            .filter(|(idx, port)| port.r.valid() && held.holder().map_or(true, |h| h == *idx))
            .fold(0 as PortMask, |mask, (idx, _)| mask | 1 << idx);
        let grant = self.state_mut().r_arb.arbitrate(request, true);
        let Some(src) = onehot_to_bin(grant) else {
            return;
        };
        let beat = self.master(src).r.get().expect("requesting port has a beat");
        let lock_bursts = self.conf().lock_r_bursts;
        let state = self.state_mut();
        state.stats.r_beats += 1;
        if beat.last {
            let bound = state.r_table.retire(beat.id);
            debug_assert_eq!(
                bound, src,
                "read data for id {:#x} from port {} but id is bound to {}",
                beat.id, src, bound
            );
            if !state.r_lock.is_idle() {
                state.r_lock.release();
            }
        } else if lock_bursts && state.r_lock.is_idle() {
            state.r_lock.lock(src);
        }
        self.slave.r.put(beat);
    }
}

impl ModuleBehaviors for Demux {
    fn tick_one(&mut self) {
        self.err_slave.tick_one();
        // address acceptance sees the lock and tables as of the start of the cycle
        let lock = self.state().w_lock;
        self.forward_w(lock);
        self.forward_aw(lock);
        self.forward_ar();
        self.return_b();
        self.return_r();
        self.advance();
    }

    fn reset(&mut self) {
        let state = self.state_mut();
        state.w_table.clear();
        state.r_table.clear();
        state.w_lock = Lock::Idle;
        state.r_lock = Lock::Idle;
        state.b_arb.reset();
        state.r_arb.reset();
        state.stats = DemuxStats::default();
        self.err_slave.reset();
    }
}
