use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::fabric::config::IdRemapConfig;
use crate::protocol::{MasterPort, SlavePort};
use crate::route::{Bind, IdTable};

#[derive(Debug, Default, Clone, Serialize)]
pub struct IdRemapStats {
    pub aw_accepted: u64,
    pub ar_accepted: u64,
    /// Cycles a request waited because its truncated id was held by other high bits.
    pub aw_id_stalls: u64,
    pub ar_id_stalls: u64,
    pub b_forwarded: u64,
    pub r_beats: u64,
}

#[derive(Debug)]
pub struct IdRemapState {
    w_table: IdTable<u32>,
    r_table: IdTable<u32>,
    stats: IdRemapStats,
}

impl IdRemapState {
    fn new(config: &IdRemapConfig) -> Self {
        Self {
            w_table: IdTable::new(config.mst_id_width, config.max_trans),
            r_table: IdTable::new(config.mst_id_width, config.max_trans),
            stats: IdRemapStats::default(),
        }
    }
}

/// Narrows identifiers from `slv_id_width` to `mst_id_width` bits.
///
/// Downstream only sees the low bits. The ordering table remembers the high bits each truncated
/// identifier stands for, so two wide identifiers sharing low bits never overlap downstream, and
/// responses get their original identifier back.
pub struct IdRemap {
    base: ModuleBase<IdRemapState, IdRemapConfig>,
    name: String,
    pub slave: SlavePort,
    pub master: MasterPort,
}

module!(IdRemap, IdRemapState, IdRemapConfig,);

impl IdRemap {
    pub fn new(name: impl Into<String>, config: IdRemapConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let mut me = Self {
            base: ModuleBase::with_state(IdRemapState::new(&config)),
            name: name.into(),
            slave: SlavePort::default(),
            master: MasterPort::default(),
        };
        me.init_conf(Arc::new(config));
        Ok(me)
    }

    pub fn stats(&self) -> &IdRemapStats {
        &self.state().stats
    }

    pub fn outstanding(&self) -> (usize, usize) {
        (self.state().w_table.outstanding(), self.state().r_table.outstanding())
    }

    /// Split a wide identifier into (truncated id, high bits).
    pub fn split(&self, id: u32) -> (u32, u32) {
        let width = self.conf().mst_id_width;
        if width >= 32 {
            return (id, 0);
        }
        (id & ((1 << width) - 1), id >> width)
    }

    pub fn join(&self, low: u32, high: u32) -> u32 {
        let width = self.conf().mst_id_width;
        ((high as u64) << width) as u32 | low
    }

    fn forward_aw(&mut self) {
        let Some(req) = self.slave.aw.peek() else {
            return;
        };
        let (low, high) = self.split(req.id);
        if let Bind::Reject(reason) = self.state().w_table.try_bind(low, high) {
            debug!("{} @{}: stall write id {:#x}: {:?}", self.name, self.now(), req.id, reason);
            self.state_mut().stats.aw_id_stalls += 1;
            return;
        }
        if !self.master.aw.ready() {
            return;
        }
        let mut req = self.slave.aw.get().expect("peeked above");
        req.id = low;
        self.master.aw.put(req);
        let state = self.state_mut();
        state.w_table.bind(low, high);
        state.stats.aw_accepted += 1;
    }

    fn forward_w(&mut self) {
        if self.slave.w.valid() && self.master.w.ready() {
            let beat = self.slave.w.get().expect("valid just checked");
            self.master.w.put(beat);
        }
    }

    fn forward_ar(&mut self) {
        let Some(req) = self.slave.ar.peek() else {
            return;
        };
        let (low, high) = self.split(req.id);
        if let Bind::Reject(reason) = self.state().r_table.try_bind(low, high) {
            debug!("{} @{}: stall read id {:#x}: {:?}", self.name, self.now(), req.id, reason);
            self.state_mut().stats.ar_id_stalls += 1;
            return;
        }
        if !self.master.ar.ready() {
            return;
        }
        let mut req = self.slave.ar.get().expect("peeked above");
        req.id = low;
        self.master.ar.put(req);
        let state = self.state_mut();
        state.r_table.bind(low, high);
        state.stats.ar_accepted += 1;
    }

    fn return_b(&mut self) {
        if !self.master.b.valid() || !self.slave.b.ready() {
            return;
        }
        let mut resp = self.master.b.get().expect("valid just checked");
        let high = self.state_mut().w_table.retire(resp.id);
        resp.id = self.join(resp.id, high);
        self.slave.b.put(resp);
        self.state_mut().stats.b_forwarded += 1;
    }

    fn return_r(&mut self) {
        if !self.master.r.valid() || !self.slave.r.ready() {
            return;
        }
        let mut beat = self.master.r.get().expect("valid just checked");
        let high = if beat.last {
            self.state_mut().r_table.retire(beat.id)
        } else {
            self.state()
                .r_table
                .lookup(beat.id)
                .unwrap_or_else(|| panic!("{}: read data for idle id {:#x}", self.name, beat.id))
        };
        beat.id = self.join(beat.id, high);
        self.slave.r.put(beat);
        self.state_mut().stats.r_beats += 1;
    }
}

impl ModuleBehaviors for IdRemap {
    fn tick_one(&mut self) {
        self.forward_aw();
        self.forward_w();
        self.forward_ar();
        self.return_b();
        self.return_r();
        self.advance();
    }

    fn reset(&mut self) {
        let state = self.state_mut();
        state.w_table.clear();
        state.r_table.clear();
        state.stats = IdRemapStats::default();
    }
}
