use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::module::{module, Cycle, IsModule, ModuleBase};
use crate::protocol::{AxReq, BResp, RBeat, Resp, SlavePort};
use crate::sim::config::ResponderConfig;

#[derive(Debug, Default, Clone, Serialize)]
pub struct ResponderStats {
    pub writes: u64,
    pub reads: u64,
    pub w_beats: u64,
    pub r_beats: u64,
    /// Most transactions held at once.
    pub peak_outstanding: usize,
}

#[derive(Debug, Clone)]
struct Job {
    req: AxReq,
    write: bool,
    ready_at: Cycle,
    beats_sent: u32,
}

pub struct ResponderState {
    rng: StdRng,
    // writes whose data is still arriving, in address order
    w_open: VecDeque<AxReq>,
    w_beats_seen: u32,
    banks: Vec<VecDeque<Job>>,
    stats: ResponderStats,
}

impl ResponderState {
    fn new(banks: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            w_open: VecDeque::new(),
            w_beats_seen: 0,
            banks: vec![VecDeque::new(); banks],
            stats: ResponderStats::default(),
        }
    }

    fn held(&self) -> usize {
        self.w_open.len() + self.banks.iter().map(VecDeque::len).sum::<usize>()
    }
}

pub(crate) fn hash_u64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51afd7ed558ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ceb9fe1a85ec53);
    x ^= x >> 33;
    x
}

/// Memory-like responder with independently timed banks.
///
/// Requests land in a bank chosen by hashing their identifier and each bank serves its queue in
/// order, so a given identifier is always answered in issue order while different identifiers
/// overtake each other freely. Read data is the address of each beat.
pub struct MemResponder {
    base: ModuleBase<ResponderState, ResponderConfig>,
    name: String,
    seed: u64,
    pub slave: SlavePort,
}

module!(MemResponder, ResponderState, ResponderConfig,);

impl MemResponder {
    pub fn new(name: impl Into<String>, config: Arc<ResponderConfig>, seed: u64) -> Self {
        let mut me = Self {
            base: ModuleBase::with_state(ResponderState::new(config.banks.max(1), seed)),
            name: name.into(),
            seed,
            slave: SlavePort::default(),
        };
        me.init_conf(config);
        me
    }

    pub fn stats(&self) -> &ResponderStats {
        &self.state().stats
    }

    pub fn idle(&self) -> bool {
        self.state().held() == 0
    }

    fn bank_of(&self, id: u32) -> usize {
        (hash_u64(id as u64) % self.state().banks.len() as u64) as usize
    }

    fn schedule(&mut self, req: AxReq, write: bool) {
        let (min, max) = (self.conf().min_latency, self.conf().max_latency);
        let bank = self.bank_of(req.id);
        let now = self.now();
        let state = self.state_mut();
        let latency = state.rng.gen_range(min..=max);
        state.banks[bank].push_back(Job {
            req,
            write,
            ready_at: now + latency,
            beats_sent: 0,
        });
        let held = state.held();
        state.stats.peak_outstanding = state.stats.peak_outstanding.max(held);
    }

    fn accept(&mut self) {
        let limit = self.conf().max_outstanding;
        if self.state().held() < limit {
            if let Some(req) = self.slave.aw.get() {
                debug!("{} @{}: accept write {}", self.name, self.now(), req);
                let state = self.state_mut();
                state.w_open.push_back(req);
                state.stats.writes += 1;
            }
        }
        if self.state().held() < limit {
            if let Some(req) = self.slave.ar.get() {
                debug!("{} @{}: accept read {}", self.name, self.now(), req);
                self.state_mut().stats.reads += 1;
                self.schedule(req, false);
            }
        }
    }

    fn drain_w(&mut self) {
        if self.state().w_open.is_empty() {
            return;
        }
        let Some(beat) = self.slave.w.get() else {
            return;
        };
        let state = self.state_mut();
        state.stats.w_beats += 1;
        state.w_beats_seen += 1;
        if !beat.last {
            return;
        }
        let seen = std::mem::take(&mut state.w_beats_seen);
        let Some(req) = state.w_open.pop_front() else {
            return;
        };
        debug_assert_eq!(seen, req.beats(), "write burst {} beat count", req);
        self.schedule(req, true);
    }

    /// Banks whose head job is due and matches `write`.
    fn due(&self, write: bool) -> Vec<usize> {
        let now = self.now();
        self.state()
            .banks
            .iter()
            .enumerate()
            .filter(|(_, bank)| {
                bank.front()
                    .map_or(false, |job| job.write == write && job.ready_at <= now)
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    fn respond_b(&mut self) {
        if !self.slave.b.ready() {
            return;
        }
        let due = self.due(true);
        let state = self.state_mut();
        let Some(&bank) = due.choose(&mut state.rng) else {
            return;
        };
        let Some(job) = state.banks[bank].pop_front() else {
            return;
        };
        self.slave
            .b
            .put(BResp::new(job.req.id, Resp::Okay).with_user(job.req.user));
    }

    fn respond_r(&mut self) {
        if !self.slave.r.ready() {
            return;
        }
        let due = self.due(false);
        let state = self.state_mut();
        let Some(&bank) = due.choose(&mut state.rng) else {
            return;
        };
        let Some(job) = state.banks[bank].front_mut() else {
            return;
        };
        let index = job.beats_sent;
        let last = index + 1 == job.req.beats();
        let beat = RBeat::new(
            job.req.id,
            job.req.addr.wrapping_add(index as u64 * 8),
            Resp::Okay,
            last,
        )
        .with_user(job.req.user);
        job.beats_sent += 1;
        if last {
            state.banks[bank].pop_front();
        }
        state.stats.r_beats += 1;
        self.slave.r.put(beat);
    }
}

impl ModuleBehaviors for MemResponder {
    fn tick_one(&mut self) {
        self.respond_b();
        self.respond_r();
        self.drain_w();
        self.accept();
        self.advance();
    }

    fn reset(&mut self) {
        let banks = self.conf().banks.max(1);
        *self.state_mut() = ResponderState::new(banks, self.seed);
    }
}
