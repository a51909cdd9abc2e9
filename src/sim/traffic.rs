use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::{bail, Context};
use log::{debug, error};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::fabric::XbarConfig;
use crate::protocol::{AxReq, MasterPort, WBeat};
use crate::route::AddrDecoder;
use crate::sim::config::TrafficConfig;
use crate::sim::scoreboard::{Dir, Expected, OrderScoreboard};

#[derive(Debug, Default, Clone, Serialize)]
pub struct TrafficStats {
    pub writes_issued: u64,
    pub reads_issued: u64,
    pub writes_done: u64,
    pub reads_done: u64,
    pub error_responses: u64,
    pub total_latency: u64,
    pub max_latency: u64,
}

/// The address map as one requester sees it.
#[derive(Debug, Clone)]
pub struct TargetMap {
    decoder: AddrDecoder,
    reachable: Vec<usize>,
    defaulted: bool,
}

impl TargetMap {
    pub fn new(config: &XbarConfig, requester: usize) -> anyhow::Result<Self> {
        let decoder = config.decoder()?;
        let demux = config.demux_config(requester);
        let reachable = decoder
            .rules()
            .iter()
            .enumerate()
            .filter(|(idx, rule)| rule.enabled() && demux.connected(*idx))
            .map(|(idx, _)| idx)
            .collect();
        Ok(Self {
            decoder,
            reachable,
            defaulted: demux.default_port.is_some(),
        })
    }

    /// Word-aligned address inside a reachable range, or a random one when `unmapped` is set
    /// or nothing is reachable.
    fn address(&self, unmapped: bool, pick: usize, offset: u64) -> u64 {
        if unmapped || self.reachable.is_empty() {
            return offset & !7;
        }
        let rule = self.decoder.rules()[self.reachable[pick % self.reachable.len()]];
        rule.base | (offset & rule.mask & !7)
    }

    /// Whether the crossbar answers `addr` from its error responder.
    pub fn expect_err(&self, addr: u64) -> bool {
        let decoded = self.decoder.decode(addr);
        if decoded.matched {
            !self.reachable.contains(&decoded.idx)
        } else {
            !self.defaulted
        }
    }
}

pub struct TrafficState {
    rng: StdRng,
    issued: u32,
    next_tag: u64,
    // write data in address-phase order
    w_queue: VecDeque<WBeat>,
    // beats received so far for the open read burst of each id
    r_beats: HashMap<u32, u32>,
    scoreboard: OrderScoreboard,
    error: Option<anyhow::Error>,
    stats: TrafficStats,
}

impl TrafficState {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            issued: 0,
            next_tag: 0,
            w_queue: VecDeque::new(),
            r_beats: HashMap::new(),
            scoreboard: OrderScoreboard::default(),
            error: None,
            stats: TrafficStats::default(),
        }
    }
}

/// Random requester. Every request carries a unique tag in `user`, which responders echo, so
/// the scoreboard can tell exactly which transaction each response belongs to.
pub struct TrafficGen {
    base: ModuleBase<TrafficState, TrafficConfig>,
    name: String,
    targets: TargetMap,
    num_ids: u32,
    seed: u64,
    pub port: MasterPort,
}

module!(TrafficGen, TrafficState, TrafficConfig,);

impl TrafficGen {
    pub fn new(
        name: impl Into<String>,
        config: Arc<TrafficConfig>,
        targets: TargetMap,
        id_width: u32,
        seed: u64,
    ) -> Self {
        let id_space = 1u64 << id_width.min(32);
        let num_ids = (config.num_ids.max(1) as u64).min(id_space) as u32;
        let mut me = Self {
            base: ModuleBase::with_state(TrafficState::new(seed)),
            name: name.into(),
            targets,
            num_ids,
            seed,
            port: MasterPort::default(),
        };
        me.init_conf(config);
        me
    }

    pub fn stats(&self) -> &TrafficStats {
        &self.state().stats
    }

    pub fn outstanding(&self) -> usize {
        self.state().scoreboard.outstanding()
    }

    pub fn done(&self) -> bool {
        let state = self.state();
        state.issued == self.conf().txns_per_requester
            && state.scoreboard.outstanding() == 0
            && state.w_queue.is_empty()
    }

    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.state_mut().error.take()
    }

    fn record_latency(&mut self, expected: &Expected) {
        let latency = self.now() - expected.issued_at;
        let stats = &mut self.state_mut().stats;
        stats.total_latency += latency;
        stats.max_latency = stats.max_latency.max(latency);
        stats.error_responses += expected.expect_err as u64;
    }

    fn collect_b(&mut self) -> anyhow::Result<()> {
        let Some(resp) = self.port.b.get() else {
            return Ok(());
        };
        let done = self
            .state_mut()
            .scoreboard
            .complete(Dir::Write, resp.id, resp.user, 1, resp.resp.is_err())
            .with_context(|| format!("{}: bad write response {}", self.name, resp))?;
        self.record_latency(&done);
        self.state_mut().stats.writes_done += 1;
        Ok(())
    }

    fn collect_r(&mut self) -> anyhow::Result<()> {
        let Some(beat) = self.port.r.get() else {
            return Ok(());
        };
        let front = self
            .state()
            .scoreboard
            .front(Dir::Read, beat.id)
            .cloned()
            .with_context(|| format!("{}: read data with nothing issued: {}", self.name, beat))?;
        if front.tag != beat.user {
            bail!(
                "{}: read data for tag {} interleaved into burst of tag {} on id {:#x}",
                self.name,
                beat.user,
                front.tag,
                beat.id
            );
        }
        let index = {
            let count = self.state_mut().r_beats.entry(beat.id).or_insert(0);
            *count += 1;
            *count - 1
        };
        if !beat.resp.is_err() {
            let want = front.addr.wrapping_add(index as u64 * 8);
            if beat.word() != want {
                bail!(
                    "{}: tag {} beat {} carries {:#x}, expected {:#x}",
                    self.name,
                    front.tag,
                    index,
                    beat.word(),
                    want
                );
            }
        }
        if beat.last {
            let beats = self.state_mut().r_beats.remove(&beat.id).unwrap_or(0);
            let done = self
                .state_mut()
                .scoreboard
                .complete(Dir::Read, beat.id, beat.user, beats, beat.resp.is_err())
                .with_context(|| format!("{}: bad read burst end {}", self.name, beat))?;
            self.record_latency(&done);
            self.state_mut().stats.reads_done += 1;
        }
        Ok(())
    }

    fn send_w(&mut self) {
        let Some(beat) = self.state().w_queue.front().cloned() else {
            return;
        };
        if self.port.w.put(beat) {
            self.state_mut().w_queue.pop_front();
        }
    }

    fn issue(&mut self) {
        let conf = self.conf();
        let (txns, max_inflight, issue_prob) =
            (conf.txns_per_requester, conf.max_inflight, conf.issue_prob);
        let (write_ratio, unmapped_ratio, max_len) =
            (conf.write_ratio, conf.unmapped_ratio, conf.max_len);
        let num_ids = self.num_ids;
        let state = self.state();
        if state.issued >= txns || state.scoreboard.outstanding() >= max_inflight {
            return;
        }

        let rng = &mut self.state_mut().rng;
        if !rng.gen_bool(issue_prob.clamp(0.0, 1.0)) {
            return;
        }
        let write = rng.gen_bool(write_ratio.clamp(0.0, 1.0));
        let unmapped = rng.gen_bool(unmapped_ratio.clamp(0.0, 1.0));
        let id = rng.gen_range(0..num_ids);
        let len = rng.gen_range(0..=max_len);
        let pick: usize = rng.gen();
        let offset: u64 = rng.gen();

        let channel_ready = if write {
            self.port.aw.ready()
        } else {
            self.port.ar.ready()
        };
        if !channel_ready {
            return;
        }

        let addr = self.targets.address(unmapped, pick, offset);
        let expect_err = self.targets.expect_err(addr);
        let now = self.now();
        let state = self.state_mut();
        let tag = state.next_tag;
        state.next_tag += 1;
        state.issued += 1;
        let req = AxReq::new(id, addr, len).with_user(tag);
        let expected = Expected {
            tag,
            addr,
            beats: if write { 1 } else { req.beats() },
            expect_err,
            issued_at: now,
        };
        debug!("{} @{}: issue {}", self.name, now, req);

        if write {
            let state = self.state_mut();
            state.scoreboard.issue(Dir::Write, id, expected);
            state.w_queue.extend(
                (0..=len).map(|beat| WBeat::new(tag ^ beat as u64, beat == len).with_user(tag)),
            );
            state.stats.writes_issued += 1;
            self.port.aw.put(req);
        } else {
            let state = self.state_mut();
            state.scoreboard.issue(Dir::Read, id, expected);
            state.stats.reads_issued += 1;
            self.port.ar.put(req);
        }
    }

    fn step(&mut self) -> anyhow::Result<()> {
        self.collect_b()?;
        self.collect_r()?;
        self.send_w();
        self.issue();
        Ok(())
    }
}

impl ModuleBehaviors for TrafficGen {
    fn tick_one(&mut self) {
        if self.state().error.is_none() {
            if let Err(err) = self.step() {
                error!("{} @{}: {:#}", self.name, self.now(), err);
                self.state_mut().error = Some(err);
            }
        }
        self.advance();
    }

    fn reset(&mut self) {
        *self.state_mut() = TrafficState::new(self.seed);
    }
}
