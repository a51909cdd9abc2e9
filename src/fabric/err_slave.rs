use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::protocol::{AxReq, BResp, RBeat, Resp, SlavePort};

#[derive(Debug, Clone)]
pub struct ErrorSlaveConfig {
    pub resp: Resp,
    /// Outstanding writes, and separately reads, held at once.
    pub max_trans: usize,
}

impl Default for ErrorSlaveConfig {
    fn default() -> Self {
        Self {
            resp: Resp::DecErr,
            max_trans: 4,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ErrorSlaveStats {
    pub writes: u64,
    pub reads: u64,
}

#[derive(Debug, Default)]
pub struct ErrorSlaveState {
    // (id, user) of writes still receiving data
    w_pending: VecDeque<(u32, u64)>,
    b_queue: VecDeque<BResp>,
    r_queue: VecDeque<AxReq>,
    r_beats_sent: u32,
    stats: ErrorSlaveStats,
}

/// Terminates requests that decode to no destination. Write data is drained and dropped; every
/// request is answered with the configured error response, echoing `id` and `user`.
pub struct ErrorSlave {
    base: ModuleBase<ErrorSlaveState, ErrorSlaveConfig>,
    name: String,
    pub slave: SlavePort,
}

module!(ErrorSlave, ErrorSlaveState, ErrorSlaveConfig,);

impl ErrorSlave {
    pub fn new(name: impl Into<String>, config: Arc<ErrorSlaveConfig>) -> Self {
        assert!(config.max_trans > 0, "error slave max_trans must be > 0");
        let mut me = Self {
            base: ModuleBase::default(),
            name: name.into(),
            slave: SlavePort::default(),
        };
        me.init_conf(config);
        me
    }

    pub fn stats(&self) -> &ErrorSlaveStats {
        &self.state().stats
    }

    pub fn idle(&self) -> bool {
        let state = self.state();
        state.w_pending.is_empty() && state.b_queue.is_empty() && state.r_queue.is_empty()
    }

    fn drain_w(&mut self) {
        if self.state().w_pending.is_empty() {
            return;
        }
        let Some(beat) = self.slave.w.get() else {
            return;
        };
        if beat.last {
            let resp = self.conf().resp;
            let state = self.state_mut();
            let (id, user) = state.w_pending.pop_front().expect("front just checked");
            state.b_queue.push_back(BResp::new(id, resp).with_user(user));
        }
    }

    fn respond_b(&mut self) {
        let Some(resp) = self.state().b_queue.front().cloned() else {
            return;
        };
        if self.slave.b.put(resp) {
            self.state_mut().b_queue.pop_front();
        }
    }

    fn respond_r(&mut self) {
        let Some(req) = self.state().r_queue.front().cloned() else {
            return;
        };
        let sent = self.state().r_beats_sent;
        let last = sent + 1 == req.beats();
        let beat = RBeat::new(req.id, 0, self.conf().resp, last).with_user(req.user);
        if !self.slave.r.put(beat) {
            return;
        }
        let state = self.state_mut();
        if last {
            state.r_queue.pop_front();
            state.r_beats_sent = 0;
        } else {
            state.r_beats_sent += 1;
        }
    }

    fn accept_aw(&mut self) {
        let held = self.state().w_pending.len() + self.state().b_queue.len();
        if held >= self.conf().max_trans {
            return;
        }
        if let Some(req) = self.slave.aw.get() {
            debug!("{} @{}: decode error on write {}", self.name, self.now(), req);
            let state = self.state_mut();
            state.w_pending.push_back((req.id, req.user));
            state.stats.writes += 1;
        }
    }

    fn accept_ar(&mut self) {
        if self.state().r_queue.len() >= self.conf().max_trans {
            return;
        }
        if let Some(req) = self.slave.ar.get() {
            debug!("{} @{}: decode error on read {}", self.name, self.now(), req);
            let state = self.state_mut();
            state.r_queue.push_back(req);
            state.stats.reads += 1;
        }
    }
}

impl ModuleBehaviors for ErrorSlave {
    fn tick_one(&mut self) {
        self.drain_w();
        self.respond_b();
        self.respond_r();
        self.accept_aw();
        self.accept_ar();
        self.advance();
    }

    fn reset(&mut self) {
        *self.state_mut() = ErrorSlaveState::default();
    }
}
