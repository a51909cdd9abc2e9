use crate::route::encoder::{low_mask, PortMask, MAX_PORTS};

/// Round-robin arbiter over `n` requesters.
///
/// Priority starts right after the last granted index and wraps around, so a requester that
/// keeps requesting is granted within `n` arbitration events.
#[derive(Debug, Clone)]
pub struct RrArbiter {
    n: usize,
    last: Option<usize>,
}

impl RrArbiter {
    pub fn new(n: usize) -> Self {
        assert!(n > 0 && n <= MAX_PORTS, "arbiter width {} out of range", n);
        Self { n, last: None }
    }

    pub fn last_granted(&self) -> Option<usize> {
        self.last
    }

    /// The index that `arbitrate` would grant for `request`, without touching the priority.
    pub fn peek(&self, request: PortMask) -> Option<usize> {
        let request = request & low_mask(self.n);
        if request == 0 {
            return None;
        }
        let start = self.last.map_or(0, |last| (last + 1) % self.n);
        let above = request & !low_mask(start);
        let pick = if above != 0 { above } else { request };
        Some(pick.trailing_zeros() as usize)
    }

    /// Produce a one-hot grant. The priority pointer moves only when `enable` is set and some
    /// request was granted; a disabled arbiter grants nothing.
    pub fn arbitrate(&mut self, request: PortMask, enable: bool) -> PortMask {
        if !enable {
            return 0;
        }
        match self.peek(request) {
            Some(idx) => {
                self.last = Some(idx);
                1 << idx
            }
            None => 0,
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
