use std::collections::{HashMap, VecDeque};

use anyhow::{bail, Context};

use crate::base::module::Cycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dir {
    Write,
    Read,
}

/// What a requester expects back for one issued transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected {
    pub tag: u64,
    pub addr: u64,
    /// Read beats, or 1 for a write response.
    pub beats: u32,
    pub expect_err: bool,
    pub issued_at: Cycle,
}

/// Checks that responses for one identifier come back in issue order.
///
/// Every transaction is keyed by direction and identifier; completions must match the oldest
/// pending tag for their key. Across identifiers any order is fine.
#[derive(Debug, Default)]
pub struct OrderScoreboard {
    pending: HashMap<(Dir, u32), VecDeque<Expected>>,
    outstanding: usize,
}

impl OrderScoreboard {
    pub fn issue(&mut self, dir: Dir, id: u32, expected: Expected) {
        self.pending.entry((dir, id)).or_default().push_back(expected);
        self.outstanding += 1;
    }

    /// Oldest pending transaction for `id`, if any.
    pub fn front(&self, dir: Dir, id: u32) -> Option<&Expected> {
        self.pending.get(&(dir, id)).and_then(VecDeque::front)
    }

    /// Retire the oldest transaction for `id`, checking the response against it.
    pub fn complete(
        &mut self,
        dir: Dir,
        id: u32,
        tag: u64,
        beats: u32,
        is_err: bool,
    ) -> anyhow::Result<Expected> {
        let queue = self
            .pending
            .get_mut(&(dir, id))
            .with_context(|| format!("{:?} response for id {:#x} with nothing issued", dir, id))?;
        let Some(front) = queue.front() else {
            bail!("{:?} response for id {:#x} with nothing issued", dir, id);
        };
        if front.tag != tag {
            bail!(
                "{:?} id {:#x}: response for tag {} overtook tag {}",
                dir,
                id,
                tag,
                front.tag
            );
        }
        if front.beats != beats {
            bail!(
                "{:?} id {:#x} tag {}: {} beats, expected {}",
                dir,
                id,
                tag,
                beats,
                front.beats
            );
        }
        if front.expect_err != is_err {
            bail!(
                "{:?} id {:#x} tag {}: error response {}, expected {}",
                dir,
                id,
                tag,
                is_err,
                front.expect_err
            );
        }
        let done = queue.pop_front().context("front checked above")?;
        self.outstanding -= 1;
        Ok(done)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }
}
