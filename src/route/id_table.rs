//! Per-identifier ordering table.
//!
//! One entry per identifier value, each holding the value the identifier is currently bound to
//! and how many accepted transactions are still waiting for completion. A new transaction for an
//! identifier may only proceed if the identifier is free or already bound to the same value, so
//! every outstanding transaction of one identifier shares a destination and retires in order.

/// Largest identifier index width a table is sized for.
pub const MAX_LOOK_BITS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindReject<D> {
    /// The identifier still has transactions bound elsewhere.
    Conflict { bound: D },
    /// The pending count has reached the table's maximum.
    Saturated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bind<D> {
    Accept,
    Reject(BindReject<D>),
}

impl<D> Bind<D> {
    pub fn accepted(&self) -> bool {
        matches!(self, Bind::Accept)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct IdEntry<D> {
    bound: D,
    pending: u32,
}

#[derive(Debug, Clone)]
pub struct IdTable<D> {
    entries: Vec<IdEntry<D>>,
    look_bits: u32,
    max_pending: u32,
    outstanding: usize,
}

impl<D: Copy + Default + PartialEq + std::fmt::Debug> IdTable<D> {
    /// Table indexed by the low `look_bits` of an identifier, allowing up to `max_pending`
    /// transactions per entry.
    pub fn new(look_bits: u32, max_pending: u32) -> Self {
        assert!(
            look_bits <= MAX_LOOK_BITS,
            "look_bits {} exceeds {}",
            look_bits,
            MAX_LOOK_BITS
        );
        assert!(max_pending > 0, "max_pending must be > 0");
        Self {
            entries: vec![IdEntry::default(); 1 << look_bits],
            look_bits,
            max_pending,
            outstanding: 0,
        }
    }

    fn slot(&self, id: u32) -> usize {
        (id & ((1u32 << self.look_bits) - 1)) as usize
    }

    /// Whether a new transaction for `id` bound to `value` may be accepted now.
    pub fn try_bind(&self, id: u32, value: D) -> Bind<D> {
        let entry = &self.entries[self.slot(id)];
        if entry.pending == 0 {
            Bind::Accept
        } else if entry.bound != value {
            Bind::Reject(BindReject::Conflict { bound: entry.bound })
        } else if entry.pending >= self.max_pending {
            Bind::Reject(BindReject::Saturated)
        } else {
            Bind::Accept
        }
    }

    /// Record an accepted transaction. Only call after `try_bind` accepted in the same cycle.
    pub fn bind(&mut self, id: u32, value: D) {
        if let Bind::Reject(reason) = self.try_bind(id, value) {
            panic!("bind of id {:#x} to {:?} after reject: {:?}", id, value, reason);
        }
        let slot = self.slot(id);
        let entry = &mut self.entries[slot];
        entry.bound = value;
        entry.pending += 1;
        self.outstanding += 1;
    }

    /// Complete the oldest transaction for `id` and return the value it was bound to.
    pub fn retire(&mut self, id: u32) -> D {
        let slot = self.slot(id);
        let entry = &mut self.entries[slot];
        assert!(entry.pending > 0, "retire of id {:#x} with nothing pending", id);
        entry.pending -= 1;
        self.outstanding -= 1;
        entry.bound
    }

    /// Bound value of `id`, if it has anything pending.
    pub fn lookup(&self, id: u32) -> Option<D> {
        let entry = &self.entries[self.slot(id)];
        (entry.pending > 0).then_some(entry.bound)
    }

    pub fn pending(&self, id: u32) -> u32 {
        self.entries[self.slot(id)].pending
    }

    /// Pending transactions summed over all identifiers.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding == 0
    }

    pub fn clear(&mut self) {
        self.entries.fill(IdEntry::default());
        self.outstanding = 0;
    }
}
