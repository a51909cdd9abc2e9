//! `Port` models one direction of a ready/valid channel on a component.
//!
//! A channel is a bounded FIFO of payloads shared by exactly one output port (the producer) and
//! one input port (the consumer). A payload sitting in the channel is "valid"; free space is
//! "ready". A transfer happens when the consumer calls `get`. Once `put` succeeds the payload
//! cannot be changed or withdrawn, so the stable-while-pending rule holds by construction.
//!
//! With depth 1 the channel behaves as a single-stage pipeline register, deeper channels as an
//! elastic queue. Either way a payload put in one component's tick is only observed by the
//! consumer through the channel, never through a same-cycle combinational path.
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, RwLock};

#[derive(Default, Debug)]
pub struct InputPort {}

#[derive(Default, Debug)]
pub struct OutputPort {}

#[derive(Debug)]
struct Channel<T> {
    slots: VecDeque<T>,
    depth: usize,
    transfers: u64,
}

/// Wrapper type of a reference to a channel.  Newtype is necessary to implement get/put methods at
/// the reference type.
#[derive(Debug)]
pub struct ChannelRef<T>(Arc<RwLock<Channel<T>>>);

impl<T> Clone for ChannelRef<T> {
    fn clone(&self) -> Self {
        ChannelRef(Arc::clone(&self.0))
    }
}

#[derive(Debug)]
pub struct Port<D, T> {
    // RwLock is necessary because neither side knows when the other will touch the channel.
    lock: OnceLock<ChannelRef<T>>,
    direction: PhantomData<D>,
}

impl<D, T> Default for Port<D, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, T> Port<D, T> {
    pub fn new() -> Self {
        Port {
            lock: OnceLock::new(),
            direction: PhantomData,
        }
    }

    fn chan(&self) -> &ChannelRef<T> {
        self.lock.get().expect("port lock not set, was the port linked?")
    }

    /// Number of payloads currently held by the channel.
    pub fn occupancy(&self) -> usize {
        self.chan().occupancy()
    }
}

impl<T> Port<OutputPort, T> {
    /// The consumer side can take another payload.
    pub fn ready(&self) -> bool {
        self.chan().ready()
    }

    /// Access method of an output port from *within* the module that has the port.
    /// Returns true if the channel was ready and the payload is now valid.
    pub fn put(&mut self, data: T) -> bool {
        self.chan().put(data)
    }
}

impl<T> Port<InputPort, T> {
    pub fn valid(&self) -> bool {
        self.chan().valid()
    }

    /// Access method of an input port from *within* the module that has the port.
    pub fn get(&mut self) -> Option<T> {
        self.chan().get()
    }
}

impl<T: Clone> Port<InputPort, T> {
    pub fn peek(&self) -> Option<T> {
        self.chan().peek()
    }
}

impl<T> ChannelRef<T> {
    fn new(depth: usize) -> Self {
        assert!(depth > 0, "channel depth must be > 0");
        ChannelRef(Arc::new(RwLock::new(Channel {
            slots: VecDeque::with_capacity(depth),
            depth,
            transfers: 0,
        })))
    }

    pub fn valid(&self) -> bool {
        !self.0.read().expect("rw lock poisoned").slots.is_empty()
    }

    pub fn ready(&self) -> bool {
        let channel = self.0.read().expect("rw lock poisoned");
        channel.slots.len() < channel.depth
    }

    pub fn occupancy(&self) -> usize {
        self.0.read().expect("rw lock poisoned").slots.len()
    }

    /// Completed handshakes since the channel was created.
    pub fn transfers(&self) -> u64 {
        self.0.read().expect("rw lock poisoned").transfers
    }

    /// Put a value onto the channel.
    /// Returns true if the channel was ready and the data was successfully put.
    pub fn put(&self, data: T) -> bool {
        let mut channel = self.0.write().expect("rw lock poisoned");
        if channel.slots.len() >= channel.depth {
            return false;
        }
        channel.slots.push_back(data);
        true
    }

    /// Get a value from the channel, completing the handshake.
    /// Returns Some if the channel had a valid payload, or None otherwise.
    pub fn get(&self) -> Option<T> {
        let mut channel = self.0.write().expect("rw lock poisoned");
        let data = channel.slots.pop_front()?;
        channel.transfers += 1;
        Some(data)
    }
}

impl<T: Clone> ChannelRef<T> {
    pub fn peek(&self) -> Option<T> {
        self.0.read().expect("rw lock poisoned").slots.front().cloned()
    }
}

/// Joins an output port to an input port of the same type with a single-register channel.
pub fn link<T>(a: &mut Port<InputPort, T>, b: &mut Port<OutputPort, T>) -> ChannelRef<T> {
    link_with_depth(a, b, 1)
}

/// Joins an output port to an input port through a channel holding up to `depth` payloads.
pub fn link_with_depth<T>(
    a: &mut Port<InputPort, T>,
    b: &mut Port<OutputPort, T>,
    depth: usize,
) -> ChannelRef<T> {
    let chan = ChannelRef::new(depth);
    if a.lock.set(chan.clone()).is_err() {
        panic!("input port already linked");
    }
    if b.lock.set(chan.clone()).is_err() {
        panic!("output port already linked");
    }
    chan
}
