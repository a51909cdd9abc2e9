use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::route::encoder::{PortMask, MAX_PORTS};

/// One destination's address range. An address matches when it equals `base` in every bit
/// position where `mask` is zero. `mask == 0` marks an unused slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct AddrRule {
    pub base: u64,
    pub mask: u64,
}

impl AddrRule {
    pub fn new(base: u64, mask: u64) -> Self {
        Self { base, mask }
    }

    /// Rule covering `size` bytes from `base`; `size` must be a power of two.
    pub fn sized(base: u64, size: u64) -> Self {
        assert!(size.is_power_of_two(), "range size {:#x} is not a power of two", size);
        Self::new(base, size - 1)
    }

    pub fn enabled(&self) -> bool {
        self.mask != 0
    }

    pub fn matches(&self, addr: u64) -> bool {
        self.enabled() && addr & !self.mask == self.base
    }

    /// Whether some address matches both rules.
    pub fn overlaps(&self, other: &AddrRule) -> bool {
        if !self.enabled() || !other.enabled() {
            return false;
        }
        (self.base ^ other.base) & !self.mask & !other.mask == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub idx: usize,
    pub onehot: PortMask,
    pub matched: bool,
}

impl Decoded {
    const MISS: Decoded = Decoded {
        idx: 0,
        onehot: 0,
        matched: false,
    };
}

#[derive(Debug, Clone)]
pub struct AddrDecoder {
    rules: Vec<AddrRule>,
}

impl AddrDecoder {
    pub fn new(rules: Vec<AddrRule>) -> anyhow::Result<Self> {
        if rules.len() > MAX_PORTS {
            bail!("{} address rules exceed the {} port limit", rules.len(), MAX_PORTS);
        }
        for (idx, rule) in rules.iter().enumerate() {
            if rule.base & rule.mask != 0 {
                bail!(
                    "rule {} base {:#x} has bits under mask {:#x} and can never match",
                    idx,
                    rule.base,
                    rule.mask
                );
            }
        }
        for (i, a) in rules.iter().enumerate() {
            for (j, b) in rules.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    bail!(
                        "address rules {} ({:#x}/{:#x}) and {} ({:#x}/{:#x}) overlap",
                        i,
                        a.base,
                        a.mask,
                        j,
                        b.base,
                        b.mask
                    );
                }
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[AddrRule] {
        &self.rules
    }

    /// First matching rule in table order. A miss reports index 0 with `matched == false`, so
    /// callers must check `matched` rather than the index.
    pub fn decode(&self, addr: u64) -> Decoded {
        self.rules
            .iter()
            .position(|rule| rule.matches(addr))
            .map_or(Decoded::MISS, |idx| Decoded {
                idx,
                onehot: 1 << idx,
                matched: true,
            })
    }
}
