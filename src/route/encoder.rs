/// Bit-vector over ports: bit `i` stands for port `i`.
pub type PortMask = u64;

/// Widest request vector a single arbiter or decoder handles.
pub const MAX_PORTS: usize = PortMask::BITS as usize;

/// Dense index of the single set bit in a one-hot grant, or `None` for an empty grant.
pub fn onehot_to_bin(onehot: PortMask) -> Option<usize> {
    if onehot == 0 {
        return None;
    }
    debug_assert!(onehot.is_power_of_two(), "grant {:#x} is not one-hot", onehot);
    Some(onehot.trailing_zeros() as usize)
}

/// Bits needed to encode `n` distinct indices; 0 for `n <= 1`.
pub fn clog2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

/// Mask with the low `n` bits set.
pub fn low_mask(n: usize) -> PortMask {
    if n >= MAX_PORTS {
        PortMask::MAX
    } else {
        (1 << n) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_one_hot_grants() {
        assert_eq!(None, onehot_to_bin(0));
        assert_eq!(Some(0), onehot_to_bin(0b1));
        assert_eq!(Some(5), onehot_to_bin(1 << 5));
        assert_eq!(Some(63), onehot_to_bin(1 << 63));
    }

    #[test]
    fn clog2_matches_port_counts() {
        assert_eq!(0, clog2(0));
        assert_eq!(0, clog2(1));
        assert_eq!(1, clog2(2));
        assert_eq!(2, clog2(3));
        assert_eq!(2, clog2(4));
        assert_eq!(3, clog2(5));
        assert_eq!(6, clog2(64));
    }

    #[test]
    fn low_mask_saturates() {
        assert_eq!(0, low_mask(0));
        assert_eq!(0b111, low_mask(3));
        assert_eq!(u64::MAX, low_mask(64));
    }
}
