//! Address range matching
//!
//! A host address matches when it lies inside any enabled range. With no
//! range enabled nothing matches, and routing falls back to a single flash.

use crate::regs::AddressRange;

/// Index of the first enabled range containing `address`
pub fn matching_range(ranges: &[AddressRange], address: u32) -> Option<usize> {
    ranges.iter().position(|range| range.contains(address))
}

/// Whether `address` lies inside any enabled range
pub fn matches(ranges: &[AddressRange], address: u32) -> bool {
    matching_range(ranges, address).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::ADDRESS_MASK;

    fn ranges(r0: Option<(u32, u32)>, r1: Option<(u32, u32)>) -> [AddressRange; 2] {
        let build = |r: Option<(u32, u32)>| match r {
            Some((start, end)) => AddressRange::new(start, end).unwrap(),
            None => AddressRange::disabled(),
        };
        [build(r0), build(r1)]
    }

    #[test]
    fn test_no_ranges_never_match() {
        let set = ranges(None, None);
        for address in [0, 1, 0x7FFFFF, ADDRESS_MASK] {
            assert!(!matches(&set, address));
        }
    }

    #[test]
    fn test_single_range_matches_bounds() {
        let set = ranges(Some((0x000000, 0x7FFFFF)), None);
        for address in (0..=ADDRESS_MASK).step_by(0x1_0001) {
            assert_eq!(matches(&set, address), address <= 0x7FFFFF, "address 0x{:06X}", address);
        }
        assert!(matches(&set, 0x7FFFFF));
        assert!(!matches(&set, 0x800000));
    }

    #[test]
    fn test_union_of_ranges() {
        let set = ranges(Some((0x000000, 0x0FFFFF)), Some((0x800000, 0x8FFFFF)));
        assert_eq!(matching_range(&set, 0x000010), Some(0));
        assert_eq!(matching_range(&set, 0x800010), Some(1));
        assert_eq!(matching_range(&set, 0x400000), None);
    }

    #[test]
    fn test_overlap_lowest_index_wins() {
        let set = ranges(Some((0x1000, 0x2FFF)), Some((0x2000, 0x3FFF)));
        assert_eq!(matching_range(&set, 0x2800), Some(0));
        assert_eq!(matching_range(&set, 0x3800), Some(1));
    }

    #[test]
    fn test_disabling_forces_false() {
        let mut set = ranges(Some((0, ADDRESS_MASK)), None);
        assert!(matches(&set, 0x123456));
        set[0].enabled = false;
        assert!(!matches(&set, 0x123456));
    }

    #[test]
    fn test_address_masked_to_24_bits() {
        let set = ranges(Some((0x000000, 0x00FFFF)), None);
        assert!(matches(&set, 0x0100_1234));
    }
}
