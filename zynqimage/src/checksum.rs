//! Boot ROM checksum

/// Checksum over a range of 32-bit words
///
/// The boot ROM adds all words with wraparound and expects the bitwise
/// complement of the sum. Callers pass the inclusive word range as a slice,
/// e.g. `&words[8..=17]` for the boot header.
pub fn checksum(words: &[u32]) -> u32 {
    !words.iter().fold(0u32, |sum, word| sum.wrapping_add(*word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(checksum(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFFFF_FFFF, 0x2]), !0x1);
        assert_eq!(checksum(&[0x8000_0000, 0x8000_0000]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_checksum_idempotent() {
        let words = [0xAA99_5566, 0x584C_4E58, 0, 0x0101_0000, 0x1700];
        assert_eq!(checksum(&words), checksum(&words));
        // sum of the range plus its checksum is always all ones
        let sum = words.iter().fold(0u32, |s, w| s.wrapping_add(*w));
        assert_eq!(sum.wrapping_add(checksum(&words)), 0xFFFF_FFFF);
    }
}
