use crate::config::NONCE_SIZE;

/// Per-chunk nonce: the base nonce with the little-endian chunk index XORed
/// into its last four bytes.
///
/// Pure function of its inputs, so chunks can be sealed or opened in any
/// order and on any thread.
#[inline]
pub fn chunk_nonce(base: &[u8; NONCE_SIZE], index: u32) -> [u8; NONCE_SIZE] {
    let mut nonce = *base;
    let tail = &mut nonce[NONCE_SIZE - 4..];

    for (byte, mask) in tail.iter_mut().zip(index.to_le_bytes()) {
        *byte ^= mask;
    }

    nonce
}

#[cfg(test)]
mod tests {
    use hashbrown::HashSet;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_index_zero_is_base() {
        let base = [0xAB; NONCE_SIZE];
        assert_eq!(chunk_nonce(&base, 0), base);
    }

    #[test]
    fn test_index_lands_in_tail() {
        let base = [0u8; NONCE_SIZE];
        let nonce = chunk_nonce(&base, 0x0403_0201);
        assert_eq!(&nonce[..8], &[0u8; 8]);
        assert_eq!(&nonce[8..], &[1, 2, 3, 4]);
    }

    proptest! {
        #[test]
        fn prop_nonces_pairwise_distinct(base in any::<[u8; NONCE_SIZE]>(), start in any::<u32>(), count in 1u32..512) {
            let mut seen = HashSet::new();
            for index in (0..count).map(|offset| start.wrapping_add(offset)) {
                prop_assert!(seen.insert(chunk_nonce(&base, index)));
            }
        }

        #[test]
        fn prop_distinct_indices_distinct_nonces(base in any::<[u8; NONCE_SIZE]>(), a in any::<u32>(), b in any::<u32>()) {
            prop_assume!(a != b);
            prop_assert_ne!(chunk_nonce(&base, a), chunk_nonce(&base, b));
        }
    }
}
